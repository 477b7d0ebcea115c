use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use framemux_frame::InputChannel;
use tracing::{info, warn};

use crate::control::Command;

/// Which frame the output follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    /// Highest-index producer with a fresh frame, else the fallback.
    #[default]
    Auto,
    /// One producer; the fallback while it is stale.
    Fixed(usize),
    /// Always the fallback.
    Fallback,
}

impl fmt::Display for SelectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed(index) => write!(f, "source {index}"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// Where an emitted frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrigin {
    Input(usize),
    Fallback,
}

impl fmt::Display for FrameOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(index) => write!(f, "input {index}"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// The frame chosen for one output tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFrame {
    pub origin: FrameOrigin,
    pub data: Bytes,
}

/// Commandable choice between producers and the fallback frame.
///
/// Only commands change the state. Staleness affects which frame a tick
/// gets, never the recorded state, so a selected producer that recovers is
/// picked up again without a new command.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    state: SelectionState,
    source_count: usize,
    staleness: Duration,
    fallback: Option<Bytes>,
}

impl SelectionPolicy {
    /// An empty fallback blob is treated as no fallback.
    pub fn new(source_count: usize, staleness: Duration, fallback: Option<Bytes>) -> Self {
        Self {
            state: SelectionState::Auto,
            source_count,
            staleness,
            fallback: fallback.filter(|frame| !frame.is_empty()),
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    pub fn fallback(&self) -> Option<&Bytes> {
        self.fallback.as_ref()
    }

    /// Apply a command. Returns `false` for a source index out of range,
    /// which leaves the state unchanged.
    pub fn apply(&mut self, command: Command) -> bool {
        let next = match command {
            Command::SelectSource(index) if index < self.source_count => {
                SelectionState::Fixed(index)
            }
            Command::SelectSource(index) => {
                warn!(
                    index,
                    sources = self.source_count,
                    "ignoring selection of unknown source"
                );
                return false;
            }
            Command::SelectFallback => SelectionState::Fallback,
            Command::SelectAuto => SelectionState::Auto,
        };

        if next != self.state {
            info!(from = %self.state, to = %next, "selection changed");
        }
        self.state = next;
        true
    }

    /// Resolve the frame for an output tick at `now`.
    pub fn choose_frame(&self, inputs: &[InputChannel], now: Instant) -> Option<SelectedFrame> {
        let fresh = |index: usize| {
            inputs
                .get(index)
                .and_then(|input| input.latest_frame(now, self.staleness))
                .map(|data| SelectedFrame {
                    origin: FrameOrigin::Input(index),
                    data: data.clone(),
                })
        };

        let chosen = match self.state {
            SelectionState::Fallback => None,
            SelectionState::Fixed(index) => fresh(index),
            SelectionState::Auto => (0..inputs.len().min(self.source_count))
                .rev()
                .find_map(fresh),
        };

        chosen.or_else(|| {
            self.fallback.as_ref().map(|data| SelectedFrame {
                origin: FrameOrigin::Fallback,
                data: data.clone(),
            })
        })
    }
}
