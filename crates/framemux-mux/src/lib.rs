//! Readiness-driven frame multiplexing.
//!
//! This is the control layer of framemux. It owns the event loop that
//! drains every producer, applies selection commands and forwards one
//! frame per output tick:
//! - [`Multiplexer`] runs the loop until shutdown or a sink failure
//! - [`SelectionPolicy`] decides between producers and the fallback frame
//! - [`ControlChannel`] turns the command stream into [`Command`]s
//! - [`Cadence`] keeps the output on a fixed-rate grid

pub mod cadence;
pub mod clock;
pub mod config;
pub mod control;
pub mod error;
pub mod multiplexer;
pub mod policy;
pub mod shutdown;

#[cfg(test)]
mod testkit;

pub use cadence::Cadence;
pub use clock::{Clock, MonotonicClock};
pub use config::{
    MuxConfig, DEFAULT_FPS, DEFAULT_IDLE_BACKOFF, DEFAULT_INPUTS, DEFAULT_STALENESS, MAX_FPS,
    MAX_INPUTS,
};
pub use control::{
    Command, ControlChannel, ParseCommandError, DEFAULT_CONTROL_CAPACITY, FALLBACK_KEYWORD,
};
pub use error::{MuxError, Result};
pub use multiplexer::{LoopStats, Multiplexer};
pub use policy::{FrameOrigin, SelectedFrame, SelectionPolicy, SelectionState};
pub use shutdown::ShutdownToken;
