//! Line-oriented selection commands.
//!
//! The command source carries UTF-8 text, one command per line:
//!
//! ```text
//! source <index>    forward producer <index>
//! testcard          forward the fallback frame (alias: fallback)
//! auto              forward the highest-index producer with a fresh frame
//! ```

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

/// Default bound on a buffered, unterminated command line: 4 KiB.
pub const DEFAULT_CONTROL_CAPACITY: usize = 4096;

/// Keyword selecting the fallback frame.
pub const FALLBACK_KEYWORD: &str = "testcard";

/// A selection command parsed from one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectSource(usize),
    SelectFallback,
    SelectAuto,
}

/// Why a line did not produce a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,

    #[error("invalid source index {0:?}")]
    InvalidIndex(String),

    #[error("unknown command {0:?}")]
    Unknown(String),
}

impl FromStr for Command {
    type Err = ParseCommandError;

    /// Parse one line. Surrounding whitespace is ignored; keywords are case-sensitive.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        match line {
            "" => Err(ParseCommandError::Empty),
            "auto" => Ok(Self::SelectAuto),
            FALLBACK_KEYWORD | "fallback" => Ok(Self::SelectFallback),
            _ => {
                let arg = line
                    .strip_prefix("source")
                    .filter(|rest| rest.starts_with(char::is_whitespace))
                    .map(str::trim)
                    .ok_or_else(|| ParseCommandError::Unknown(line.to_string()))?;
                arg.parse::<usize>()
                    .map(Self::SelectSource)
                    .map_err(|_| ParseCommandError::InvalidIndex(arg.to_string()))
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectSource(index) => write!(f, "source {index}"),
            Self::SelectFallback => f.write_str(FALLBACK_KEYWORD),
            Self::SelectAuto => f.write_str("auto"),
        }
    }
}

/// Splits a command byte stream into lines and parses them.
///
/// Unterminated input is kept until its newline arrives. A line that grows
/// past the capacity is dropped whole: the buffer is reset and the rest of
/// that line is skipped up to its terminator.
#[derive(Debug)]
pub struct ControlChannel {
    buf: Vec<u8>,
    capacity: usize,
    skipping_overlong: bool,
    rejected: u64,
}

impl ControlChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity.min(DEFAULT_CONTROL_CAPACITY)),
            capacity,
            skipping_overlong: false,
            rejected: 0,
        }
    }

    /// Consume raw bytes, returning the commands of every completed line.
    pub fn feed(&mut self, mut bytes: &[u8]) -> Vec<Command> {
        let mut commands = Vec::new();

        while let Some(newline) = bytes.iter().position(|&b| b == b'\n') {
            let (piece, rest) = (&bytes[..newline], &bytes[newline + 1..]);
            bytes = rest;

            if self.skipping_overlong {
                self.skipping_overlong = false;
                continue;
            }
            if self.buf.len() + piece.len() > self.capacity {
                self.overflow();
                self.skipping_overlong = false;
                continue;
            }

            self.buf.extend_from_slice(piece);
            if let Some(command) = self.parse_buffered() {
                commands.push(command);
            }
            self.buf.clear();
        }

        if !bytes.is_empty() && !self.skipping_overlong {
            if self.buf.len() + bytes.len() > self.capacity {
                self.overflow();
            } else {
                self.buf.extend_from_slice(bytes);
            }
        }

        commands
    }

    fn overflow(&mut self) {
        warn!(
            capacity = self.capacity,
            "control line exceeds buffer, discarding it"
        );
        self.buf.clear();
        self.skipping_overlong = true;
        self.rejected += 1;
    }

    fn parse_buffered(&mut self) -> Option<Command> {
        let Ok(line) = std::str::from_utf8(&self.buf) else {
            warn!(len = self.buf.len(), "ignoring non-UTF-8 control line");
            self.rejected += 1;
            return None;
        };

        match line.parse::<Command>() {
            Ok(command) => {
                debug!(%command, "control command");
                Some(command)
            }
            Err(ParseCommandError::Empty) => None,
            Err(err) => {
                warn!(error = %err, "ignoring control line");
                self.rejected += 1;
                None
            }
        }
    }

    /// Bytes of the current unterminated line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Lines discarded as malformed, non-UTF-8 or overlong.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Forget any partial line, e.g. after the command source was reopened.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.skipping_overlong = false;
    }
}

impl Default for ControlChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROL_CAPACITY)
    }
}
