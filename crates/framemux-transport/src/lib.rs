//! Byte-stream plumbing for the frame multiplexer.
//!
//! Provides the lowest layer of framemux:
//! - [`NamedPipe`] producer/command sources that may not exist yet
//! - [`PollReadiness`], a `poll(2)` wait across many descriptors
//! - [`FdSink`], an unbuffered descriptor sink that can wait for writability
//!
//! Everything above this crate talks to these through the traits in
//! [`traits`], so the multiplexer can be driven by in-memory doubles in tests.

pub mod error;

#[cfg(unix)]
pub mod fifo;
#[cfg(unix)]
pub mod poll;
#[cfg(unix)]
pub mod sink;
#[cfg(unix)]
pub mod traits;

pub use error::{Result, TransportError};

#[cfg(unix)]
pub use fifo::NamedPipe;
#[cfg(unix)]
pub use poll::PollReadiness;
#[cfg(unix)]
pub use sink::FdSink;
#[cfg(unix)]
pub use traits::{ByteSource, Readiness, WaitWritable};
