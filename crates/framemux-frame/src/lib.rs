//! Delimiter-based frame extraction with freshness tracking.
//!
//! This is the data path of framemux. Producers write opaque frames bounded
//! by a start and an end byte pattern (JPEG SOI/EOI by default), possibly
//! interleaved with noise:
//! - [`FrameExtractor`] finds the most recent complete frame in a buffer
//! - [`InputChannel`] accumulates one producer's bytes and caches its latest frame
//! - [`DrainReader`] empties a non-blocking source without parking the caller
//! - [`OutputSink`] writes chosen frames downstream and accounts throughput
//!
//! Frames are never decoded; only their delimiters are inspected.

pub mod channel;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use channel::{CapturedFrame, InputChannel};
pub use codec::{
    Delimiters, FrameConfig, FrameExtractor, FrameSpan, DEFAULT_BUFFER_CAPACITY,
    DEFAULT_MAX_FRAME_SIZE, JPEG_EOI, JPEG_SOI,
};
pub use error::{FrameError, Result, SinkError};
pub use reader::{DrainReader, Drained, DEFAULT_DRAIN_BUDGET, READ_CHUNK_SIZE};
pub use writer::{OutputSink, SinkConfig, ThroughputMeter, ThroughputReport};
