use std::time::Duration;

/// Errors that can occur while configuring extraction or reading sources.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame delimiter pattern is empty.
    #[error("frame delimiters must not be empty")]
    EmptyDelimiter,

    /// The accumulation buffer cannot hold a maximum-size frame.
    #[error("buffer capacity ({capacity} bytes) is smaller than max frame size ({max_frame} bytes)")]
    CapacityTooSmall { capacity: usize, max_frame: usize },

    /// The maximum frame size is zero.
    #[error("max frame size must be greater than zero")]
    ZeroMaxFrame,

    /// An I/O error occurred while reading a source.
    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal failures of the output sink.
///
/// Any of these means the consumer can no longer be fed and the multiplexer
/// must shut down.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The consumer accepted zero bytes.
    #[error("output closed (wrote 0 of {remaining} remaining bytes)")]
    Closed { remaining: usize },

    /// The consumer stayed unwritable past the retry bound.
    #[error("output stalled for {waited:?} without accepting data")]
    Stalled { waited: Duration },

    /// A write failed for a reason other than backpressure.
    #[error("output I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
