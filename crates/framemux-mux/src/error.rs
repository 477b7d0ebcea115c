/// Errors that stop the multiplexer.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Frame extraction settings are inconsistent.
    #[error("frame error: {0}")]
    Frame(#[from] framemux_frame::FrameError),

    /// The consumer can no longer be fed.
    #[error("output failed: {0}")]
    Sink(#[from] framemux_frame::SinkError),

    /// The readiness wait failed.
    #[error("transport error: {0}")]
    Transport(#[from] framemux_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, MuxError>;
