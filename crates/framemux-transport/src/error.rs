use std::path::PathBuf;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to create the named pipe at the specified path.
    #[error("failed to create fifo {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to open the specified path.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A writer open found no process holding the read end.
    #[error("no reader attached to {path}")]
    NoReader { path: PathBuf },

    /// Something other than a FIFO occupies the path.
    #[error("{path} exists but is not a fifo")]
    NotFifo { path: PathBuf },

    /// The path cannot be passed to the operating system.
    #[error("path contains an interior NUL byte: {path}")]
    InvalidPath { path: PathBuf },

    /// The readiness wait itself failed.
    #[error("readiness wait failed: {0}")]
    Poll(std::io::Error),

    /// An I/O error occurred on a source or sink.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
