//! Latest-frame multiplexer for delimited frame streams.
//!
//! framemux reads opaque frames (JPEG by default) from several producer
//! pipes, keeps only the newest complete frame of each and forwards one of
//! them to standard output at a fixed rate. A command pipe switches between
//! producers, automatic selection and a fallback frame.
//!
//! # Crate Structure
//!
//! - [`transport`]: named-pipe sources, `poll(2)` readiness and the stdout sink
//! - [`frame`]: delimiter scanning, per-producer buffers and the output sink
//! - [`mux`]: command parsing, selection policy and the event loop

/// Re-export transport types.
pub mod transport {
    pub use framemux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use framemux_frame::*;
}

/// Re-export multiplexer types.
pub mod mux {
    pub use framemux_mux::*;
}
