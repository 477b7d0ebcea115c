use std::time::Duration;

use framemux_frame::{FrameConfig, SinkConfig, DEFAULT_DRAIN_BUDGET};

use crate::control::DEFAULT_CONTROL_CAPACITY;
use crate::error::{MuxError, Result};

/// Largest supported number of producers.
pub const MAX_INPUTS: usize = 8;

/// Highest supported output rate.
pub const MAX_FPS: u32 = 240;

/// Default output rate.
pub const DEFAULT_FPS: u32 = 10;

/// Default number of producers.
pub const DEFAULT_INPUTS: usize = 2;

/// Default age after which a cached frame is stale: 500 ms.
pub const DEFAULT_STALENESS: Duration = Duration::from_millis(500);

/// Default backoff while no source is open: 100 ms.
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(100);

/// Multiplexer configuration.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Number of producers. Default: 2, at most [`MAX_INPUTS`].
    pub inputs: usize,
    /// Output frames per second. Default: 10, at most [`MAX_FPS`].
    pub fps: u32,
    /// Frames at least this old are not forwarded. Default: 500 ms.
    pub staleness: Duration,
    /// Delimiters and size bounds for every producer.
    pub frame: FrameConfig,
    /// Bound on an unterminated command line. Default: 4 KiB.
    pub control_capacity: usize,
    /// Sleep while no source is open. Default: 100 ms.
    pub idle_backoff: Duration,
    /// Bytes read from one source per readiness event. Default: 4 MiB.
    pub drain_budget: usize,
    /// Output backpressure and accounting.
    pub sink: SinkConfig,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            inputs: DEFAULT_INPUTS,
            fps: DEFAULT_FPS,
            staleness: DEFAULT_STALENESS,
            frame: FrameConfig::default(),
            control_capacity: DEFAULT_CONTROL_CAPACITY,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            drain_budget: DEFAULT_DRAIN_BUDGET,
            sink: SinkConfig::default(),
        }
    }
}

impl MuxConfig {
    pub fn validate(&self) -> Result<()> {
        if self.inputs == 0 || self.inputs > MAX_INPUTS {
            return Err(MuxError::InvalidConfig(format!(
                "inputs must be between 1 and {MAX_INPUTS}, got {}",
                self.inputs
            )));
        }
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(MuxError::InvalidConfig(format!(
                "fps must be between 1 and {MAX_FPS}, got {}",
                self.fps
            )));
        }
        if self.staleness.is_zero() {
            return Err(MuxError::InvalidConfig(
                "staleness threshold must be positive".to_string(),
            ));
        }
        if self.control_capacity == 0 {
            return Err(MuxError::InvalidConfig(
                "control buffer capacity must be positive".to_string(),
            ));
        }
        self.frame.validate()?;
        Ok(())
    }

    /// Time between output ticks.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }
}
