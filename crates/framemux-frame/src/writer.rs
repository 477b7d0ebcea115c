use std::io::ErrorKind;
use std::time::{Duration, Instant};

use framemux_transport::WaitWritable;
use tracing::{info, trace};

use crate::error::SinkError;

/// Behaviour of the output sink under backpressure and for accounting.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Longest single wait for the consumer to become writable. Default: 200 ms.
    pub write_wait: Duration,
    /// Consecutive `WouldBlock` results without progress before giving up. Default: 25.
    pub max_stalls: u32,
    /// Throughput accounting window. Default: 10 s.
    pub report_window: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            write_wait: Duration::from_millis(200),
            max_stalls: 25,
            report_window: Duration::from_secs(10),
        }
    }
}

/// Throughput observed over one accounting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputReport {
    pub frames: u64,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl ThroughputReport {
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// Rolling frame counter that closes a window once it has lasted long enough.
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
    window: Duration,
    window_start: Instant,
    frames: u64,
    bytes: u64,
}

impl ThroughputMeter {
    pub fn new(window: Duration, start: Instant) -> Self {
        Self {
            window,
            window_start: start,
            frames: 0,
            bytes: 0,
        }
    }

    /// Count one emitted frame; returns a report when the window closes.
    pub fn record(&mut self, bytes: usize, now: Instant) -> Option<ThroughputReport> {
        self.frames += 1;
        self.bytes += bytes as u64;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let report = ThroughputReport {
            frames: self.frames,
            bytes: self.bytes,
            elapsed,
        };
        self.frames = 0;
        self.bytes = 0;
        self.window_start = now;
        Some(report)
    }
}

/// Writes whole frames to the single downstream consumer.
pub struct OutputSink<W> {
    inner: W,
    config: SinkConfig,
    meter: ThroughputMeter,
    frames_emitted: u64,
}

impl<W: WaitWritable> OutputSink<W> {
    pub fn new(inner: W, start: Instant) -> Self {
        Self::with_config(inner, SinkConfig::default(), start)
    }

    pub fn with_config(inner: W, config: SinkConfig, start: Instant) -> Self {
        let meter = ThroughputMeter::new(config.report_window, start);
        Self {
            inner,
            config,
            meter,
            frames_emitted: 0,
        }
    }

    /// Write all of `frame`, waiting out transient backpressure.
    ///
    /// Every error returned here is fatal for the sink.
    pub fn emit(&mut self, frame: &[u8], now: Instant) -> Result<(), SinkError> {
        let mut offset = 0usize;
        let mut stalls = 0u32;
        let mut waited = Duration::ZERO;

        while offset < frame.len() {
            match self.inner.write(&frame[offset..]) {
                Ok(0) => {
                    return Err(SinkError::Closed {
                        remaining: frame.len() - offset,
                    })
                }
                Ok(n) => {
                    offset += n;
                    stalls = 0;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    stalls += 1;
                    if stalls > self.config.max_stalls {
                        return Err(SinkError::Stalled { waited });
                    }
                    waited += self.config.write_wait;
                    if !self.inner.wait_writable(self.config.write_wait)? {
                        return Err(SinkError::Stalled { waited });
                    }
                }
                Err(err) => return Err(SinkError::Io(err)),
            }
        }

        self.frames_emitted += 1;
        trace!(size = frame.len(), "emitted frame");

        if let Some(report) = self.meter.record(frame.len(), now) {
            let fps = (report.fps() * 10.0).round() / 10.0;
            info!(
                fps,
                frames = report.frames,
                bytes = report.bytes,
                secs = report.elapsed.as_secs(),
                "output throughput"
            );
        }
        Ok(())
    }

    /// Frames written successfully since creation.
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Borrow the underlying consumer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying consumer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the sink and return the underlying consumer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }
}

impl<W> std::fmt::Debug for OutputSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSink")
            .field("config", &self.config)
            .field("frames_emitted", &self.frames_emitted)
            .finish()
    }
}
