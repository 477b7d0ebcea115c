use bytes::Bytes;
use tracing::trace;

use crate::error::{FrameError, Result};

/// JPEG start-of-image marker.
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker.
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Default maximum frame size: 1 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Default per-producer accumulation buffer: 2 MiB.
pub const DEFAULT_BUFFER_CAPACITY: usize = 2 * 1024 * 1024;

/// Start and end byte patterns that bound a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    start: Bytes,
    end: Bytes,
}

impl Delimiters {
    /// Create a delimiter pair. Both patterns must be non-empty.
    pub fn new(start: impl Into<Bytes>, end: impl Into<Bytes>) -> Result<Self> {
        let start = start.into();
        let end = end.into();
        if start.is_empty() || end.is_empty() {
            return Err(FrameError::EmptyDelimiter);
        }
        Ok(Self { start, end })
    }

    /// JPEG SOI/EOI markers, the format carried by MJPEG producers.
    pub fn jpeg() -> Self {
        Self {
            start: Bytes::from_static(&JPEG_SOI),
            end: Bytes::from_static(&JPEG_EOI),
        }
    }

    pub fn start(&self) -> &[u8] {
        &self.start
    }

    pub fn end(&self) -> &[u8] {
        &self.end
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::jpeg()
    }
}

/// Location of a complete frame inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan {
    /// Offset of the first start-delimiter byte.
    pub offset: usize,
    /// Length including both delimiters.
    pub len: usize,
}

impl FrameSpan {
    /// One past the last byte of the end delimiter.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Finds the most recent complete frame in a byte buffer.
///
/// ```text
/// noise  SOI ... EOI  noise  SOI ...... EOI  SOI ....
///        └ superseded ┘      └ returned ─────┘ └ incomplete, left for later
/// ```
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    delimiters: Delimiters,
    max_frame_size: usize,
}

impl FrameExtractor {
    pub fn new(delimiters: Delimiters, max_frame_size: usize) -> Self {
        Self {
            delimiters,
            max_frame_size,
        }
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Return the last complete frame in `buf` that fits the size bound.
    ///
    /// Frames longer than the bound are skipped and scanning resumes after
    /// them. A start delimiter without a matching end stops the scan. The
    /// end delimiter is searched for only after the start delimiter, so a
    /// frame with no content between the two is still a frame.
    pub fn find_last(&self, buf: &[u8]) -> Option<FrameSpan> {
        let start_pat = self.delimiters.start();
        let end_pat = self.delimiters.end();

        let mut best = None;
        let mut pos = 0;

        while let Some(start) = find(buf, start_pat, pos) {
            let Some(end) = find(buf, end_pat, start + start_pat.len()) else {
                break;
            };
            let stop = end + end_pat.len();
            let len = stop - start;

            if len <= self.max_frame_size {
                best = Some(FrameSpan { offset: start, len });
            } else {
                trace!(offset = start, len, max = self.max_frame_size, "skipping oversized frame");
            }
            pos = stop;
        }

        best
    }
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new(Delimiters::default(), DEFAULT_MAX_FRAME_SIZE)
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || haystack.len() - from < needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|idx| idx + from)
}

/// Configuration for per-producer frame extraction.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Frame boundary patterns. Default: JPEG SOI/EOI.
    pub delimiters: Delimiters,
    /// Largest frame that is ever returned. Default: 1 MiB.
    pub max_frame_size: usize,
    /// Bytes buffered per producer before the oldest half is evicted. Default: 2 MiB.
    pub buffer_capacity: usize,
}

impl FrameConfig {
    /// Check that a maximum-size frame fits the accumulation buffer.
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size == 0 {
            return Err(FrameError::ZeroMaxFrame);
        }
        if self.buffer_capacity < self.max_frame_size {
            return Err(FrameError::CapacityTooSmall {
                capacity: self.buffer_capacity,
                max_frame: self.max_frame_size,
            });
        }
        Ok(())
    }

    pub fn extractor(&self) -> FrameExtractor {
        FrameExtractor::new(self.delimiters.clone(), self.max_frame_size)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            delimiters: Delimiters::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}
