//! Per-producer accumulation buffer and latest-frame cache.

use std::time::{Duration, Instant};

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::codec::{FrameConfig, FrameExtractor};

const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;

/// A complete frame together with the time it was extracted.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub data: Bytes,
    pub captured_at: Instant,
}

impl CapturedFrame {
    /// Fresh while strictly younger than `threshold`.
    pub fn is_fresh(&self, now: Instant, threshold: Duration) -> bool {
        now.saturating_duration_since(self.captured_at) < threshold
    }
}

/// One producer's raw bytes and its most recently extracted frame.
#[derive(Debug)]
pub struct InputChannel {
    index: usize,
    buf: BytesMut,
    capacity: usize,
    extractor: FrameExtractor,
    latest: Option<CapturedFrame>,
    frames_captured: u64,
    bytes_evicted: u64,
}

impl InputChannel {
    pub fn new(index: usize, config: &FrameConfig) -> Self {
        Self {
            index,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY.min(config.buffer_capacity)),
            capacity: config.buffer_capacity,
            extractor: config.extractor(),
            latest: None,
            frames_captured: 0,
            bytes_evicted: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Append newly read bytes and capture the newest complete frame.
    ///
    /// When the buffer would exceed its capacity the oldest half is dropped
    /// (repeatedly, if needed) before appending, so the newest bytes always
    /// survive. Returns the size of a newly captured frame, if any.
    pub fn accumulate(&mut self, bytes: &[u8], now: Instant) -> Option<usize> {
        self.make_room(bytes);
        let bytes = if bytes.len() > self.capacity {
            &bytes[bytes.len() - self.capacity..]
        } else {
            bytes
        };
        self.buf.extend_from_slice(bytes);
        self.extract(now)
    }

    fn make_room(&mut self, incoming: &[u8]) {
        if incoming.len() >= self.capacity {
            self.evict(self.buf.len());
            return;
        }

        let half = (self.capacity / 2).max(1);
        while self.buf.len() + incoming.len() > self.capacity {
            self.evict(half.min(self.buf.len()));
        }
    }

    fn evict(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.buf.advance(count);
        self.bytes_evicted += count as u64;
        debug!(input = self.index, evicted = count, "accumulation buffer full, dropped oldest bytes");
    }

    fn extract(&mut self, now: Instant) -> Option<usize> {
        let span = self.extractor.find_last(&self.buf)?;

        let mut consumed = self.buf.split_to(span.end());
        consumed.advance(span.offset);
        let data = consumed.freeze();
        let size = data.len();

        trace!(input = self.index, size, skipped = span.offset, "captured frame");
        self.latest = Some(CapturedFrame {
            data,
            captured_at: now,
        });
        self.frames_captured += 1;
        Some(size)
    }

    /// The cached frame if it was captured less than `threshold` before `now`.
    pub fn latest_frame(&self, now: Instant, threshold: Duration) -> Option<&Bytes> {
        self.latest
            .as_ref()
            .filter(|frame| frame.is_fresh(now, threshold))
            .map(|frame| &frame.data)
    }

    /// The cached frame regardless of age.
    pub fn cached(&self) -> Option<&CapturedFrame> {
        self.latest.as_ref()
    }

    /// Drop buffered partial data, keeping the cached frame.
    ///
    /// Used when the underlying source is reopened and leftover bytes can no
    /// longer be continued.
    pub fn discard_partial(&mut self) {
        if !self.buf.is_empty() {
            trace!(input = self.index, dropped = self.buf.len(), "discarding partial data");
            self.buf.clear();
        }
    }

    /// Bytes currently waiting for a frame boundary.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// The waiting bytes themselves, oldest first.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    pub fn bytes_evicted(&self) -> u64 {
        self.bytes_evicted
    }
}
