use std::io::{ErrorKind, Read};

use crate::error::{FrameError, Result};

/// Default read chunk: 64 KiB.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Default number of bytes taken from one source per readiness event: 4 MiB.
pub const DEFAULT_DRAIN_BUDGET: usize = 4 * 1024 * 1024;

/// Outcome of draining a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drained {
    /// Bytes handed to the callback.
    pub bytes: usize,
    /// The source reported end-of-stream.
    pub closed: bool,
    /// Reading stopped because the budget was spent, not because the source ran dry.
    pub budget_exhausted: bool,
}

/// Empties non-blocking sources chunk by chunk.
///
/// Reads continue until the source reports `WouldBlock`, reaches
/// end-of-stream or the per-call budget is spent, so a producer that writes
/// faster than we read cannot starve the rest of the loop.
pub struct DrainReader {
    chunk: Box<[u8]>,
    budget: usize,
}

impl DrainReader {
    /// Create a reader with the default chunk size and budget.
    pub fn new() -> Self {
        Self::with_limits(READ_CHUNK_SIZE, DEFAULT_DRAIN_BUDGET)
    }

    /// Create a reader with an explicit chunk size and per-drain budget.
    pub fn with_limits(chunk_size: usize, budget: usize) -> Self {
        Self {
            chunk: vec![0u8; chunk_size.max(1)].into_boxed_slice(),
            budget: budget.max(1),
        }
    }

    /// Read everything currently available from `inner` into `on_chunk`.
    ///
    /// `Interrupted` is retried; any error other than `WouldBlock` is
    /// returned after the chunks read so far have been delivered.
    pub fn drain<R, F>(&mut self, inner: &mut R, mut on_chunk: F) -> Result<Drained>
    where
        R: Read + ?Sized,
        F: FnMut(&[u8]),
    {
        let mut drained = Drained::default();

        loop {
            if drained.bytes >= self.budget {
                drained.budget_exhausted = true;
                return Ok(drained);
            }

            let read = match inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(drained),
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                drained.closed = true;
                return Ok(drained);
            }

            on_chunk(&self.chunk[..read]);
            drained.bytes += read;
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }
}

impl Default for DrainReader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DrainReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainReader")
            .field("chunk_size", &self.chunk.len())
            .field("budget", &self.budget)
            .finish()
    }
}
