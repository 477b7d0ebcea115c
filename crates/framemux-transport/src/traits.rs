use std::io::{Read, Write};
use std::os::fd::RawFd;
use std::time::Duration;

use crate::error::Result;

/// A named, reopenable byte stream that the multiplexer drains on readiness.
///
/// Reads must be non-blocking: once no more bytes are available a read
/// returns `ErrorKind::WouldBlock` instead of parking the caller.
pub trait ByteSource: Read {
    /// Human-readable identity used in log lines.
    fn name(&self) -> &str;

    /// Open the source if it is not open yet.
    ///
    /// Returns `Ok(false)` when the source does not exist yet. Errors are
    /// transient from the caller's point of view and the open is retried on
    /// a later iteration.
    fn ensure_open(&mut self) -> Result<bool>;

    /// Whether the source currently holds an open descriptor.
    fn is_open(&self) -> bool;

    /// Descriptor to register with a [`Readiness`] wait, if open.
    fn poll_fd(&self) -> Option<RawFd>;

    /// Release the descriptor. A later [`ByteSource::ensure_open`] reopens it.
    fn close(&mut self);
}

/// Multiplexed readiness wait across many descriptors.
pub trait Readiness {
    /// Wait until at least one of `fds` is readable or `timeout` passes.
    ///
    /// `ready` has the same length as `fds` and is overwritten with the
    /// per-descriptor result. Returns the number of ready descriptors.
    /// Hang-up and error conditions count as ready so the caller observes
    /// them on its next read.
    fn wait(&mut self, fds: &[RawFd], timeout: Duration, ready: &mut [bool]) -> Result<usize>;

    /// Back off while there is nothing to wait on.
    fn idle(&mut self, duration: Duration);
}

/// A byte sink that can block, with a bound, until it accepts more data.
pub trait WaitWritable: Write {
    /// Returns `Ok(false)` if the sink is still not writable after `timeout`.
    fn wait_writable(&mut self, timeout: Duration) -> std::io::Result<bool>;
}

impl<T: WaitWritable + ?Sized> WaitWritable for &mut T {
    fn wait_writable(&mut self, timeout: Duration) -> std::io::Result<bool> {
        (**self).wait_writable(timeout)
    }
}
