use std::fs::File;
use std::io::Write;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::time::Duration;

use crate::error::Result;
use crate::poll::wait_writable;
use crate::traits::WaitWritable;

/// Unbuffered, non-blocking sink over an owned descriptor.
///
/// `std::io::Stdout` is line-buffered, which is wrong for binary frames, so
/// the process output is written through a duplicate of descriptor 1. The
/// descriptor is switched to `O_NONBLOCK` so a stalled consumer surfaces as
/// `WouldBlock` instead of parking the process inside `write(2)`.
#[derive(Debug)]
pub struct FdSink {
    file: File,
    /// Status flags to put back on drop. The duplicate shares its open file
    /// description with descriptor 1, so the change is visible to whoever
    /// else holds it (a terminal, the parent shell).
    restore_flags: Option<libc::c_int>,
}

impl FdSink {
    /// Sink writing to the process's standard output.
    pub fn stdout() -> Result<Self> {
        let fd: OwnedFd = std::io::stdout().as_fd().try_clone_to_owned()?;
        let previous = set_nonblocking(fd.as_raw_fd())?;
        Ok(Self {
            file: File::from(fd),
            restore_flags: Some(previous),
        })
    }

    /// Sink writing to an already opened file, pipe or socket.
    pub fn from_file(file: File) -> Result<Self> {
        set_nonblocking(file.as_raw_fd())?;
        Ok(Self {
            file,
            restore_flags: None,
        })
    }
}

/// Add `O_NONBLOCK` to `fd` and return the flags it had before.
fn set_nonblocking(fd: RawFd) -> std::io::Result<libc::c_int> {
    // SAFETY: `fd` is an open descriptor owned by the caller for the
    // duration of the call; F_GETFL takes no pointer arguments.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    if flags & libc::O_NONBLOCK == 0 {
        // SAFETY: as above; F_SETFL takes an integer flag argument.
        let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(flags)
}

impl Drop for FdSink {
    fn drop(&mut self) {
        if let Some(flags) = self.restore_flags {
            // SAFETY: `self.file` is still open here.
            unsafe { libc::fcntl(self.file.as_raw_fd(), libc::F_SETFL, flags) };
        }
    }
}

impl AsFd for FdSink {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl Write for FdSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl WaitWritable for FdSink {
    fn wait_writable(&mut self, timeout: Duration) -> std::io::Result<bool> {
        wait_writable(self.file.as_raw_fd(), timeout)
    }
}
