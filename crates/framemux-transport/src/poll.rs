use std::os::fd::RawFd;
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::traits::Readiness;

const READABLE: libc::c_short = libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;
const WRITABLE: libc::c_short = libc::POLLOUT | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;

/// [`Readiness`] backed by `poll(2)`.
#[derive(Debug, Default)]
pub struct PollReadiness {
    fds: Vec<libc::pollfd>,
}

impl PollReadiness {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Readiness for PollReadiness {
    fn wait(&mut self, fds: &[RawFd], timeout: Duration, ready: &mut [bool]) -> Result<usize> {
        debug_assert_eq!(fds.len(), ready.len());

        self.fds.clear();
        self.fds.extend(fds.iter().map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        }));

        let count = poll_fds(&mut self.fds, timeout).map_err(TransportError::Poll)?;

        let mut hits = 0;
        for (slot, pfd) in ready.iter_mut().zip(&self.fds) {
            *slot = count > 0 && pfd.revents & READABLE != 0;
            hits += usize::from(*slot);
        }
        Ok(hits)
    }

    fn idle(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Wait up to `timeout` for `fd` to accept writes.
///
/// Error and hang-up conditions report `true` so the following write
/// surfaces the underlying failure.
pub fn wait_writable(fd: RawFd, timeout: Duration) -> std::io::Result<bool> {
    let mut pfd = [libc::pollfd {
        fd,
        events: libc::POLLOUT,
        revents: 0,
    }];
    let count = poll_fds(&mut pfd, timeout)?;
    Ok(count > 0 && pfd[0].revents & WRITABLE != 0)
}

/// Run `poll(2)`, treating `EINTR` as a timeout with nothing ready.
fn poll_fds(fds: &mut [libc::pollfd], timeout: Duration) -> std::io::Result<usize> {
    // SAFETY: `fds` is a valid, exclusively borrowed slice of `pollfd` and the
    // length passed matches it.
    let rc = unsafe {
        libc::poll(
            fds.as_mut_ptr(),
            fds.len() as libc::nfds_t,
            timeout_millis(timeout),
        )
    };

    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::Interrupted {
            for pfd in fds.iter_mut() {
                pfd.revents = 0;
            }
            return Ok(0);
        }
        return Err(err);
    }
    Ok(rc as usize)
}

/// Millisecond timeout for `poll(2)`, rounded up so a sub-millisecond
/// remainder does not turn into a zero-timeout busy loop.
fn timeout_millis(timeout: Duration) -> libc::c_int {
    let millis = timeout.as_micros().div_ceil(1000);
    libc::c_int::try_from(millis).unwrap_or(libc::c_int::MAX)
}
