//! In-memory sources, readiness and consumer for driving the loop on a
//! manual clock.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::{Duration, Instant};

use framemux_transport::{ByteSource, Readiness, Result as TransportResult, WaitWritable};

use crate::clock::{Clock, ManualClock};
use crate::shutdown::ShutdownToken;

#[derive(Default)]
struct Pipe {
    exists: bool,
    open: bool,
    data: VecDeque<u8>,
    fail_next_read: bool,
    writer_closed: bool,
}

impl Pipe {
    fn readable(&self) -> bool {
        !self.data.is_empty() || self.fail_next_read || self.writer_closed
    }
}

#[derive(Default)]
struct HubState {
    pipes: HashMap<RawFd, Pipe>,
    scheduled: Vec<(Instant, RawFd, Vec<u8>)>,
    next_fd: RawFd,
}

impl HubState {
    fn deliver_due(&mut self, now: Instant) {
        let (due, later): (Vec<_>, Vec<_>) =
            self.scheduled.drain(..).partition(|(at, _, _)| *at <= now);
        self.scheduled = later;
        for (_, fd, bytes) in due {
            if let Some(pipe) = self.pipes.get_mut(&fd) {
                pipe.data.extend(bytes);
            }
        }
    }

    fn next_delivery(&self) -> Option<Instant> {
        self.scheduled.iter().map(|(at, _, _)| *at).min()
    }
}

/// Shared world of simulated pipes and the clock they run on.
#[derive(Clone)]
pub struct SimHub {
    state: Rc<RefCell<HubState>>,
    clock: ManualClock,
    start: Instant,
}

impl SimHub {
    pub fn new(start: Instant) -> Self {
        let state = HubState {
            next_fd: 100,
            ..HubState::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
            clock: ManualClock::new(start),
            start,
        }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    pub fn readiness(&self) -> SimReadiness {
        SimReadiness { hub: self.clone() }
    }

    pub fn source(&self, name: &str) -> SimSource {
        self.add_source(name, true)
    }

    /// A source whose pipe does not exist until [`SimHub::create`].
    pub fn absent_source(&self, name: &str) -> SimSource {
        self.add_source(name, false)
    }

    fn add_source(&self, name: &str, exists: bool) -> SimSource {
        let mut state = self.state.borrow_mut();
        let fd = state.next_fd;
        state.next_fd += 1;
        state.pipes.insert(
            fd,
            Pipe {
                exists,
                ..Pipe::default()
            },
        );
        SimSource {
            hub: self.clone(),
            fd,
            name: name.to_string(),
        }
    }

    pub fn create(&self, fd: RawFd) {
        self.with_pipe(fd, |pipe| pipe.exists = true);
    }

    pub fn write(&self, fd: RawFd, bytes: &[u8]) {
        self.with_pipe(fd, |pipe| pipe.data.extend(bytes.iter().copied()));
    }

    pub fn write_at(&self, at: Instant, fd: RawFd, bytes: &[u8]) {
        self.state
            .borrow_mut()
            .scheduled
            .push((at, fd, bytes.to_vec()));
    }

    /// The next read after the buffered bytes fails.
    pub fn fail_next_read(&self, fd: RawFd) {
        self.with_pipe(fd, |pipe| pipe.fail_next_read = true);
    }

    /// The next read after the buffered bytes reports end-of-stream.
    pub fn close_writer(&self, fd: RawFd) {
        self.with_pipe(fd, |pipe| pipe.writer_closed = true);
    }

    pub fn is_open(&self, fd: RawFd) -> bool {
        self.state
            .borrow()
            .pipes
            .get(&fd)
            .is_some_and(|pipe| pipe.open)
    }

    fn with_pipe<T>(&self, fd: RawFd, f: impl FnOnce(&mut Pipe) -> T) -> T {
        let mut state = self.state.borrow_mut();
        let pipe = state.pipes.get_mut(&fd).expect("unknown simulated fd");
        f(pipe)
    }

    fn advance(&self, by: Duration) {
        let now = self.clock.now();
        let target = now + by;
        let mut state = self.state.borrow_mut();
        let next = state
            .next_delivery()
            .filter(|at| *at > now && *at < target)
            .unwrap_or(target);
        self.clock.set(next);
        state.deliver_due(next);
    }
}

pub struct SimSource {
    hub: SimHub,
    fd: RawFd,
    name: String,
}

impl SimSource {
    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

impl ByteSource for SimSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn ensure_open(&mut self) -> TransportResult<bool> {
        Ok(self.hub.with_pipe(self.fd, |pipe| {
            if pipe.exists {
                pipe.open = true;
            }
            pipe.open
        }))
    }

    fn is_open(&self) -> bool {
        self.hub.is_open(self.fd)
    }

    fn poll_fd(&self) -> Option<RawFd> {
        self.is_open().then_some(self.fd)
    }

    fn close(&mut self) {
        self.hub.with_pipe(self.fd, |pipe| pipe.open = false);
    }
}

impl Read for SimSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.hub.with_pipe(self.fd, |pipe| {
            if !pipe.open {
                return Err(ErrorKind::NotConnected.into());
            }
            if !pipe.data.is_empty() {
                let n = buf.len().min(pipe.data.len());
                for (slot, byte) in buf.iter_mut().zip(pipe.data.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if pipe.fail_next_read {
                pipe.fail_next_read = false;
                return Err(std::io::Error::other("simulated read failure"));
            }
            if pipe.writer_closed {
                pipe.writer_closed = false;
                return Ok(0);
            }
            Err(ErrorKind::WouldBlock.into())
        })
    }
}

/// Readiness that moves the manual clock instead of sleeping.
///
/// A wait with nothing readable advances time to the earlier of the timeout
/// and the next scheduled write.
pub struct SimReadiness {
    hub: SimHub,
}

impl Readiness for SimReadiness {
    fn wait(
        &mut self,
        fds: &[RawFd],
        timeout: Duration,
        ready: &mut [bool],
    ) -> TransportResult<usize> {
        let scan = |ready: &mut [bool]| {
            let state = self.hub.state.borrow();
            let mut hits = 0;
            for (slot, fd) in ready.iter_mut().zip(fds) {
                *slot = state.pipes.get(fd).is_some_and(Pipe::readable);
                hits += usize::from(*slot);
            }
            hits
        };

        self.hub
            .state
            .borrow_mut()
            .deliver_due(self.hub.clock.now());
        let hits = scan(ready);
        if hits > 0 || timeout.is_zero() {
            return Ok(hits);
        }

        self.hub.advance(timeout);
        Ok(scan(ready))
    }

    fn idle(&mut self, duration: Duration) {
        self.hub.clock.advance(duration);
        self.hub
            .state
            .borrow_mut()
            .deliver_due(self.hub.clock.now());
    }
}

#[derive(Default)]
struct ConsumerState {
    frames: Vec<(Instant, Vec<u8>)>,
    fail_after: Option<usize>,
    cancel_after: Option<(usize, ShutdownToken)>,
}

/// Consumer recording each write with the clock time it happened at.
#[derive(Clone)]
pub struct SharedConsumer {
    state: Rc<RefCell<ConsumerState>>,
    clock: ManualClock,
}

impl SharedConsumer {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            state: Rc::default(),
            clock,
        }
    }

    pub fn frames(&self) -> Vec<(Instant, Vec<u8>)> {
        self.state.borrow().frames.clone()
    }

    /// Accept `count` writes, then fail with a broken pipe.
    pub fn fail_after(&self, count: usize) {
        self.state.borrow_mut().fail_after = Some(count);
    }

    /// Cancel `token` once `count` writes were accepted.
    pub fn cancel_after(&self, count: usize, token: ShutdownToken) {
        self.state.borrow_mut().cancel_after = Some((count, token));
    }
}

impl Write for SharedConsumer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.state.borrow_mut();
        if state.fail_after.is_some_and(|limit| state.frames.len() >= limit) {
            return Err(ErrorKind::BrokenPipe.into());
        }
        state.frames.push((self.clock.now(), buf.to_vec()));
        if let Some((count, token)) = &state.cancel_after {
            if state.frames.len() >= *count {
                token.cancel();
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl WaitWritable for SharedConsumer {
    fn wait_writable(&mut self, _timeout: Duration) -> std::io::Result<bool> {
        Ok(true)
    }
}
