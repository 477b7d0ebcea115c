use std::os::fd::RawFd;
use std::time::Duration;

use bytes::Bytes;
use framemux_frame::{DrainReader, Drained, InputChannel, OutputSink, READ_CHUNK_SIZE};
use framemux_transport::{ByteSource, PollReadiness, Readiness, WaitWritable};
use tracing::{debug, info, trace, warn};

use crate::cadence::Cadence;
use crate::clock::{Clock, MonotonicClock};
use crate::config::MuxConfig;
use crate::control::{Command, ControlChannel};
use crate::error::{MuxError, Result};
use crate::policy::{FrameOrigin, SelectionPolicy};
use crate::shutdown::ShutdownToken;

/// Counters describing a finished (or running) loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub iterations: u64,
    /// Iterations in which no source was open.
    pub idle_iterations: u64,
    pub frames_emitted: u64,
    /// Output ticks with neither a fresh frame nor a fallback.
    pub empty_ticks: u64,
    pub commands_applied: u64,
    /// Successful opens of a source that had been open before.
    pub reopens: u64,
}

struct Endpoint<S> {
    source: S,
    opened_before: bool,
    announced: bool,
}

impl<S> Endpoint<S> {
    fn new(source: S) -> Self {
        Self {
            source,
            opened_before: false,
            announced: false,
        }
    }
}

/// Single-threaded readiness loop that forwards one producer's frames at a
/// fixed rate.
///
/// Producers `0..inputs` and the command source are drained whenever they
/// become readable; on every output tick the [`SelectionPolicy`] picks a
/// frame and it is written to the sink. A source that is missing or fails is
/// retried on later iterations. Only a sink failure stops the loop early.
pub struct Multiplexer<S, W, R = PollReadiness, C = MonotonicClock> {
    config: MuxConfig,
    endpoints: Vec<Endpoint<S>>,
    channels: Vec<InputChannel>,
    commands: ControlChannel,
    policy: SelectionPolicy,
    reader: DrainReader,
    sink: OutputSink<W>,
    readiness: R,
    clock: C,
    cadence: Cadence,
    last_origin: Option<FrameOrigin>,
    stats: LoopStats,
    fds: Vec<RawFd>,
    slots: Vec<usize>,
    ready: Vec<bool>,
}

impl<S: ByteSource, W: WaitWritable> Multiplexer<S, W> {
    /// Build a multiplexer that waits with `poll(2)` on the monotonic clock.
    pub fn new(config: MuxConfig, inputs: Vec<S>, control: S, sink: W) -> Result<Self> {
        Self::with_parts(
            config,
            inputs,
            control,
            sink,
            PollReadiness::new(),
            MonotonicClock,
        )
    }
}

impl<S, W, R, C> Multiplexer<S, W, R, C>
where
    S: ByteSource,
    W: WaitWritable,
    R: Readiness,
    C: Clock,
{
    /// Build a multiplexer with an explicit readiness wait and clock.
    pub fn with_parts(
        config: MuxConfig,
        inputs: Vec<S>,
        control: S,
        sink: W,
        readiness: R,
        clock: C,
    ) -> Result<Self> {
        config.validate()?;
        if inputs.len() != config.inputs {
            return Err(MuxError::InvalidConfig(format!(
                "configured for {} inputs but {} sources were given",
                config.inputs,
                inputs.len()
            )));
        }

        let channels = (0..config.inputs)
            .map(|index| InputChannel::new(index, &config.frame))
            .collect();
        let mut endpoints: Vec<_> = inputs.into_iter().map(Endpoint::new).collect();
        endpoints.push(Endpoint::new(control));

        let start = clock.now();
        Ok(Self {
            commands: ControlChannel::new(config.control_capacity),
            policy: SelectionPolicy::new(config.inputs, config.staleness, None),
            reader: DrainReader::with_limits(READ_CHUNK_SIZE, config.drain_budget),
            sink: OutputSink::with_config(sink, config.sink.clone(), start),
            cadence: Cadence::from_fps(config.fps),
            endpoints,
            channels,
            readiness,
            clock,
            config,
            last_origin: None,
            stats: LoopStats::default(),
            fds: Vec::new(),
            slots: Vec::new(),
            ready: Vec::new(),
        })
    }

    /// Frame forwarded whenever no producer frame qualifies.
    pub fn with_fallback(mut self, fallback: Bytes) -> Self {
        self.policy =
            SelectionPolicy::new(self.config.inputs, self.config.staleness, Some(fallback));
        self
    }

    /// Run until `shutdown` is cancelled or the sink fails.
    ///
    /// All sources are closed before returning, on either path.
    pub fn run(&mut self, shutdown: &ShutdownToken) -> Result<LoopStats> {
        info!(
            inputs = self.config.inputs,
            fps = self.config.fps,
            staleness_ms = self.config.staleness.as_millis() as u64,
            fallback = self.policy.fallback().is_some(),
            "multiplexer started"
        );

        let outcome = loop {
            if shutdown.is_cancelled() {
                info!("shutdown requested");
                break Ok(());
            }
            if let Err(err) = self.step() {
                break Err(err);
            }
        };

        self.close_all();
        outcome.map(|()| self.stats)
    }

    /// One loop iteration: open, wait, drain ready sources, maybe emit.
    pub fn step(&mut self) -> Result<()> {
        self.stats.iterations += 1;
        self.open_sources();
        self.collect_fds();

        let until_tick = self.cadence.time_until_due(self.clock.now());
        if self.fds.is_empty() {
            self.stats.idle_iterations += 1;
            let pause = self.config.idle_backoff.min(until_tick);
            if !pause.is_zero() {
                self.readiness.idle(pause);
            }
        } else {
            self.ready.clear();
            self.ready.resize(self.fds.len(), false);
            let hits = self.readiness.wait(&self.fds, until_tick, &mut self.ready)?;
            if hits > 0 {
                self.service_ready();
            }
        }

        self.tick()
    }

    fn open_sources(&mut self) {
        let control_slot = self.control_slot();
        for (slot, endpoint) in self.endpoints.iter_mut().enumerate() {
            if endpoint.source.is_open() {
                continue;
            }
            match endpoint.source.ensure_open() {
                Ok(true) => {
                    if endpoint.opened_before {
                        self.stats.reopens += 1;
                    }
                    if slot == control_slot {
                        self.commands.reset();
                    }
                    endpoint.opened_before = true;
                    endpoint.announced = false;
                }
                Ok(false) => {
                    if !endpoint.announced {
                        debug!(source = endpoint.source.name(), "waiting for source");
                        endpoint.announced = true;
                    }
                }
                Err(err) => {
                    if !endpoint.announced {
                        warn!(
                            source = endpoint.source.name(),
                            error = %err,
                            "cannot open source, will retry"
                        );
                        endpoint.announced = true;
                    }
                }
            }
        }
    }

    fn collect_fds(&mut self) {
        self.fds.clear();
        self.slots.clear();
        for (slot, endpoint) in self.endpoints.iter().enumerate() {
            if let Some(fd) = endpoint.source.poll_fd() {
                self.fds.push(fd);
                self.slots.push(slot);
            }
        }
    }

    fn service_ready(&mut self) {
        for i in 0..self.fds.len() {
            if !self.ready[i] {
                continue;
            }
            let slot = self.slots[i];
            if slot == self.control_slot() {
                self.service_control();
            } else {
                self.service_input(slot);
            }
        }
    }

    fn service_input(&mut self, slot: usize) {
        let now = self.clock.now();
        let endpoint = &mut self.endpoints[slot];
        let channel = &mut self.channels[slot];

        let outcome = self.reader.drain(&mut endpoint.source, |chunk| {
            channel.accumulate(chunk, now);
        });
        if Self::finish_drain(endpoint, outcome) {
            channel.discard_partial();
        }
    }

    fn service_control(&mut self) {
        let slot = self.control_slot();
        let endpoint = &mut self.endpoints[slot];
        let commands = &mut self.commands;

        let mut received: Vec<Command> = Vec::new();
        let outcome = self.reader.drain(&mut endpoint.source, |chunk| {
            received.extend(commands.feed(chunk));
        });
        if Self::finish_drain(endpoint, outcome) {
            commands.reset();
        }

        for command in received {
            if self.policy.apply(command) {
                self.stats.commands_applied += 1;
            }
        }
    }

    /// Close the endpoint after end-of-stream or a read error. Returns
    /// whether it was closed.
    fn finish_drain(endpoint: &mut Endpoint<S>, outcome: framemux_frame::Result<Drained>) -> bool {
        match outcome {
            Ok(drained) if drained.closed => {
                info!(source = endpoint.source.name(), "source closed by writer");
            }
            Ok(drained) => {
                if drained.budget_exhausted {
                    trace!(
                        source = endpoint.source.name(),
                        bytes = drained.bytes,
                        "read budget spent, continuing next iteration"
                    );
                }
                return false;
            }
            Err(err) => {
                warn!(
                    source = endpoint.source.name(),
                    error = %err,
                    "read failed, reopening source"
                );
            }
        }
        endpoint.source.close();
        true
    }

    fn tick(&mut self) -> Result<()> {
        let now = self.clock.now();
        if !self.cadence.try_tick(now) {
            return Ok(());
        }

        let Some(frame) = self.policy.choose_frame(&self.channels, now) else {
            self.stats.empty_ticks += 1;
            if self.last_origin.take().is_some() {
                info!("no frame available, output paused");
            }
            return Ok(());
        };

        if self.last_origin != Some(frame.origin) {
            info!(origin = %frame.origin, "forwarding");
            self.last_origin = Some(frame.origin);
        }
        self.sink.emit(&frame.data, now)?;
        self.stats.frames_emitted += 1;
        Ok(())
    }

    fn close_all(&mut self) {
        for endpoint in &mut self.endpoints {
            endpoint.source.close();
        }
        for channel in &mut self.channels {
            channel.discard_partial();
        }
        self.commands.reset();
        debug!("closed all sources");
    }

    fn control_slot(&self) -> usize {
        self.endpoints.len() - 1
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    pub fn channels(&self) -> &[InputChannel] {
        &self.channels
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Lines rejected by the command parser so far.
    pub fn rejected_commands(&self) -> u64 {
        self.commands.rejected()
    }

    pub fn sink(&self) -> &OutputSink<W> {
        &self.sink
    }

    /// Time until the next output tick.
    pub fn time_until_tick(&self) -> Duration {
        self.cadence.time_until_due(self.clock.now())
    }
}

impl<S, W, R, C> std::fmt::Debug for Multiplexer<S, W, R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .field("stats", &self.stats)
            .finish()
    }
}
