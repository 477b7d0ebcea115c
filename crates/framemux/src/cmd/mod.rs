use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use framemux_frame::{FrameConfig, DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_FRAME_SIZE};
use framemux_mux::{MuxConfig, DEFAULT_FPS, MAX_FPS};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod ctl;
pub mod doctor;
pub mod run;
pub mod version;

pub const DEFAULT_PREFIX: &str = "/tmp/framemux-";
pub const DEFAULT_CONTROL_PATH: &str = "/tmp/framemux-ctl.fifo";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Multiplex producer pipes onto stdout.
    Run(RunArgs),
    /// Send a selection command to a running multiplexer.
    Ctl(CtlArgs),
    /// Check pipe paths and the fallback frame.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args),
        Command::Ctl(args) => ctl::run(args, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where the producer and command pipes live.
#[derive(Args, Debug, Clone)]
pub struct PipeArgs {
    /// Number of producer pipes.
    #[arg(
        long,
        short = 'n',
        env = "FRAMEMUX_INPUTS",
        default_value_t = 2,
        value_parser = clap::value_parser!(u8).range(1..=8)
    )]
    pub inputs: u8,
    /// Producer pipe prefix; producer i reads `<PREFIX><i>.fifo`.
    #[arg(long, env = "FRAMEMUX_PREFIX", default_value = DEFAULT_PREFIX)]
    pub prefix: String,
    /// Command pipe path.
    #[arg(long, env = "FRAMEMUX_CONTROL", default_value = DEFAULT_CONTROL_PATH)]
    pub control: PathBuf,
}

impl PipeArgs {
    pub fn input_paths(&self) -> Vec<PathBuf> {
        (0..self.inputs)
            .map(|i| PathBuf::from(format!("{}{i}.fifo", self.prefix)))
            .collect()
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub paths: PipeArgs,
    /// Output frames per second.
    #[arg(
        long,
        env = "FRAMEMUX_FPS",
        default_value_t = DEFAULT_FPS,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_FPS))
    )]
    pub fps: u32,
    /// Frames at least this old (milliseconds) are replaced by the fallback.
    #[arg(
        long,
        env = "FRAMEMUX_STALE_MS",
        default_value_t = 500,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub stale_ms: u64,
    /// Frame forwarded when no producer frame qualifies.
    #[arg(long, env = "FRAMEMUX_FALLBACK", value_name = "FILE")]
    pub fallback: Option<PathBuf>,
    /// Largest frame forwarded, in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
    /// Per-producer accumulation buffer, in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER_CAPACITY)]
    pub buffer_size: usize,
}

impl RunArgs {
    pub fn mux_config(&self) -> MuxConfig {
        MuxConfig {
            inputs: usize::from(self.paths.inputs),
            fps: self.fps,
            staleness: Duration::from_millis(self.stale_ms),
            frame: FrameConfig {
                max_frame_size: self.max_frame_size,
                buffer_capacity: self.buffer_size,
                ..FrameConfig::default()
            },
            ..MuxConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct CtlArgs {
    /// Command pipe path.
    #[arg(long, env = "FRAMEMUX_CONTROL", default_value = DEFAULT_CONTROL_PATH)]
    pub control: PathBuf,
    /// Command to send: `source <N>`, `auto`, `testcard` or `fallback`.
    #[arg(required = true, num_args = 1.., value_name = "COMMAND")]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    #[command(flatten)]
    pub paths: PipeArgs,
    /// Fallback frame to check.
    #[arg(long, env = "FRAMEMUX_FALLBACK", value_name = "FILE")]
    pub fallback: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
