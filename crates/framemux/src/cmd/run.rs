use std::path::Path;

use bytes::Bytes;
use framemux_mux::{Multiplexer, ShutdownToken};
use framemux_transport::{FdSink, NamedPipe};
use tracing::{error, info, warn};

use crate::cmd::RunArgs;
use crate::exit::{mux_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: RunArgs) -> CliResult<i32> {
    let config = args.mux_config();
    let input_paths = args.paths.input_paths();

    info!(
        inputs = config.inputs,
        fps = config.fps,
        stale_ms = args.stale_ms,
        control = ?args.paths.control,
        fallback = ?args.fallback,
        "framemux starting"
    );
    for (input, path) in input_paths.iter().enumerate() {
        info!(input, path = ?path, "producer pipe");
    }

    let fallback = args.fallback.as_deref().and_then(load_fallback);
    let sources: Vec<NamedPipe> = input_paths.iter().map(NamedPipe::new).collect();
    let control = NamedPipe::new(&args.paths.control);
    let sink = FdSink::stdout().map_err(|err| transport_error("cannot open stdout", err))?;

    let mut mux = Multiplexer::new(config, sources, control, sink)
        .map_err(|err| mux_error("invalid configuration", err))?;
    if let Some(fallback) = fallback {
        mux = mux.with_fallback(fallback);
    }

    let shutdown = ShutdownToken::new();
    install_signal_handler(shutdown.clone())?;

    match mux.run(&shutdown) {
        Ok(stats) => {
            info!(
                iterations = stats.iterations,
                frames = stats.frames_emitted,
                empty_ticks = stats.empty_ticks,
                commands = stats.commands_applied,
                reopens = stats.reopens,
                "framemux: done"
            );
            Ok(SUCCESS)
        }
        Err(err) => {
            error!(
                error = %err,
                frames = mux.stats().frames_emitted,
                "multiplexer stopped"
            );
            Err(mux_error("output failed", err))
        }
    }
}

/// Read the fallback frame once. Missing, unreadable or empty files leave
/// the multiplexer without one.
fn load_fallback(path: &Path) -> Option<Bytes> {
    match std::fs::read(path) {
        Ok(data) if data.is_empty() => {
            warn!(path = ?path, "fallback frame is empty, continuing without one");
            None
        }
        Ok(data) => {
            info!(path = ?path, size = data.len(), "loaded fallback frame");
            Some(Bytes::from(data))
        }
        Err(err) => {
            warn!(path = ?path, error = %err, "cannot read fallback frame, continuing without one");
            None
        }
    }
}

fn install_signal_handler(shutdown: ShutdownToken) -> CliResult<()> {
    ctrlc::set_handler(move || shutdown.cancel()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(tag: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "framemux-run-{tag}-{}.jpg",
            std::process::id()
        ));
        std::fs::write(&path, contents).expect("temp file should be writable");
        path
    }

    #[test]
    fn loads_non_empty_fallback() {
        let path = temp_file("ok", &[0xFF, 0xD8, 0x01, 0xFF, 0xD9]);
        let frame = load_fallback(&path).expect("fallback should load");
        assert_eq!(frame.as_ref(), &[0xFF, 0xD8, 0x01, 0xFF, 0xD9]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn empty_or_missing_fallback_is_none() {
        let path = temp_file("empty", b"");
        assert!(load_fallback(&path).is_none());
        let _ = std::fs::remove_file(&path);

        assert!(load_fallback(Path::new("/nonexistent/framemux/testcard.jpg")).is_none());
    }
}
