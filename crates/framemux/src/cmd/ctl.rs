use std::io::{ErrorKind, Write};
use std::path::Path;

use framemux_mux::Command;
use framemux_transport::{NamedPipe, TransportError};
use serde::Serialize;
use tracing::debug;

use crate::cmd::CtlArgs;
use crate::exit::{
    io_error, transport_error, CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS,
};
use crate::output::{print_json, render_table, OutputFormat};

#[derive(Debug, Serialize)]
struct CtlOutput<'a> {
    control: &'a Path,
    command: String,
    sent: bool,
}

pub fn run(args: CtlArgs, format: OutputFormat) -> CliResult<i32> {
    let line = args.command.join(" ");
    let command: Command = line
        .parse()
        .map_err(|err| CliError::new(DATA_INVALID, format!("cannot send {line:?}: {err}")))?;

    send(&args.control, command)?;
    debug!(%command, control = ?args.control, "sent command");

    let output = CtlOutput {
        control: &args.control,
        command: command.to_string(),
        sent: true,
    };
    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => println!(
            "{}",
            render_table(
                &["CONTROL", "COMMAND"],
                vec![vec![
                    output.control.display().to_string(),
                    output.command.clone()
                ]]
            )
        ),
        OutputFormat::Pretty => {
            println!("sent {:?} to {}", output.command, output.control.display())
        }
    }
    Ok(SUCCESS)
}

/// Write one command line without blocking on a pipe nobody reads.
fn send(control: &Path, command: Command) -> CliResult<()> {
    let mut pipe = NamedPipe::open_writer(control).map_err(|err| match err {
        TransportError::NoReader { .. } => CliError::new(
            FAILURE,
            format!("no multiplexer is reading {}", control.display()),
        ),
        TransportError::Open { ref source, .. } if source.kind() == ErrorKind::NotFound => {
            CliError::new(
                FAILURE,
                format!("control pipe {} does not exist", control.display()),
            )
        }
        other => transport_error("cannot open control pipe", other),
    })?;

    pipe.write_all(format!("{command}\n").as_bytes())
        .map_err(|err| io_error("cannot write command", err))
}
