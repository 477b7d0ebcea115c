use std::path::{Path, PathBuf};

use framemux_frame::JPEG_SOI;
use framemux_transport::NamedPipe;
use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_json, render_table, OutputFormat};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: impl Into<String>, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let mut checks: Vec<CheckResult> = args
        .paths
        .input_paths()
        .iter()
        .enumerate()
        .map(|(i, path)| pipe_check(format!("input_{i}"), path))
        .collect();
    checks.push(pipe_check("control".to_string(), &args.paths.control));
    checks.push(fallback_check(args.fallback.as_deref()));
    checks.push(temp_dir_writable_check());

    let has_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);
    let output = DoctorOutput {
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table => {
            let rows = output
                .checks
                .iter()
                .map(|c| {
                    vec![
                        c.name.clone(),
                        status_text(c.status).to_string(),
                        c.detail.clone(),
                    ]
                })
                .collect();
            println!("{}", render_table(&["CHECK", "STATUS", "DETAIL"], rows));
            println!("overall: {}", output.overall);
        }
        OutputFormat::Pretty => {
            println!("framemux doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<12} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Skip => "SKIP",
    }
}

/// A missing pipe is created by `run`; anything else at the path blocks it.
fn pipe_check(name: String, path: &Path) -> CheckResult {
    if NamedPipe::is_fifo(path) {
        return CheckResult::new(name, CheckStatus::Pass, format!("{} is a fifo", path.display()));
    }
    match std::fs::symlink_metadata(path) {
        Err(_) => CheckResult::new(
            name,
            CheckStatus::Warn,
            format!("{} missing, will be created on run", path.display()),
        ),
        Ok(_) => CheckResult::new(
            name,
            CheckStatus::Fail,
            format!("{} exists but is not a fifo", path.display()),
        ),
    }
}

fn fallback_check(path: Option<&Path>) -> CheckResult {
    const NAME: &str = "fallback";
    let Some(path) = path else {
        return CheckResult::new(NAME, CheckStatus::Skip, "no fallback frame configured");
    };

    match std::fs::read(path) {
        Err(err) => CheckResult::new(
            NAME,
            CheckStatus::Fail,
            format!("{} unreadable: {err}", path.display()),
        ),
        Ok(data) if data.is_empty() => CheckResult::new(
            NAME,
            CheckStatus::Fail,
            format!("{} is empty", path.display()),
        ),
        Ok(data) if !data.starts_with(&JPEG_SOI) => CheckResult::new(
            NAME,
            CheckStatus::Warn,
            format!(
                "{} does not start with a JPEG start marker ({} bytes)",
                path.display(),
                data.len()
            ),
        ),
        Ok(data) => CheckResult::new(
            NAME,
            CheckStatus::Pass,
            format!("{} ({} bytes)", path.display(), data.len()),
        ),
    }
}

fn temp_dir_writable_check() -> CheckResult {
    const NAME: &str = "temp_dir";
    let dir = PathBuf::from(format!(
        "/tmp/framemux-doctor-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
    ));

    let result = std::fs::create_dir_all(&dir)
        .map_err(|err| err.to_string())
        .and_then(|()| {
            NamedPipe::ensure_fifo(&dir.join("doctor.fifo"), NamedPipe::DEFAULT_FIFO_MODE)
                .map_err(|err| err.to_string())
        });
    let _ = std::fs::remove_dir_all(&dir);

    match result {
        Ok(()) => CheckResult::new(NAME, CheckStatus::Pass, "/tmp fifo creation succeeded"),
        Err(err) => CheckResult::new(
            NAME,
            CheckStatus::Fail,
            format!("/tmp fifo creation failed: {err}"),
        ),
    }
}
