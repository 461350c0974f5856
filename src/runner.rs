use anyhow::{Context, Result};
use std::process::Command;
use thiserror::Error;

/// A system command that ran but exited unsuccessfully
#[derive(Debug, Error)]
#[error("{command} failed ({}): {stderr}", describe_code(*.code))]
pub struct CommandError {
    pub command: String,
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stderr: String,
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Render a command line for logs and errors
pub fn command_line(cmd: &str, args: &[&str]) -> String {
    if args.is_empty() {
        cmd.to_string()
    } else {
        format!("{} {}", cmd, args.join(" "))
    }
}

/// Run a command and capture output
///
/// A non-zero exit becomes a [`CommandError`] carrying the exit code.
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    let line = command_line(cmd, args);
    log::debug!("Running: {}", line);

    let output = Command::new(cmd)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute: {line}"))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(CommandError {
            command: line,
            code: output.status.code(),
            stderr,
        }
        .into())
    }
}

/// Run a command, discarding its output
pub fn run(cmd: &str, args: &[&str]) -> Result<()> {
    run_capture(cmd, args).map(|_| ())
}

/// Exit code of the first failing command in an error chain
pub fn exit_code(err: &anyhow::Error) -> Option<i32> {
    err.chain()
        .find_map(|e| e.downcast_ref::<CommandError>())
        .and_then(|e| e.code)
}
