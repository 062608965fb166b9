//! Subprocess execution shared by the CLI-driven backends.

use crate::backends::CommandOutput;
use crate::error::BackendError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Run `program args...` in `cwd`, capturing output
///
/// A non-zero exit is not an error here; callers inspect `CommandOutput::ok`.
/// Spawn failures and timeouts are.
pub async fn run_command(
    program: &str,
    args: &[&str],
    cwd: &Path,
    limit: Duration,
) -> Result<CommandOutput, BackendError> {
    let command_line = format!("{} {}", program, args.join(" "));
    log::debug!("running `{}` in {}", command_line, cwd.display());

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = timeout(limit, cmd.output())
        .await
        .map_err(|_| BackendError::Transient {
            reason: format!("`{}` timed out after {}s", command_line, limit.as_secs()),
        })?
        .map_err(|e| BackendError::CommandFailed {
            command: command_line.clone(),
            reason: format!("Failed to execute: {}", e),
        })?;

    Ok(CommandOutput {
        command: command_line,
        ok: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Fail unless `program` resolves on PATH
pub(crate) fn require_tool(program: &str) -> Result<(), BackendError> {
    which::which(program)
        .map(|_| ())
        .map_err(|_| BackendError::ToolNotFound {
            tool: program.to_string(),
        })
}
