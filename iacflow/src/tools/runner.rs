//! Subprocess runner for external tools.
//!
//! Every adapter funnels its tool invocation through [`run_tool`]: render
//! the template, spawn the child with piped output, wait with an optional
//! timeout and capture stdout/stderr up to [`MAX_OUTPUT_BYTES`] each.

use super::ToolCommand;
use crate::credentials::SecretValue;
use crate::errors::ToolError;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Maximum stdout or stderr size captured per stream (10 MiB).
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Everything needed to run one tool command.
#[derive(Debug)]
pub struct ToolInvocation<'a> {
    /// The command template.
    pub command: &'a ToolCommand,
    /// Placeholder values.
    pub vars: BTreeMap<String, String>,
    /// Working directory for the child.
    pub working_dir: Option<PathBuf>,
    /// Secrets injected as environment variables.
    pub secrets: Vec<(String, SecretValue)>,
    /// Kill the child after this long.
    pub timeout: Option<Duration>,
}

impl<'a> ToolInvocation<'a> {
    /// Creates an invocation with no variables, secrets or timeout.
    #[must_use]
    pub fn new(command: &'a ToolCommand) -> Self {
        Self {
            command,
            vars: BTreeMap::new(),
            working_dir: None,
            secrets: Vec::new(),
            timeout: None,
        }
    }

    /// Sets the placeholder values.
    #[must_use]
    pub fn with_vars(mut self, vars: BTreeMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the secrets to inject.
    #[must_use]
    pub fn with_secrets(mut self, secrets: Vec<(String, SecretValue)>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The captured result of a finished tool process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// The rendered command line (secrets are never part of it).
    pub command_line: String,
    /// Process exit code, -1 when killed by a signal.
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl ToolOutput {
    /// Returns stderr if present, otherwise stdout, trimmed.
    #[must_use]
    pub fn diagnostics(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Runs a tool to completion.
///
/// A non-zero exit code is not an error here; callers decide what the exit
/// code means. The child is killed if the timeout fires or the returned
/// future is dropped.
///
/// # Errors
///
/// Returns [`ToolError`] if the command cannot be rendered or spawned, or
/// if it exceeds its timeout.
#[instrument(skip(invocation), fields(program = %invocation.command.program))]
pub async fn run_tool(invocation: ToolInvocation<'_>) -> Result<ToolOutput, ToolError> {
    let command = invocation.command;
    let args = command.render_args(&invocation.vars)?;
    let env = command.render_env(&invocation.vars)?;
    let command_line = command.display(&args);

    let mut cmd = Command::new(&command.program);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &env {
        cmd.env(key, value);
    }
    for (key, value) in &invocation.secrets {
        cmd.env(key, value.expose());
    }
    if let Some(dir) = &invocation.working_dir {
        cmd.current_dir(dir);
    }

    debug!(command = %command_line, version = ?command.version, "spawning tool");
    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
        program: command.program.clone(),
        source,
    })?;

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    let status = match invocation.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status,
            Err(_elapsed) => {
                // kill_on_drop also covers this, but reap explicitly so the
                // reader tasks see EOF.
                let _ = child.kill().await;
                return Err(ToolError::TimedOut {
                    program: command.program.clone(),
                    timeout,
                });
            }
        },
        None => child.wait().await,
    }
    .map_err(|source| ToolError::Spawn {
        program: command.program.clone(),
        source,
    })?;

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    let duration_ms = crate::utils::duration_ms(start.elapsed());
    let exit_code = status.code().unwrap_or(-1);
    debug!(exit_code, duration_ms, "tool finished");

    Ok(ToolOutput {
        command_line,
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        duration_ms,
    })
}

/// Reads a whole stream, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::credentials::SecretValue;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh").args(["-c", script])
    }

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let cmd = sh("echo out; echo err >&2; exit 3");
        let output = run_tool(ToolInvocation::new(&cmd)).await.unwrap();

        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.diagnostics(), "err");
        assert!(output.command_line.starts_with("sh -c"));
    }

    #[tokio::test]
    async fn test_placeholders_env_and_secrets() {
        let cmd = ToolCommand::new("sh")
            .args(["-c", "echo {greeting} $REGION $TOKEN"])
            .with_env("REGION", "{region}");
        let vars = BTreeMap::from([
            ("greeting".to_string(), "hello".to_string()),
            ("region".to_string(), "westeurope".to_string()),
        ]);

        let output = run_tool(
            ToolInvocation::new(&cmd)
                .with_vars(vars)
                .with_secrets(vec![("TOKEN".to_string(), SecretValue::new("t0k"))]),
        )
        .await
        .unwrap();

        assert_eq!(output.stdout.trim(), "hello westeurope t0k");
        assert!(!output.command_line.contains("t0k"));
    }

    #[tokio::test]
    async fn test_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.tf"), "").unwrap();
        let cmd = sh("ls");

        let output = run_tool(ToolInvocation::new(&cmd).in_dir(dir.path()))
            .await
            .unwrap();
        assert!(output.stdout.contains("main.tf"));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let cmd = sh("sleep 5");
        let err = run_tool(
            ToolInvocation::new(&cmd).with_timeout(Some(Duration::from_millis(100))),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ToolError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let cmd = ToolCommand::new("definitely-not-an-installed-tool-iacflow");
        let err = run_tool(ToolInvocation::new(&cmd)).await.unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
