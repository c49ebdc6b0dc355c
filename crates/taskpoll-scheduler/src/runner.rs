//! Task runner: maps an executable to a concrete process invocation and
//! captures its outcome.
//!
//! The dispatch rule looks only at the resolved file's suffix:
//!
//! | Suffix          | Invocation                                           |
//! |-----------------|------------------------------------------------------|
//! | `.ps1`          | `powershell -ExecutionPolicy Bypass -File <path>`    |
//! | `.py`           | `<configured python> <path>`                         |
//! | `.bat` / `.cmd` | `cmd.exe /c <path>`                                  |
//! | anything else   | `<path>` executed directly                           |
//!
//! `Arguments` are split with POSIX shell-word rules and appended.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::error::RunError;
use crate::types::Dispatch;

/// Seam between the execution pool and whatever actually runs a task.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run the task to completion. Returns `true` on success.
    async fn execute(&self, dispatch: Dispatch) -> bool;
}

/// Program plus argument vector, ready for `Command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: OsString,
    pub args: Vec<OsString>,
}

/// Captured result of a process that was started.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// `[STDOUT]` / `[STDERR]` blocks for the log line, empty streams omitted.
    fn output_block(&self) -> String {
        let mut msg = String::new();
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        if !stdout.is_empty() {
            msg.push_str("\n[STDOUT]\n");
            msg.push_str(stdout);
        }
        if !stderr.is_empty() {
            msg.push_str("\n[STDERR]\n");
            msg.push_str(stderr);
        }
        msg
    }
}

/// Build the invocation for `resolved` according to its suffix.
pub fn build_command(
    resolved: &Path,
    arguments: Option<&str>,
    python: &str,
) -> Result<CommandLine, RunError> {
    let suffix = resolved
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let path = resolved.as_os_str().to_os_string();

    let (program, mut args): (OsString, Vec<OsString>) = match suffix.as_str() {
        "ps1" => (
            "powershell".into(),
            vec![
                "-ExecutionPolicy".into(),
                "Bypass".into(),
                "-File".into(),
                path,
            ],
        ),
        "py" => (python.into(), vec![path]),
        "bat" | "cmd" => ("cmd.exe".into(), vec!["/c".into(), path]),
        _ => (path, Vec::new()),
    };

    if let Some(raw) = arguments.filter(|a| !a.is_empty()) {
        let words =
            shell_words::split(raw).map_err(|_| RunError::Arguments(raw.to_string()))?;
        args.extend(words.into_iter().map(OsString::from));
    }

    Ok(CommandLine { program, args })
}

/// Production executor: spawns the task as a child process and waits for it.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    python: String,
}

impl ProcessRunner {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    /// Spawn and wait, capturing stdout and stderr in full.
    ///
    /// `Err` means the process never ran (bad arguments, spawn failure);
    /// a nonzero exit is an `Ok` result with `success() == false`.
    pub async fn run(&self, dispatch: &Dispatch) -> Result<ExecResult, RunError> {
        let cmd = build_command(
            &dispatch.resolved_path,
            dispatch.record.arguments.as_deref(),
            &self.python,
        )?;

        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(RunError::Spawn)?;

        Ok(ExecResult {
            exit_code: output.status.code(),
            stdout: strip_text(&output.stdout),
            stderr: strip_text(&output.stderr),
        })
    }
}

#[async_trait]
impl TaskExecutor for ProcessRunner {
    async fn execute(&self, dispatch: Dispatch) -> bool {
        let name = dispatch.record.name.as_str();
        info!(task = %name, "[{name}] Starting execution...");

        match self.run(&dispatch).await {
            Ok(result) if result.success() => {
                info!(task = %name, "[{name}] Completed successfully.{}", result.output_block());
                true
            }
            Ok(result) => {
                let code = result
                    .exit_code
                    .map_or_else(|| "signal".to_string(), |c| c.to_string());
                warn!(
                    task = %name,
                    exit_code = %code,
                    "[{name}] Failed (Code: {code}).{}",
                    result.output_block()
                );
                false
            }
            Err(e) => {
                error!(task = %name, "[{name}] Exception: {e}");
                false
            }
        }
    }
}

/// Strip ANSI escape codes and convert bytes to a UTF-8 string.
fn strip_text(raw: &[u8]) -> String {
    let clean = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&clean).into_owned()
}
