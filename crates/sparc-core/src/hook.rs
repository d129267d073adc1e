//! Side channel notified after every phase run.
//!
//! Observers report failure through `Result`, but the orchestrator only logs
//! those failures; they never alter a verdict.

use crate::error::{Result, SparcError};
use crate::orchestrator::PhaseResult;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

pub trait PhaseObserver: Send + Sync {
    fn on_phase_complete(&self, result: &PhaseResult) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ShellHook
// ---------------------------------------------------------------------------

/// Runs `sh -c <command>` with the phase result as JSON on stdin.
///
/// The child also sees `SPARC_PHASE` and `SPARC_STATUS` in its environment.
#[derive(Debug, Clone)]
pub struct ShellHook {
    command: String,
    cwd: PathBuf,
    timeout: Duration,
}

impl ShellHook {
    pub fn new(command: impl Into<String>, cwd: &Path, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.to_path_buf(),
            timeout,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl PhaseObserver for ShellHook {
    fn on_phase_complete(&self, result: &PhaseResult) -> Result<()> {
        let payload = serde_json::to_vec(result)?;
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.cwd)
            .env("SPARC_PHASE", result.phase.as_str())
            .env("SPARC_STATUS", result.overall_status.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SparcError::Hook(format!("failed to spawn '{}': {e}", self.command)))?;

        let child_pid = child.id();

        // Feed stdin and drain both pipes on their own threads so a chatty or
        // slow hook cannot deadlock us on a full pipe buffer.
        let stdin = child.stdin.take();
        let writer = std::thread::spawn(move || {
            if let Some(mut w) = stdin {
                let _ = w.write_all(&payload);
            }
        });
        let stdout_thread = spawn_reader(child.stdout.take());
        let stderr_thread = spawn_reader(child.stderr.take());

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(child.wait());
        });

        let status = match rx.recv_timeout(self.timeout) {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(SparcError::Hook(format!("wait failed: {e}"))),
            Err(_) => {
                kill_process(child_pid);
                return Err(SparcError::Hook(format!(
                    "'{}' timed out after {}s",
                    self.command,
                    self.timeout.as_secs()
                )));
            }
        };

        let _ = writer.join();
        let stdout = stdout_thread.join().unwrap_or_default();
        let stderr = stderr_thread.join().unwrap_or_default();
        let output = format_output(&stdout, &stderr);

        if status.success() {
            tracing::debug!(command = %self.command, output = %output, "hook completed");
            Ok(())
        } else {
            Err(SparcError::Hook(format!(
                "'{}' exited with {status}: {output}",
                self.command
            )))
        }
    }
}

fn spawn_reader<R>(handle: Option<R>) -> std::thread::JoinHandle<String>
where
    R: std::io::Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut r) = handle {
            let _ = r.read_to_string(&mut buf);
        }
        buf
    })
}

/// Combine stdout/stderr and keep at most the last 10KB.
fn format_output(stdout: &str, stderr: &str) -> String {
    const MAX_OUTPUT: usize = 10 * 1024;
    let output = match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{stdout}\n{stderr}"),
    };
    let trimmed = output.trim();
    if trimmed.len() <= MAX_OUTPUT {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - MAX_OUTPUT;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

/// SIGKILL by pid. Best-effort.
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
