//! Running the executable with the document on stdin.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::error::{EngineError, EngineResult};

/// Captured result of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
}

impl RunResult {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Spawns subprocesses, at most `max_concurrent` at a time.
///
/// Waiting for a permit or for the child is a suspension point; other tasks
/// keep running. No timeout is applied.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    permits: Arc<Semaphore>,
}

impl ProcessInvoker {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    #[cfg(test)]
    pub(crate) fn permits(&self) -> Arc<Semaphore> {
        Arc::clone(&self.permits)
    }

    pub async fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: Option<&Path>,
        input: &str,
    ) -> EngineResult<RunResult> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| std::io::Error::other("process pool closed"))?;

        tracing::debug!(program = %program.display(), ?args, cwd = ?cwd, "Running Ruff");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| EngineError::Spawn {
            path: program.to_path_buf(),
            source,
        })?;

        // Feed stdin from a separate task so a child that fills its stdout
        // pipe before draining stdin cannot deadlock us.
        let writer = child.stdin.take().map(|mut stdin| {
            let bytes = input.as_bytes().to_vec();
            tokio::spawn(async move {
                stdin.write_all(&bytes).await?;
                stdin.shutdown().await
            })
        });

        let output = child.wait_with_output().await?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Err(err)) if err.kind() != std::io::ErrorKind::BrokenPipe => {
                    tracing::warn!(error = %err, "Failed to write source to Ruff");
                }
                Err(err) => tracing::warn!(error = %err, "stdin writer task failed"),
                _ => {}
            }
        }

        let result = RunResult {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code().unwrap_or(-1),
        };
        if !result.stderr.is_empty() {
            tracing::info!(stderr = %result.stderr_text(), "Ruff stderr");
        }
        Ok(result)
    }
}
