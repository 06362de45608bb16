//! Seam between the executor and the operating system's process API.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ExecError, ExecResult};

/// Program plus arguments for one subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments passed verbatim (no shell on the host side).
    pub args: Vec<OsString>,
}

impl Invocation {
    /// Invocation of `program` with no arguments yet.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Arguments rendered lossily, for logs and test assertions.
    #[must_use]
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output carrying `stdout`.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with `exit_code` and `stderr`.
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the process exited with status zero.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }

    /// Turn a non-zero exit into [`ExecError::CommandFailed`].
    ///
    /// Some device shells report errors on stdout; that text is used when
    /// stderr is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::CommandFailed`] unless the exit code is zero.
    pub fn into_checked(self) -> ExecResult<Self> {
        if self.succeeded() {
            return Ok(self);
        }
        let stderr = if self.stderr.trim().is_empty() {
            self.stdout
        } else {
            self.stderr
        };
        Err(ExecError::CommandFailed {
            exit_code: self.exit_code,
            stderr,
        })
    }
}

/// Runs one subprocess to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `invocation`, killing the process if `cancel` fires.
    ///
    /// Returns [`ExecError::Interrupted`] after a cancellation has stopped the
    /// process. No timeout is applied.
    async fn run(
        &self,
        invocation: Invocation,
        cancel: CancellationToken,
    ) -> ExecResult<CommandOutput>;
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: Invocation,
        cancel: CancellationToken,
    ) -> ExecResult<CommandOutput> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let stdout = tokio::spawn(read_all(child.stdout.take()));
        let stderr = tokio::spawn(read_all(child.stderr.take()));

        let status = tokio::select! {
            status = child.wait() => status.map_err(|err| ExecError::io("process.wait", err))?,
            () = cancel.cancelled() => {
                debug!(program = %invocation.program.display(), "terminating canceled process");
                if let Err(err) = child.start_kill() {
                    debug!(error = %err, "process already exited");
                }
                let _ = child.wait().await;
                stdout.abort();
                stderr.abort();
                return Err(ExecError::Interrupted);
            }
        };

        let stdout = join_output(stdout).await?;
        let stderr = join_output(stderr).await?;
        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

async fn read_all<R>(stream: Option<R>) -> std::io::Result<String>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buffer = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buffer).await?;
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

async fn join_output(
    handle: tokio::task::JoinHandle<std::io::Result<String>>,
) -> ExecResult<String> {
    handle
        .await
        .map_err(|err| ExecError::io("process.output", std::io::Error::other(err)))?
        .map_err(|err| ExecError::io("process.output", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn captures_exit_code_and_streams() -> Result<(), Box<dyn std::error::Error>> {
        let output = ProcessRunner
            .run(
                Invocation::new("sh").args(["-c", "printf out; printf err >&2; exit 3"]),
                CancellationToken::new(),
            )
            .await?;
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
        assert!(matches!(
            output.into_checked(),
            Err(ExecError::CommandFailed {
                exit_code: Some(3),
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn cancel_kills_the_process() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let result = ProcessRunner
            .run(Invocation::new("sleep").arg("30"), cancel)
            .await;
        assert!(matches!(result, Err(ExecError::Interrupted)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let result = ProcessRunner
            .run(
                Invocation::new("/nonexistent/adbx-tool"),
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(ExecError::Spawn { .. })));
    }

    #[test]
    fn stdout_stands_in_for_empty_stderr() {
        let output = CommandOutput {
            exit_code: Some(1),
            stdout: "mkdir: '/x': Read-only file system".into(),
            stderr: "  ".into(),
        };
        match output.into_checked() {
            Err(ExecError::CommandFailed { stderr, .. }) => {
                assert_eq!(stderr, "mkdir: '/x': Read-only file system");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
