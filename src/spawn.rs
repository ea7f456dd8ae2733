//! The spawn capability: turning a [`ProcessCommand`] into a running child
//! process with observable channels.
//!
//! [`Spawner`] is the seam between the lifecycle coordinator and the OS.
//! [`TokioSpawner`] is the production implementation; the `mock` module
//! provides a scripted one for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;

use crate::error::ProcessError;

/// Default grace interval applied after a winning kill, letting in-flight
/// output chunks land before the caller resumes.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Applied on top of the inherited environment.
    pub env: HashMap<String, String>,
    /// Inherits the parent's working directory when `None`.
    pub working_dir: Option<PathBuf>,
    pub kill_grace: Duration,
}

/// One-shot termination notification carrying the exit code (-1 when the
/// process was terminated by a signal).
pub type ExitFuture = Pin<Box<dyn Future<Output = i32> + Send>>;

/// Synchronous OS-level termination request against a running process.
pub trait ProcessTerminator: Send + Sync {
    fn request_termination(&self) -> Result<(), ProcessError>;
}

/// Handle returned by a [`Spawner`] for a successfully started process.
///
/// All three stdio channels are guaranteed present; a spawner must fail the
/// spawn rather than return a handle with a missing channel.
pub struct SpawnedProcess {
    pub pid: u32,
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    pub stderr: Box<dyn AsyncRead + Send + Unpin>,
    pub exit: ExitFuture,
    pub terminator: Box<dyn ProcessTerminator>,
}

#[async_trait]
pub trait Spawner: Send + Sync {
    async fn spawn(&self, command: &ProcessCommand) -> Result<SpawnedProcess, ProcessError>;
}

/// Production spawner backed by `tokio::process`.
pub struct TokioSpawner;

impl TokioSpawner {
    fn configure_command(command: &ProcessCommand) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);

        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    fn map_spawn_error(error: std::io::Error, command: &ProcessCommand) -> ProcessError {
        if error.kind() == std::io::ErrorKind::NotFound {
            ProcessError::CommandNotFound(command.program.clone())
        } else {
            ProcessError::SpawnFailed {
                command: format!("{} {}", command.program, command.args.join(" ")),
                source: error,
            }
        }
    }

    fn extract_channel<T>(channel: Option<T>, name: &'static str) -> Result<T, ProcessError> {
        channel.ok_or(ProcessError::ChannelUnavailable { channel: name })
    }
}

#[async_trait]
impl Spawner for TokioSpawner {
    async fn spawn(&self, command: &ProcessCommand) -> Result<SpawnedProcess, ProcessError> {
        tracing::debug!(
            "Spawning subprocess: {} {}",
            command.program,
            command.args.join(" ")
        );

        let mut child = Self::configure_command(command)
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, command))?;

        let stdin = Self::extract_channel(child.stdin.take(), "stdin")?;
        let stdout = Self::extract_channel(child.stdout.take(), "stdout")?;
        let stderr = Self::extract_channel(child.stderr.take(), "stderr")?;
        let pid = Self::extract_channel(child.id(), "pid")?;

        let program = command.program.clone();
        let exit = Box::pin(async move {
            match child.wait().await {
                Ok(status) => status.code().unwrap_or(-1),
                Err(error) => {
                    tracing::warn!("Failed to wait on subprocess '{}': {}", program, error);
                    -1
                }
            }
        }) as ExitFuture;

        Ok(SpawnedProcess {
            pid,
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            exit,
            terminator: Box::new(PidTerminator { pid }),
        })
    }
}

/// Delivers termination requests by pid, so the child handle itself can stay
/// with the task awaiting its exit.
struct PidTerminator {
    pid: u32,
}

#[cfg(unix)]
impl ProcessTerminator for PidTerminator {
    fn request_termination(&self) -> Result<(), ProcessError> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(self.pid as i32), Signal::SIGKILL)
            .map_err(|errno| ProcessError::Io(std::io::Error::from_raw_os_error(errno as i32)))
    }
}

#[cfg(not(unix))]
impl ProcessTerminator for PidTerminator {
    fn request_termination(&self) -> Result<(), ProcessError> {
        Err(ProcessError::TerminationUnsupported)
    }
}
