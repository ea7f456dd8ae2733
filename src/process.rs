//! A long-running process whose behavior can be observed at runtime.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{mpsc, Notify};

use crate::error::ProcessError;
use crate::spawn::{ExitFuture, ProcessCommand, ProcessTerminator, Spawner, TokioSpawner};
use crate::stream::decode::Utf8Decoder;
use crate::stream::merge::merge_channels;
use crate::stream::SearchableStream;

/// Final state of an observed process.
///
/// Finalized exactly once, by whichever of natural exit and [`kill`] gets
/// there first; every waiter receives the same `Arc`.
///
/// [`kill`]: ObservableProcess::kill
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// Reported exit code; -1 when the process was killed or signalled.
    pub exit_code: i32,
    /// True only when termination was forced through [`ObservableProcess::kill`].
    pub killed: bool,
    /// Full STDOUT text at finalization.
    pub std_text: String,
    /// Full STDERR text at finalization.
    pub err_text: String,
    /// Full combined output text at finalization.
    pub combined_text: String,
}

/// Broadcast-once slot for the final result: the first finalization wins and
/// late subscribers observe the cached value.
struct Finalizer {
    result: Mutex<Option<Arc<ProcessResult>>>,
    done: Notify,
}

impl Finalizer {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            done: Notify::new(),
        }
    }

    /// Install `candidate` unless a result is already present. Returns the
    /// authoritative result and whether `candidate` won.
    fn finalize(&self, candidate: ProcessResult) -> (Arc<ProcessResult>, bool) {
        let mut slot = self.result.lock().unwrap();
        let (result, won) = match &*slot {
            Some(existing) => (existing.clone(), false),
            None => {
                let result = Arc::new(candidate);
                *slot = Some(result.clone());
                (result, true)
            }
        };
        drop(slot);
        if won {
            self.done.notify_waiters();
        }
        (result, won)
    }

    fn current(&self) -> Option<Arc<ProcessResult>> {
        self.result.lock().unwrap().clone()
    }

    async fn wait(&self) -> Arc<ProcessResult> {
        loop {
            let done = self.done.notified();
            if let Some(result) = self.current() {
                return result;
            }
            done.await;
        }
    }
}

/// A long-running child process with searchable output streams.
///
/// Spawning happens at construction. Output accumulates in three
/// [`SearchableStream`]s (stdout, stderr, and their arrival-order merge)
/// that can be queried while the process is still running. Termination, be
/// it natural or forced, produces exactly one [`ProcessResult`].
pub struct ObservableProcess {
    pid: u32,
    stdin: Mutex<Option<Box<dyn AsyncWrite + Send + Unpin>>>,
    /// Searchable STDOUT of the underlying process.
    pub stdout: SearchableStream,
    /// Searchable STDERR of the underlying process.
    pub stderr: SearchableStream,
    /// Searchable combined STDOUT and STDERR, merged in arrival order.
    pub output: SearchableStream,
    terminator: Box<dyn ProcessTerminator>,
    finalizer: Arc<Finalizer>,
    kill_grace: Duration,
}

impl ObservableProcess {
    /// Spawn `command` with the production [`TokioSpawner`].
    pub async fn spawn(command: ProcessCommand) -> Result<Self, ProcessError> {
        Self::spawn_with(&TokioSpawner, command).await
    }

    /// Spawn `command` through an explicit [`Spawner`] implementation.
    pub async fn spawn_with(
        spawner: &dyn Spawner,
        command: ProcessCommand,
    ) -> Result<Self, ProcessError> {
        let spawned = spawner.spawn(&command).await?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let (out_merge_tx, out_merge_rx) = mpsc::unbounded_channel();
        let (err_merge_tx, err_merge_rx) = mpsc::unbounded_channel();

        pump(spawned.stdout, out_tx, out_merge_tx);
        pump(spawned.stderr, err_tx, err_merge_tx);

        let stdout = SearchableStream::from_channel(out_rx);
        let stderr = SearchableStream::from_channel(err_rx);
        let output = SearchableStream::from_channel(merge_channels(out_merge_rx, err_merge_rx));

        let finalizer = Arc::new(Finalizer::new());
        monitor(
            spawned.exit,
            spawned.pid,
            stdout.clone(),
            stderr.clone(),
            output.clone(),
            finalizer.clone(),
        );

        Ok(Self {
            pid: spawned.pid,
            stdin: Mutex::new(Some(spawned.stdin)),
            stdout,
            stderr,
            output,
            terminator: spawned.terminator,
            finalizer,
            kill_grace: command.kill_grace,
        })
    }

    /// OS process id of the underlying child; stable for its lifetime.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Hand the process's writable input channel to the caller.
    ///
    /// The sink is passed through unmodified and can be taken once. Writes
    /// after the process has terminated fail with the OS pipe's own error;
    /// nothing here intercepts them.
    pub fn take_stdin(&self) -> Option<Box<dyn AsyncWrite + Send + Unpin>> {
        self.stdin.lock().unwrap().take()
    }

    /// Wait for the process to end, returning the single finalized result.
    ///
    /// Repeatable: before, during, and after termination every caller
    /// receives the same `Arc`.
    pub async fn wait_for_end(&self) -> Arc<ProcessResult> {
        self.finalizer.wait().await
    }

    /// Force termination.
    ///
    /// Snapshots the streams into a `killed` result, requests OS-level
    /// termination, and waits the configured grace interval so in-flight
    /// output can settle. If a result was already finalized by natural exit
    /// or an earlier kill, this is a no-op returning the cached result; a
    /// natural-exit result is never overwritten.
    pub async fn kill(&self) -> Arc<ProcessResult> {
        let candidate = ProcessResult {
            exit_code: -1,
            killed: true,
            std_text: self.stdout.full_text(),
            err_text: self.stderr.full_text(),
            combined_text: self.output.full_text(),
        };
        let (result, won) = self.finalizer.finalize(candidate);
        if won {
            tracing::debug!("Requesting termination of process {}", self.pid);
            if let Err(error) = self.terminator.request_termination() {
                tracing::warn!(
                    "Failed to deliver termination request to process {}: {}",
                    self.pid,
                    error
                );
            }
            tokio::time::sleep(self.kill_grace).await;
        }
        result
    }
}

/// Read one pipe to EOF, fanning each decoded chunk into the pipe's own
/// stream channel and the merge input. Dropping the senders at EOF is what
/// lets the downstream streams close.
fn pump(
    mut reader: Box<dyn AsyncRead + Send + Unpin>,
    own: mpsc::UnboundedSender<String>,
    merged: mpsc::UnboundedSender<String>,
) {
    tokio::spawn(async move {
        let mut decoder = Utf8Decoder::new();
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = decoder.decode(&buf[..n]);
                    if chunk.is_empty() {
                        continue;
                    }
                    let _ = own.send(chunk.clone());
                    let _ = merged.send(chunk);
                }
                Err(error) => {
                    tracing::warn!("Error reading subprocess output: {}", error);
                    break;
                }
            }
        }
        let tail = decoder.finish();
        if !tail.is_empty() {
            let _ = own.send(tail.clone());
            let _ = merged.send(tail);
        }
    });
}

/// Await natural termination, let trailing output land in all three streams,
/// then attempt to finalize. Losing the race to a kill is silent.
fn monitor(
    exit: ExitFuture,
    pid: u32,
    stdout: SearchableStream,
    stderr: SearchableStream,
    output: SearchableStream,
    finalizer: Arc<Finalizer>,
) {
    tokio::spawn(async move {
        let exit_code = exit.await;
        stdout.wait_closed().await;
        stderr.wait_closed().await;
        output.wait_closed().await;

        let (result, _) = finalizer.finalize(ProcessResult {
            exit_code,
            killed: false,
            std_text: stdout.full_text(),
            err_text: stderr.full_text(),
            combined_text: output.full_text(),
        });
        tracing::debug!(
            "Process {} ended with exit code {} (killed: {})",
            pid,
            result.exit_code,
            result.killed
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(exit_code: i32, killed: bool) -> ProcessResult {
        ProcessResult {
            exit_code,
            killed,
            std_text: String::new(),
            err_text: String::new(),
            combined_text: String::new(),
        }
    }

    #[tokio::test]
    async fn test_finalizer_first_finalization_wins() {
        let finalizer = Finalizer::new();

        let (first, won_first) = finalizer.finalize(sample_result(-1, true));
        let (second, won_second) = finalizer.finalize(sample_result(0, false));

        assert!(won_first);
        assert!(!won_second);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.killed);
    }

    #[tokio::test]
    async fn test_finalizer_wakes_waiters_registered_before_finalization() {
        let finalizer = Arc::new(Finalizer::new());
        let waiter = {
            let finalizer = finalizer.clone();
            tokio::spawn(async move { finalizer.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        let (installed, _) = finalizer.finalize(sample_result(3, false));

        let observed = waiter.await.unwrap();
        assert!(Arc::ptr_eq(&installed, &observed));
    }

    #[tokio::test]
    async fn test_finalizer_late_waiter_sees_cached_result() {
        let finalizer = Finalizer::new();
        let (installed, _) = finalizer.finalize(sample_result(0, false));

        let observed = finalizer.wait().await;
        assert!(Arc::ptr_eq(&installed, &observed));
    }
}
