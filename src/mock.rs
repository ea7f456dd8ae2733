//! Scripted in-memory spawner for exercising the observation pipeline in
//! tests without real OS processes.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, AsyncWriteExt};
use tokio::sync::Notify;

use crate::error::ProcessError;
use crate::spawn::{ExitFuture, ProcessCommand, ProcessTerminator, SpawnedProcess, Spawner};

const MOCK_PID: u32 = 4242;

/// One step of a [`MockSpawner`] script.
#[derive(Debug, Clone)]
enum MockEvent {
    Stdout(String),
    Stderr(String),
    Pause(Duration),
}

/// Spawner that replays a fixed script instead of starting a real process.
///
/// ```
/// use observable_process::mock::MockSpawner;
/// use std::time::Duration;
///
/// let spawner = MockSpawner::new()
///     .stdout("booting\n")
///     .pause(Duration::from_millis(10))
///     .stderr("warning: low disk\n")
///     .exits_with(0);
/// ```
#[derive(Default)]
pub struct MockSpawner {
    events: Vec<MockEvent>,
    exit_code: i32,
    hold_until_killed: bool,
}

impl MockSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit text on the mock process's stdout.
    pub fn stdout(mut self, text: &str) -> Self {
        self.events.push(MockEvent::Stdout(text.to_string()));
        self
    }

    /// Emit text on the mock process's stderr.
    pub fn stderr(mut self, text: &str) -> Self {
        self.events.push(MockEvent::Stderr(text.to_string()));
        self
    }

    /// Idle before the next event.
    pub fn pause(mut self, duration: Duration) -> Self {
        self.events.push(MockEvent::Pause(duration));
        self
    }

    pub fn exits_with(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Keep the mock process alive after the script has been replayed, until
    /// a termination request arrives.
    pub fn holds_until_killed(mut self) -> Self {
        self.hold_until_killed = true;
        self
    }
}

struct MockTerminator {
    killed: Arc<Notify>,
}

impl ProcessTerminator for MockTerminator {
    fn request_termination(&self) -> Result<(), ProcessError> {
        self.killed.notify_one();
        Ok(())
    }
}

#[async_trait]
impl Spawner for MockSpawner {
    async fn spawn(&self, _command: &ProcessCommand) -> Result<SpawnedProcess, ProcessError> {
        let (stdin_host, stdin_child) = duplex(4096);
        let (mut stdout_writer, stdout_reader) = duplex(4096);
        let (mut stderr_writer, stderr_reader) = duplex(4096);

        let killed = Arc::new(Notify::new());
        let events = self.events.clone();
        let exit_code = self.exit_code;
        let hold = self.hold_until_killed;
        let killed_in_child = killed.clone();

        // The async block stands in for the child process: when it returns,
        // its writer halves drop and the host-side readers see EOF, exactly
        // like pipes closing on process death.
        let exit = Box::pin(async move {
            let _stdin = stdin_child;
            for event in events {
                match event {
                    MockEvent::Stdout(text) => {
                        let _ = stdout_writer.write_all(text.as_bytes()).await;
                    }
                    MockEvent::Stderr(text) => {
                        let _ = stderr_writer.write_all(text.as_bytes()).await;
                    }
                    MockEvent::Pause(duration) => tokio::time::sleep(duration).await,
                }
            }
            if hold {
                killed_in_child.notified().await;
                return -1;
            }
            exit_code
        }) as ExitFuture;

        Ok(SpawnedProcess {
            pid: MOCK_PID,
            stdin: Box::new(stdin_host),
            stdout: Box::new(stdout_reader),
            stderr: Box::new(stderr_reader),
            exit,
            terminator: Box::new(MockTerminator { killed }),
        })
    }
}
