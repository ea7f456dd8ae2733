//! # Observable Process
//!
//! Spawn a long-running child process and observe its behavior at runtime:
//! searchable output streams, pattern waiters that wake up as text arrives,
//! and a single finalized result delivered to any number of end-of-process
//! waiters.
//!
//! ```no_run
//! use observable_process::{ObservableProcess, ProcessCommandBuilder};
//!
//! # async fn run() -> Result<(), observable_process::ProcessError> {
//! let command = ProcessCommandBuilder::new("server").arg("--port=4000").build();
//! let process = ObservableProcess::spawn(command).await?;
//! process.stdout.wait_for("listening on port 4000").await;
//! let result = process.kill().await;
//! assert!(result.killed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `builder` - Fluent construction of process commands
//! - `error` - Crate error type
//! - `mock` - Scripted in-memory spawner for tests
//! - `process` - Process-lifecycle coordinator and its final result
//! - `spawn` - The spawn capability and its production tokio implementation
//! - `stream` - Searchable stream plumbing for subprocess output

pub mod builder;
pub mod error;
pub mod mock;
pub mod process;
pub mod spawn;
pub mod stream;

pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use process::{ObservableProcess, ProcessResult};
pub use spawn::{ProcessCommand, SpawnedProcess, Spawner, TokioSpawner};
pub use stream::SearchableStream;
