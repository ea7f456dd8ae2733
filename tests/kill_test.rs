//! Forced termination and finalization-race tests.

use anyhow::Result;
use observable_process::{ObservableProcess, ProcessCommand, ProcessCommandBuilder};
use std::sync::Arc;
use std::time::Duration;

fn sh(script: &str) -> ProcessCommand {
    ProcessCommandBuilder::new("sh").arg("-c").arg(script).build()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test]
async fn test_kill_snapshots_partial_output() -> Result<()> {
    init_tracing();
    let process = ObservableProcess::spawn(sh("printf partial; sleep 5")).await?;

    // make sure the output has landed before killing
    process.stdout.wait_for("partial").await;

    let result = process.kill().await;
    assert!(result.killed);
    assert_eq!(result.exit_code, -1);
    assert_eq!(result.std_text, "partial");
    assert_eq!(result.err_text, "");
    assert_eq!(result.combined_text, "partial");

    let later = process.wait_for_end().await;
    assert!(Arc::ptr_eq(&result, &later));
    Ok(())
}

#[tokio::test]
async fn test_kill_after_natural_exit_returns_natural_result() -> Result<()> {
    init_tracing();
    let process = ObservableProcess::spawn(sh("exit 3")).await?;

    let natural = process.wait_for_end().await;
    let killed = process.kill().await;

    assert!(Arc::ptr_eq(&natural, &killed));
    assert!(!killed.killed);
    assert_eq!(killed.exit_code, 3);
    Ok(())
}

#[tokio::test]
async fn test_second_kill_is_a_noop() -> Result<()> {
    init_tracing();
    let process = ObservableProcess::spawn(sh("sleep 5")).await?;

    let first = process.kill().await;
    let second = process.kill().await;

    assert!(Arc::ptr_eq(&first, &second));
    assert!(first.killed);
    Ok(())
}

#[tokio::test]
async fn test_kill_resolves_pending_end_waiters() -> Result<()> {
    let process = Arc::new(ObservableProcess::spawn(sh("sleep 5")).await?);

    let waiter = {
        let process = process.clone();
        tokio::spawn(async move { process.wait_for_end().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let killed = process.kill().await;
    let observed = waiter.await?;

    assert!(Arc::ptr_eq(&killed, &observed));
    assert!(observed.killed);
    Ok(())
}

#[tokio::test]
async fn test_kill_grace_is_configurable() -> Result<()> {
    let command = ProcessCommandBuilder::new("sh")
        .arg("-c")
        .arg("sleep 5")
        .kill_grace(Duration::from_millis(10))
        .build();
    let process = ObservableProcess::spawn(command).await?;

    let result = process.kill().await;
    assert!(result.killed);
    Ok(())
}

#[tokio::test]
async fn test_kill_resolves_pending_pattern_searches() -> Result<()> {
    let process = Arc::new(ObservableProcess::spawn(sh("exec sleep 5")).await?);

    let search = {
        let process = process.clone();
        tokio::spawn(async move { process.stdout.wait_for("never-printed").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    process.kill().await;

    // the killed process's pipes close, which closes the stream and resolves
    // the search as not-found
    assert_eq!(search.await?, None);
    Ok(())
}
