//! Integration Tests for Quiet-Period Accumulation
//!
//! These tests run the accumulator against scripted byte sources and pin
//! down both quiet policies plus the terminal statuses.

use std::time::Duration;

use shellmux::{AccumulatorConfig, AccumulatorStatus, QuietPolicy, ResponseAccumulator};
use tokio_test::io::Builder;

#[path = "../test_utils/mock_transport.rs"]
mod mock_transport;
use mock_transport::FakeShell;

fn config(policy: QuietPolicy, quiet: Duration) -> AccumulatorConfig {
    AccumulatorConfig {
        quiet_period: quiet,
        policy,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_spaced_chunks_aggregate_until_idle() {
    let (mut shell, peer) = FakeShell::new();
    let accumulator = ResponseAccumulator::new(config(
        QuietPolicy::StopAfterIdle { periods: 1 },
        Duration::from_secs(2),
    ));
    let mut handle = accumulator.start(peer).unwrap();

    // Chunks arrive a second apart, well inside the quiet window.
    shell.feed(b"a").await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    shell.feed(b"b").await;

    assert_eq!(handle.wait_done().await, AccumulatorStatus::Idle);
    assert_eq!(handle.snapshot().await, "ab");
    shell.close();
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_visible_while_running() {
    let (mut shell, peer) = FakeShell::new();
    let accumulator = ResponseAccumulator::new(config(
        QuietPolicy::StopAfterIdle { periods: 1 },
        Duration::from_secs(2),
    ));
    let mut handle = accumulator.start(peer).unwrap();

    shell.feed(b"hello").await;
    tokio::time::sleep(Duration::from_millis(1)).await;

    // The buffer is observable before aggregation ends.
    assert_eq!(handle.status(), AccumulatorStatus::Running);
    assert!(!handle.is_done());
    assert_eq!(handle.snapshot().await, "hello");

    shell.close();
    assert_eq!(handle.wait_done().await, AccumulatorStatus::Closed);
    assert!(handle.is_done());
    assert_eq!(handle.snapshot().await, "hello");
}

#[tokio::test(start_paused = true)]
async fn test_run_until_close_ignores_silence() {
    let (mut shell, peer) = FakeShell::new();
    let accumulator = ResponseAccumulator::new(config(
        QuietPolicy::RunUntilClose,
        Duration::from_secs(2),
    ));
    let mut handle = accumulator.start(peer).unwrap();

    // A silence far longer than the quiet period does not end the session.
    shell.feed(b"slow ").await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(handle.status(), AccumulatorStatus::Running);

    shell.feed(b"burst").await;
    shell.close();

    assert_eq!(handle.wait_done().await, AccumulatorStatus::Closed);
    assert_eq!(handle.snapshot().await, "slow burst");
}

#[tokio::test(start_paused = true)]
async fn test_idle_threshold_counts_consecutive_quiet_periods() {
    let (mut shell, peer) = FakeShell::new();
    let accumulator = ResponseAccumulator::new(config(
        QuietPolicy::StopAfterIdle { periods: 3 },
        Duration::from_secs(2),
    ));
    let mut handle = accumulator.start(peer).unwrap();

    let started = tokio::time::Instant::now();
    shell.feed(b"x").await;

    assert_eq!(handle.wait_done().await, AccumulatorStatus::Idle);
    assert_eq!(handle.snapshot().await, "x");

    // Three full quiet periods of virtual time pass before the stop.
    assert_eq!(started.elapsed(), Duration::from_secs(6));
    shell.close();
}

#[tokio::test]
async fn test_read_failure_reports_failed_status() {
    let source = Builder::new()
        .read(b"partial output")
        .read_error(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        ))
        .build();

    let accumulator = ResponseAccumulator::new(config(
        QuietPolicy::StopAfterIdle { periods: 1 },
        Duration::from_secs(2),
    ));
    let mut handle = accumulator.start(source).unwrap();

    match handle.wait_done().await {
        AccumulatorStatus::Failed { message } => {
            assert!(message.contains("connection reset"), "got: {}", message);
        }
        other => panic!("expected failed status, got {:?}", other),
    }

    // Output delivered before the failure is retained.
    assert_eq!(handle.snapshot().await, "partial output");
}
