// tests/input_and_streaming.rs
#![cfg(unix)]

use std::error::Error;
use std::time::Duration;

use jobrunner::exec::{CommunicateOptions, Job, RunOptions, SpawnOptions};
use jobrunner::types::ReadChunk;
use jobrunner::{FailureKind, run};
use jobrunner_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn input_is_fed_to_stdin() -> TestResult {
    init_tracing();

    let job = run(
        ["cat"],
        RunOptions::new()
            .with_input("line one\nline two\nno newline")
            .with_input_delay(Duration::from_millis(50)),
    )
    .await?;

    assert_eq!(job.stdout(), "line one\nline two\nno newline");
    Ok(())
}

#[tokio::test]
async fn written_bytes_come_back_unchanged() -> TestResult {
    init_tracing();

    let payload: Vec<u8> = (0u8..=255).cycle().take(4096).filter(|b| *b != b'\r').collect();
    let mut job = Job::spawn(["cat"], &SpawnOptions::default())?;

    job.write(payload.clone(), true).await?;
    job.close_stdin();
    job.communicate(&CommunicateOptions::default()).await?;

    // Non-UTF-8 bytes are rendered lossily, so compare through the same lens.
    let expected = String::from_utf8_lossy(&payload).into_owned();
    assert_eq!(job.stdout(), expected);
    Ok(())
}

#[tokio::test]
async fn write_after_exit_fails() -> TestResult {
    init_tracing();

    let mut job = Job::spawn(["true"], &SpawnOptions::default())?;
    job.close(true).await?;

    let err = job.write("too late", false).await.expect_err("job is gone");
    assert_eq!(err.kind(), FailureKind::Execution);
    Ok(())
}

#[tokio::test]
async fn read_streams_stdout_directly() -> TestResult {
    init_tracing();

    let mut job = Job::spawn(
        ["sh", "-c", "printf hello; echo oops >&2"],
        &SpawnOptions::default(),
    )?;

    let mut collected = Vec::new();
    with_timeout(Duration::from_secs(5), async {
        loop {
            match job.read(2, true).await {
                ReadChunk::Data(data) => {
                    assert!(data.len() <= 2);
                    collected.extend(data);
                }
                ReadChunk::Pending => unreachable!("blocking read never returns Pending"),
                ReadChunk::Closed => break,
            }
        }
    })
    .await;
    assert_eq!(collected, b"hello");

    job.close(false).await?;
    // Consumed by the reader above, so not accumulated again.
    assert_eq!(job.stdout(), "");
    assert_eq!(job.stderr(), "oops\n");
    Ok(())
}

#[tokio::test]
async fn non_blocking_read_reports_pending() -> TestResult {
    init_tracing();

    let mut job = Job::spawn(["sleep", "5"], &SpawnOptions::default())?;

    assert_eq!(job.read(1024, false).await, ReadChunk::Pending);

    job.close(true).await?;
    Ok(())
}

#[tokio::test]
async fn pipe_passwords_precede_input() -> TestResult {
    init_tracing();

    let job = run(
        ["sh", "-c", "read -r pw; read -r line; echo \"$pw/$line\""],
        RunOptions::new()
            .with_password("s3cret")
            .with_input("payload\n")
            .with_input_delay(Duration::from_millis(50)),
    )
    .await?;

    assert_eq!(job.stdout(), "s3cret/payload\n");
    Ok(())
}
