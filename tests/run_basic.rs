// tests/run_basic.rs
#![cfg(unix)]

use std::error::Error;
use std::time::Duration;

use jobrunner::exec::RunOptions;
use jobrunner::{FailureKind, Interactive, run};
use jobrunner_test_utils::builders::path_only_env;
use jobrunner_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn echo_hello_captures_stdout() -> TestResult {
    init_tracing();

    let job = run(["echo", "hello"], RunOptions::new()).await?;

    assert_eq!(job.stdout(), "hello\n");
    assert_eq!(job.stderr(), "");
    assert_eq!(job.returncode(), Some(0));
    assert_eq!(job.signal(), None);
    assert!(job.terminated());
    assert!(job.closed());
    assert!(job.pid().is_some());
    assert!(job.failures().is_empty());
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_is_not_a_failure() -> TestResult {
    init_tracing();

    let job = run(["false"], RunOptions::new()).await?;

    assert_eq!(job.returncode(), Some(1));
    assert!(job.failures().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_binary_is_a_launch_failure() -> TestResult {
    init_tracing();

    let err = run(["nonexistent-binary-xyz"], RunOptions::new())
        .await
        .expect_err("launch should fail");

    assert_eq!(err.kind(), FailureKind::Launch);
    assert_eq!(err.output.pid, None);
    assert!(err.output.terminated);
    assert!(err.output.closed);
    assert!(
        err.output
            .stderr
            .starts_with("EXCEPTION: nonexistent-binary-xyz -->"),
        "unexpected stderr: {}",
        err.output.stderr
    );
    Ok(())
}

#[tokio::test]
async fn shell_string_is_split_into_tokens() -> TestResult {
    init_tracing();

    let job = run("printf '%s|%s' 'a b' c", RunOptions::new()).await?;

    assert_eq!(job.stdout(), "a b|c");
    Ok(())
}

#[tokio::test]
async fn empty_command_is_rejected() -> TestResult {
    init_tracing();

    let err = run("", RunOptions::new()).await.expect_err("empty command");
    assert_eq!(err.kind(), FailureKind::Config);
    Ok(())
}

#[tokio::test]
async fn stderr_is_captured_separately() -> TestResult {
    init_tracing();

    let job = run(["sh", "-c", "echo out; echo err >&2; exit 3"], RunOptions::new()).await?;

    assert_eq!(job.stdout(), "out\n");
    assert_eq!(job.stderr(), "err\n");
    assert_eq!(job.returncode(), Some(3));
    Ok(())
}

#[tokio::test]
async fn stdout_order_is_kept_regardless_of_stderr() -> TestResult {
    init_tracing();

    let job = run(
        [
            "sh",
            "-c",
            "printf A; sleep 0.1; printf B >&2; sleep 0.1; printf C",
        ],
        RunOptions::new(),
    )
    .await?;

    assert_eq!(job.stdout(), "AC");
    assert_eq!(job.stderr(), "B");
    Ok(())
}

#[tokio::test]
async fn runs_in_requested_directory() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let job = run(["pwd"], RunOptions::new().with_cwd(dir.path())).await?;

    let reported = std::fs::canonicalize(job.stdout().trim())?;
    assert_eq!(reported, std::fs::canonicalize(dir.path())?);
    Ok(())
}

#[tokio::test]
async fn extra_env_reaches_the_child() -> TestResult {
    init_tracing();

    let options = RunOptions::new()
        .with_env(path_only_env())
        .with_extra_env("JOBRUNNER_TEST_VAR", "from-test");
    let job = run(
        ["sh", "-c", "echo \"$JOBRUNNER_TEST_VAR\"; echo \"${HOME:-unset}\""],
        options,
    )
    .await?;

    assert_eq!(job.stdout(), "from-test\nunset\n");
    Ok(())
}

#[tokio::test]
async fn echo_mode_still_accumulates_output() -> TestResult {
    init_tracing();

    let job = run(
        ["echo", "visible"],
        RunOptions::new().with_interactive(Interactive::Echo),
    )
    .await?;

    assert_eq!(job.stdout(), "visible\n");
    Ok(())
}

#[tokio::test]
async fn large_output_is_collected_in_full() -> TestResult {
    init_tracing();

    let job = run(
        ["sh", "-c", "i=0; while [ $i -lt 2000 ]; do echo line-$i; i=$((i+1)); done"],
        RunOptions::new().with_timeout(Duration::from_secs(20)),
    )
    .await?;

    let lines: Vec<&str> = job.stdout().lines().collect();
    assert_eq!(lines.len(), 2000);
    assert_eq!(lines[0], "line-0");
    assert_eq!(lines[1999], "line-1999");
    Ok(())
}
