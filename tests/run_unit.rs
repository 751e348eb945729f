use std::error::Error;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use trigrun::engine::CaptureSink;
use trigrun::units::{RunUnit, UnitRefs};

type TestResult = Result<(), Box<dyn Error>>;

fn unit(script: &str, timeout: Option<Duration>) -> RunUnit {
    RunUnit::new("task", script, None, timeout, None, false, UnitRefs::default())
}

#[tokio::test]
async fn successful_script_captures_stdout() -> TestResult {
    let sink = CaptureSink::new();
    unit("echo hello", None)
        .run(&CancellationToken::new(), &sink)
        .await?;

    assert_eq!(sink.captured(), "hello\n");
    Ok(())
}

#[tokio::test]
async fn stderr_is_captured_alongside_stdout() -> TestResult {
    let sink = CaptureSink::new();
    unit("echo out; echo err 1>&2", None)
        .run(&CancellationToken::new(), &sink)
        .await?;

    let captured = sink.captured();
    assert!(captured.contains("out"));
    assert!(captured.contains("err"));
    Ok(())
}

#[tokio::test]
async fn nonzero_exit_maps_to_exit_code_error() {
    let sink = CaptureSink::new();
    let err = unit("exit 7", None)
        .run(&CancellationToken::new(), &sink)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "script exited with code 7");
}

#[tokio::test]
async fn timeout_kills_the_script_with_a_precise_message() {
    let sink = CaptureSink::new();
    let started = std::time::Instant::now();

    let err = unit("sleep 5", Some(Duration::from_secs(1)))
        .run(&CancellationToken::new(), &sink)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "task timed out after 1s");
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn cancellation_kills_the_script() {
    let sink = CaptureSink::new();
    let cancel = CancellationToken::new();
    let started = std::time::Instant::now();

    let canceller = cancel.clone();
    let run_unit = unit("sleep 5", None);
    let (result, _) = tokio::join!(run_unit.run(&cancel, &sink), async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let err = result.unwrap_err();
    assert!(err.to_string().contains("cancelled"));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn working_directory_is_applied() -> TestResult {
    let dir = tempfile::tempdir()?;
    let canonical = dir.path().canonicalize()?;

    let sink = CaptureSink::new();
    RunUnit::new(
        "task",
        "pwd",
        Some(canonical.clone()),
        None,
        None,
        false,
        UnitRefs::default(),
    )
    .run(&CancellationToken::new(), &sink)
    .await?;

    assert!(sink.captured().contains(&canonical.display().to_string()));
    Ok(())
}

#[tokio::test]
async fn configured_shell_is_used() -> TestResult {
    let sink = CaptureSink::new();
    RunUnit::new(
        "task",
        "echo $0",
        None,
        None,
        Some("bash".to_string()),
        false,
        UnitRefs::default(),
    )
    .run(&CancellationToken::new(), &sink)
    .await?;

    assert!(sink.captured().contains("bash"));
    Ok(())
}

#[tokio::test]
async fn term_is_exported_to_the_script() -> TestResult {
    let sink = CaptureSink::new();
    unit("echo TERM=$TERM", None)
        .run(&CancellationToken::new(), &sink)
        .await?;

    assert!(sink.captured().contains("TERM=xterm-256color"));
    Ok(())
}
