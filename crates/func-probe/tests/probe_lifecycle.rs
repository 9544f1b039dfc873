//! Probe lifecycle tests against real shell processes.
//!
//! Each test launches `sh -c <script>` so startup, readiness, early exit and
//! shutdown behaviour are exercised through actual process plumbing.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use func_probe::{with_probe, ProbeConfig, ProbeError, ProbeState, ProcessProbe};
use std::time::{Duration, Instant};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "func=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn shell(script: &str) -> ProbeConfig {
    ProbeConfig::for_command("sh", ["-c", script])
        .with_ready_timeout(Duration::from_secs(10))
        .with_stop_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_start_resolves_endpoint_and_stop_terminates() {
    init_logging();
    let config = shell(
        r#"echo "Azure Functions Core Tools"; echo "Now listening on: http://0.0.0.0:7071"; exec sleep 30"#,
    );

    let probe = ProcessProbe::new(config);
    let states = probe.subscribe();
    assert_eq!(probe.state(), ProbeState::NotStarted);

    let running = probe.start().await.expect("host should become ready");
    assert_eq!(running.endpoint().as_str(), "http://127.0.0.1:7071");
    assert_eq!(running.state(), ProbeState::Ready);
    assert!(running.pid().is_some());

    let outcome = running.stop().await.expect("stop should succeed");
    assert!(!outcome.forced, "sleep honours SIGTERM");
    assert!(!outcome.status.success());
    assert_eq!(*states.borrow(), ProbeState::Stopped);
}

#[tokio::test]
async fn test_repeated_markers_keep_first_endpoint() {
    init_logging();
    let config = shell(
        r#"echo "Now listening on: http://127.0.0.1:7071"; echo "Now listening on: http://127.0.0.1:9999"; exec sleep 30"#,
    );

    let running = ProcessProbe::new(config).start().await.unwrap();

    // Give the second marker time to be read.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(running.endpoint().as_str(), "http://127.0.0.1:7071");

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_marker_split_across_writes() {
    init_logging();
    let config = shell(
        r#"printf "Now listening"; sleep 0.2; printf " on: http://127.0.0.1:7071\n"; exec sleep 30"#,
    );

    let running = ProcessProbe::new(config).start().await.unwrap();
    assert_eq!(running.endpoint().as_str(), "http://127.0.0.1:7071");

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_early_exit_is_reported() {
    init_logging();
    let probe = ProcessProbe::new(shell("echo 'Host lock lease acquired'; exit 3"));
    let states = probe.subscribe();

    let err = probe.start().await.expect_err("host exits before readiness");

    match err {
        ProbeError::EarlyExit { status } => {
            assert!(status.contains('3'), "unexpected status: {}", status)
        }
        other => panic!("expected EarlyExit, got {:?}", other),
    }
    assert_eq!(*states.borrow(), ProbeState::Failed);
}

#[tokio::test]
async fn test_setup_times_out_without_marker() {
    init_logging();
    let config = shell("echo 'still starting'; exec sleep 30")
        .with_ready_timeout(Duration::from_secs(1));
    let probe = ProcessProbe::new(config);
    let states = probe.subscribe();

    let started = Instant::now();
    let err = probe.start().await.expect_err("no readiness marker");

    assert!(
        matches!(err, ProbeError::SetupTimeout { timeout } if timeout == Duration::from_secs(1)),
        "expected SetupTimeout, got {:?}",
        err
    );
    assert!(err.to_string().contains("no readiness signal within 1s"));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(*states.borrow(), ProbeState::Failed);
}

#[tokio::test]
async fn test_missing_executable_fails_to_spawn() {
    init_logging();
    let probe = ProcessProbe::new(ProbeConfig::for_command(
        "/nonexistent/func-host-binary",
        ["start"],
    ));
    let states = probe.subscribe();

    let err = probe.start().await.expect_err("binary does not exist");

    assert!(matches!(err, ProbeError::Spawn { ref program, .. } if program == "/nonexistent/func-host-binary"));
    assert_eq!(*states.borrow(), ProbeState::Failed);
}

#[tokio::test]
async fn test_stop_escalates_when_sigterm_ignored() {
    init_logging();
    let config = shell(r#"trap "" TERM; echo "Now listening on: http://127.0.0.1:7071"; exec sleep 30"#)
        .with_stop_timeout(Duration::from_secs(1));

    let running = ProcessProbe::new(config).start().await.unwrap();
    let states = running.subscribe();

    let outcome = running.stop().await.expect("forced stop should succeed");

    assert!(outcome.forced);
    assert_eq!(*states.borrow(), ProbeState::Stopped);
}

#[tokio::test]
async fn test_scoped_run_stops_after_body() {
    init_logging();
    let probe = ProcessProbe::new(shell(
        r#"echo "Now listening on: http://127.0.0.1:7071"; exec sleep 30"#,
    ));
    let states = probe.subscribe();

    let seen = with_probe(probe, |endpoint| async move { endpoint.url("api/HttpTest/ping") })
        .await
        .unwrap();

    assert_eq!(seen, "http://127.0.0.1:7071/api/HttpTest/ping");
    assert_eq!(*states.borrow(), ProbeState::Stopped);
}

#[tokio::test]
async fn test_scoped_run_stops_when_body_panics() {
    init_logging();
    let probe = ProcessProbe::new(shell(
        r#"echo "Now listening on: http://127.0.0.1:7071"; exec sleep 30"#,
    ));
    let states = probe.subscribe();

    let join = tokio::spawn(async move {
        with_probe(probe, |_endpoint| async move {
            panic!("assertion failed inside test body");
        })
        .await
    })
    .await;

    let err = join.expect_err("body panic should propagate");
    assert!(err.is_panic());
    assert_eq!(*states.borrow(), ProbeState::Stopped);
}

#[tokio::test]
async fn test_scoped_run_skips_body_when_setup_fails() {
    init_logging();
    let probe = ProcessProbe::new(shell("exit 1"));

    let mut ran = false;
    let result = with_probe(probe, |_endpoint| {
        ran = true;
        async {}
    })
    .await;

    assert!(matches!(result, Err(ProbeError::EarlyExit { .. })));
    assert!(!ran);
}

#[tokio::test]
async fn test_dropping_handle_kills_host() {
    init_logging();
    let running = ProcessProbe::new(shell(
        r#"echo "Now listening on: http://127.0.0.1:7071"; exec sleep 30"#,
    ))
    .start()
    .await
    .unwrap();
    let states = running.subscribe();
    let pid = running.pid().expect("running host has a pid");

    drop(running);

    assert_eq!(*states.borrow(), ProbeState::Stopped);

    let deadline = Instant::now() + Duration::from_secs(5);
    while !has_exited(pid) {
        assert!(Instant::now() < deadline, "host {pid} still running after drop");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Whether `pid` is gone or only a zombie awaiting the runtime's reaper.
fn has_exited(pid: u32) -> bool {
    let pid = libc::pid_t::try_from(pid).unwrap();

    // SAFETY: signal 0 only checks for existence.
    if unsafe { libc::kill(pid, 0) } != 0 {
        return std::io::Error::last_os_error().raw_os_error() == Some(libc::ESRCH);
    }

    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            stat.rsplit_once(')')
                .map(|(_, rest)| rest.trim_start().starts_with('Z'))
        })
        .unwrap_or(false)
}
