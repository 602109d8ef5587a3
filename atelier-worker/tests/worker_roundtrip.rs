//! End-to-end lifecycle tests against a real subprocess.
//!
//! The "worker" is a small shell script speaking the handshake protocol
//! over inherited descriptor 3, so these tests cover the spawn path, the
//! line codec, readiness, reply correlation, and disposal without needing
//! a real workbench build.

#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;

use atelier_core::SessionOptions;
use atelier_worker::{
    SessionInitializer, UnixWorkerLauncher, WorkerError, WorkerLauncher, WorkerSupervisor,
};

/// A worker that signals ready, then answers every `init` with an
/// `options` reply echoing the request id.
const ECHO_WORKER: &str = r#"
printf '{"type":"ready"}\n' >&3
while IFS= read -r line <&3; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":"\([0-9a-fA-F-]*\)".*/\1/p')
  if [ -n "$id" ]; then
    printf '{"type":"options","id":"%s","options":{"product_configuration":{"marker":"shell"}}}\n' "$id" >&3
  fi
done
"#;

fn shell_launcher(script: &str) -> Arc<dyn WorkerLauncher> {
    Arc::new(UnixWorkerLauncher::new(
        PathBuf::from("/bin/sh"),
        vec!["-c".to_owned(), script.to_owned()],
    ))
}

#[tokio::test]
async fn worker_becomes_ready_and_negotiates_a_session() {
    let supervisor = Arc::new(WorkerSupervisor::new(shell_launcher(ECHO_WORKER)));
    let sessions = SessionInitializer::new(supervisor.clone());

    let handle = supervisor.ensure_started().await.expect("worker must become ready");
    assert!(handle.pid().is_some(), "a real process must have a pid");
    assert!(supervisor.is_running());

    let options = sessions
        .initialize(SessionOptions {
            remote_authority: "localhost:8000".to_owned(),
            ..Default::default()
        })
        .await
        .expect("session negotiation failed");
    assert_eq!(options.product_configuration["marker"], "shell");

    supervisor.dispose().await.expect("dispose failed");
    assert!(!supervisor.is_running());
}

#[tokio::test]
async fn concurrent_sessions_resolve_against_one_worker() {
    let supervisor = Arc::new(WorkerSupervisor::new(shell_launcher(ECHO_WORKER)));
    let sessions = SessionInitializer::new(supervisor.clone());

    let (a, b) = tokio::join!(
        sessions.initialize(SessionOptions::default()),
        sessions.initialize(SessionOptions::default()),
    );
    assert_eq!(a.expect("first session failed").product_configuration["marker"], "shell");
    assert_eq!(b.expect("second session failed").product_configuration["marker"], "shell");

    supervisor.dispose().await.expect("dispose failed");
}

#[tokio::test]
async fn exit_before_ready_carries_the_exit_code() {
    let supervisor = WorkerSupervisor::new(shell_launcher("exit 7"));

    let result = supervisor.ensure_started().await;
    match result {
        Err(WorkerError::ExitedUnexpectedly { code }) => assert_eq!(code, Some(7)),
        other => panic!("expected ExitedUnexpectedly with code 7, got {other:?}"),
    }
    assert!(!supervisor.is_running(), "failed start must clear the supervisor");
}

#[tokio::test]
async fn undecodable_greeting_fails_the_start() {
    let supervisor =
        WorkerSupervisor::new(shell_launcher("printf 'hello world\\n' >&3; sleep 10"));

    let result = supervisor.ensure_started().await;
    assert!(
        matches!(result, Err(WorkerError::Channel(_))),
        "a garbage greeting must fail the start, got {result:?}"
    );
}

#[tokio::test]
async fn missing_worker_binary_is_a_spawn_failure() {
    let launcher = Arc::new(UnixWorkerLauncher::new(
        PathBuf::from("/nonexistent/atelier-worker-bin"),
        Vec::new(),
    ));
    let supervisor = WorkerSupervisor::new(launcher);

    let result = supervisor.ensure_started().await;
    match result {
        Err(WorkerError::SpawnFailed(message)) => {
            assert!(message.contains("atelier-worker-bin"), "got: {message}");
        }
        other => panic!("expected SpawnFailed, got {other:?}"),
    }
}
