//! Worker supervision: lazy single-instance start, readiness tracking,
//! and restart-on-crash bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::broadcast;

use crate::link::{WorkerEvent, WorkerHandle};
use crate::protocol::WorkerMessage;
use crate::spawn::{LaunchedWorker, WorkerLauncher};
use crate::WorkerError;

type StartFuture = Shared<BoxFuture<'static, Result<WorkerHandle, WorkerError>>>;

struct Slot {
    attempt: u64,
    future: StartFuture,
}

type SharedSlot = Arc<Mutex<Option<Slot>>>;

/// Supervises the single worker subprocess.
///
/// Only the supervisor mutates the worker slot; every other component
/// either reads [`is_running`](Self::is_running) or awaits the shared
/// start future through [`ensure_started`](Self::ensure_started) /
/// [`running_worker`](Self::running_worker).
pub struct WorkerSupervisor {
    launcher: Arc<dyn WorkerLauncher>,
    slot: SharedSlot,
    attempts: AtomicU64,
}

impl WorkerSupervisor {
    /// Create a supervisor over the given launcher. No process is spawned
    /// until the first [`ensure_started`](Self::ensure_started) call.
    #[must_use]
    pub fn new(launcher: Arc<dyn WorkerLauncher>) -> Self {
        Self {
            launcher,
            slot: Arc::new(Mutex::new(None)),
            attempts: AtomicU64::new(0),
        }
    }

    /// `true` while a worker is starting or running.
    ///
    /// # Panics
    /// Panics if the slot lock is poisoned (a thread panicked while
    /// holding it).
    #[must_use]
    pub fn is_running(&self) -> bool {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.slot.lock().expect("worker slot lock poisoned").is_some()
    }

    /// Start the worker if needed and wait for it to become ready.
    ///
    /// Idempotent: concurrent callers share one start attempt and receive
    /// clones of the same handle. A failed attempt clears the slot, so the
    /// next call spawns anew; the failure itself is not retried here.
    ///
    /// There is no timeout on this path; a worker that never signals
    /// ready stalls its callers until it exits or fails.
    ///
    /// # Errors
    /// Returns [`WorkerError::SpawnFailed`] if the process cannot be
    /// started, [`WorkerError::ExitedUnexpectedly`] if it exits before
    /// signaling ready, and [`WorkerError::UnexpectedReadyReply`] if its
    /// first message is not `ready`.
    pub async fn ensure_started(&self) -> Result<WorkerHandle, WorkerError> {
        let future = {
            #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
            let mut slot = self.slot.lock().expect("worker slot lock poisoned");
            if let Some(current) = slot.as_ref() {
                current.future.clone()
            } else {
                let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(attempt, "starting workbench worker");
                let future = start_attempt(Arc::clone(&self.launcher), Arc::clone(&self.slot), attempt)
                    .boxed()
                    .shared();
                *slot = Some(Slot { attempt, future: future.clone() });
                future
            }
        };
        future.await
    }

    /// Await the worker started by an earlier call, without starting one.
    ///
    /// # Errors
    /// Returns [`WorkerError::NotRunning`] when no start is in flight or
    /// completed, or the start attempt's own error if it failed.
    pub async fn running_worker(&self) -> Result<WorkerHandle, WorkerError> {
        let future = {
            #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
            let slot = self.slot.lock().expect("worker slot lock poisoned");
            slot.as_ref().map(|s| s.future.clone())
        };
        match future {
            Some(future) => future.await,
            None => Err(WorkerError::NotRunning),
        }
    }

    /// Shut the worker down, if one exists.
    ///
    /// The slot is cleared before the process is killed, so new callers
    /// never observe a half-torn-down worker, and the kill is marked on the
    /// handle so the exit monitor treats it as deliberate. Safe to call
    /// with no worker and safe to race with itself: whichever call takes
    /// the slot performs the kill, the rest are no-ops.
    ///
    /// # Errors
    /// Returns [`WorkerError::Channel`] if the kill signal cannot be
    /// delivered.
    pub async fn dispose(&self) -> Result<(), WorkerError> {
        let taken = {
            #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
            let mut slot = self.slot.lock().expect("worker slot lock poisoned");
            slot.take()
        };
        let Some(slot) = taken else {
            return Ok(());
        };
        tracing::debug!("disposing workbench worker");
        match slot.future.await {
            Ok(handle) => handle.kill().await,
            // The start already failed; there is nothing to kill.
            Err(_) => Ok(()),
        }
    }
}

/// One start attempt: launch, wait for `ready`, then hand lifecycle
/// monitoring to a background task.
async fn start_attempt(
    launcher: Arc<dyn WorkerLauncher>,
    slot: SharedSlot,
    attempt: u64,
) -> Result<WorkerHandle, WorkerError> {
    let launched = match launcher.launch().await {
        Ok(launched) => launched,
        Err(error) => {
            tracing::error!(%error, "worker spawn failed");
            clear_attempt(&slot, attempt);
            return Err(error);
        }
    };
    let LaunchedWorker { handle, mut events } = launched;

    let outcome = loop {
        match events.recv().await {
            Ok(WorkerEvent::Message(WorkerMessage::Ready)) => break Ok(()),
            Ok(WorkerEvent::Message(message)) => {
                tracing::error!(?message, "unexpected response waiting for ready");
                break Err(WorkerError::UnexpectedReadyReply);
            }
            Ok(WorkerEvent::Error(e)) => break Err(WorkerError::Channel(e)),
            Ok(WorkerEvent::Exit(code)) => break Err(WorkerError::ExitedUnexpectedly { code }),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "worker event stream lagged during start");
            }
            Err(broadcast::error::RecvError::Closed) => break Err(WorkerError::EventStreamClosed),
        }
    };

    match outcome {
        Ok(()) => {
            tracing::debug!(pid = ?handle.pid(), "worker ready");
            spawn_exit_monitor(handle.clone(), events, slot, attempt);
            Ok(handle)
        }
        Err(error) => {
            tracing::error!(%error, "worker failed to start");
            clear_attempt(&slot, attempt);
            let _ = handle.kill().await;
            Err(error)
        }
    }
}

/// Watch a ready worker for unexpected death and reset the slot so a later
/// `ensure_started` spawns a fresh process. A deliberate kill (disposal)
/// is recognized through the handle's killed flag and leaves the slot
/// alone, since dispose already cleared it.
fn spawn_exit_monitor(
    handle: WorkerHandle,
    mut events: broadcast::Receiver<WorkerEvent>,
    slot: SharedSlot,
    attempt: u64,
) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(WorkerEvent::Message(_)) => {}
                Ok(WorkerEvent::Error(error)) => {
                    if handle.is_killed() {
                        break;
                    }
                    tracing::error!(%error, "worker channel error");
                    clear_attempt(&slot, attempt);
                    break;
                }
                Ok(WorkerEvent::Exit(code)) => {
                    if handle.is_killed() {
                        tracing::debug!(?code, "worker exited after disposal");
                        break;
                    }
                    tracing::error!(?code, "worker exited unexpectedly");
                    clear_attempt(&slot, attempt);
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "worker event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn clear_attempt(slot: &SharedSlot, attempt: u64) {
    #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
    let mut slot = slot.lock().expect("worker slot lock poisoned");
    if slot.as_ref().is_some_and(|s| s.attempt == attempt) {
        *slot = None;
    }
}
