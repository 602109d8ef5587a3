//! Per-session negotiation with the worker.

use std::sync::Arc;

use tokio::sync::broadcast;

use atelier_core::{SessionId, SessionOptions, WorkbenchOptions};

use crate::link::WorkerEvent;
use crate::protocol::{GatewayMessage, WorkerMessage};
use crate::supervisor::WorkerSupervisor;
use crate::WorkerError;

/// Negotiates workbench sessions over the supervised worker.
#[derive(Clone)]
pub struct SessionInitializer {
    supervisor: Arc<WorkerSupervisor>,
}

impl SessionInitializer {
    /// Create an initializer bound to the given supervisor.
    #[must_use]
    pub fn new(supervisor: Arc<WorkerSupervisor>) -> Self {
        Self { supervisor }
    }

    /// Begin a logical workbench session and wait for its configuration.
    ///
    /// Starts the worker if needed, then sends `init` with a fresh
    /// correlation id and resolves on the first `options` reply carrying
    /// that id. Replies for other in-flight sessions are skipped, never
    /// misdelivered. The wait also ends if the worker errors or exits.
    ///
    /// There is no timeout on this path; a worker that never replies
    /// stalls the caller until it dies.
    ///
    /// # Errors
    /// Returns the start error if the worker cannot be spawned,
    /// [`WorkerError::ExitedUnexpectedly`] if it dies before replying, or
    /// [`WorkerError::Channel`] on channel failure.
    pub async fn initialize(
        &self,
        options: SessionOptions,
    ) -> Result<WorkbenchOptions, WorkerError> {
        let id = SessionId::new();
        let handle = self.supervisor.ensure_started().await?;

        // Subscribe before sending so the reply cannot slip past; the
        // receiver drops on every exit path, detaching the listener.
        let mut events = handle.subscribe();
        tracing::debug!(session = %id, "negotiating workbench session");
        handle.send(&GatewayMessage::Init { id, options }).await?;

        loop {
            match events.recv().await {
                Ok(WorkerEvent::Message(WorkerMessage::Options { id: reply_id, options }))
                    if reply_id == id =>
                {
                    tracing::trace!(session = %id, "workbench session negotiated");
                    return Ok(options);
                }
                // Parallel initializations share the stream; other replies
                // (and stray messages) belong to someone else.
                Ok(WorkerEvent::Message(_)) => {}
                Ok(WorkerEvent::Error(e)) => return Err(WorkerError::Channel(e)),
                Ok(WorkerEvent::Exit(code)) => {
                    return Err(WorkerError::ExitedUnexpectedly { code });
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(session = %id, skipped, "worker event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(WorkerError::EventStreamClosed);
                }
            }
        }
    }
}
