//! Error types for the worker crate.

/// Errors from worker lifecycle, handshake, and IPC operations.
///
/// `Clone` because a start failure flows to every caller awaiting the same
/// shared start future.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum WorkerError {
    /// Worker process failed to spawn.
    #[error("worker spawn failed: {0}")]
    SpawnFailed(String),

    /// The worker exited without (or before) doing what was asked of it.
    #[error("worker exited unexpectedly (code {code:?})")]
    ExitedUnexpectedly {
        /// Exit code, or `None` when the process died to a signal.
        code: Option<i32>,
    },

    /// The first message from a fresh worker was not `ready`.
    #[error("unexpected response waiting for ready response")]
    UnexpectedReadyReply,

    /// A protocol message could not be encoded or decoded.
    #[error("protocol codec error: {0}")]
    Codec(String),

    /// The IPC channel failed.
    #[error("worker channel error: {0}")]
    Channel(String),

    /// Attempt to send to a worker that is absent or already killed.
    #[error("worker is not running")]
    NotRunning,

    /// The event stream closed before a terminal outcome was observed.
    #[error("worker event stream closed")]
    EventStreamClosed,
}
