//! Worker link seam: the transport surface the supervisor drives.
//!
//! [`WorkerLink`] abstracts the process-backed IPC channel so lifecycle
//! logic can be exercised against scripted fakes, in the same way the
//! spawning side is abstracted behind [`WorkerLauncher`].
//!
//! [`WorkerLauncher`]: crate::spawn::WorkerLauncher

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::protocol::{GatewayMessage, WorkerMessage};
use crate::WorkerError;

/// Lifecycle and channel events observed from a worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A decoded protocol message.
    Message(WorkerMessage),
    /// The channel failed (read error, codec violation, broken pipe).
    Error(String),
    /// The process exited. `code` is `None` when it died to a signal.
    Exit(Option<i32>),
}

/// Transport to a live worker process.
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait WorkerLink: Send + Sync {
    /// Send one protocol message.
    ///
    /// # Errors
    /// Returns [`WorkerError::Channel`] if the channel write fails.
    async fn send(&self, message: &GatewayMessage) -> Result<(), WorkerError>;

    /// Send one protocol message with a socket descriptor attached.
    ///
    /// Ownership of the socket's byte stream passes to the worker; the
    /// local copy of the descriptor is closed once the transfer completes.
    ///
    /// # Errors
    /// Returns [`WorkerError::Channel`] if the transfer fails.
    async fn send_with_socket(
        &self,
        message: &GatewayMessage,
        socket: TcpStream,
    ) -> Result<(), WorkerError>;

    /// Terminate the worker process. The resulting exit is observed through
    /// the event stream like any other.
    ///
    /// # Errors
    /// Returns [`WorkerError::Channel`] if the signal cannot be delivered.
    async fn kill(&self) -> Result<(), WorkerError>;

    /// OS process id, when the link is backed by a real process.
    fn pid(&self) -> Option<u32>;
}

/// Shared handle to a started worker.
///
/// Every caller of `ensure_started` receives a clone of the same handle;
/// all clones observe the same process and the same event stream.
#[derive(Clone)]
pub struct WorkerHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    link: Box<dyn WorkerLink>,
    events: broadcast::Sender<WorkerEvent>,
    killed: AtomicBool,
    created_at: DateTime<Utc>,
}

impl WorkerHandle {
    /// Create a handle over an established link and its event stream.
    pub(crate) fn new(link: Box<dyn WorkerLink>, events: broadcast::Sender<WorkerEvent>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                link,
                events,
                killed: AtomicBool::new(false),
                created_at: Utc::now(),
            }),
        }
    }

    /// Subscribe to this worker's events. Dropping the receiver detaches
    /// the listener.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.inner.events.subscribe()
    }

    /// OS process id, when known.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.inner.link.pid()
    }

    /// When the worker was spawned.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// `true` once the handle was deliberately killed.
    #[must_use]
    pub fn is_killed(&self) -> bool {
        self.inner.killed.load(Ordering::SeqCst)
    }

    /// `true` when both handles refer to the same worker instance.
    #[must_use]
    pub fn same_worker(&self, other: &WorkerHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Send `message`, failing fast if the worker was killed.
    ///
    /// # Errors
    /// Returns [`WorkerError::NotRunning`] after a kill, or
    /// [`WorkerError::Channel`] if the channel write fails.
    pub async fn send(&self, message: &GatewayMessage) -> Result<(), WorkerError> {
        if self.is_killed() {
            return Err(WorkerError::NotRunning);
        }
        self.inner.link.send(message).await
    }

    /// Send `message` with a socket attached, failing fast if the worker
    /// was killed.
    ///
    /// # Errors
    /// Returns [`WorkerError::NotRunning`] after a kill, or
    /// [`WorkerError::Channel`] if the transfer fails.
    pub async fn send_with_socket(
        &self,
        message: &GatewayMessage,
        socket: TcpStream,
    ) -> Result<(), WorkerError> {
        if self.is_killed() {
            return Err(WorkerError::NotRunning);
        }
        self.inner.link.send_with_socket(message, socket).await
    }

    /// Mark the handle killed and terminate the process.
    ///
    /// The flag flips before the signal goes out so that exit observers can
    /// tell a deliberate shutdown from a crash.
    ///
    /// # Errors
    /// Returns [`WorkerError::Channel`] if the signal cannot be delivered.
    pub(crate) async fn kill(&self) -> Result<(), WorkerError> {
        self.inner.killed.store(true, Ordering::SeqCst);
        self.inner.link.kill().await
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("pid", &self.pid())
            .field("killed", &self.is_killed())
            .field("created_at", &self.created_at())
            .finish()
    }
}
