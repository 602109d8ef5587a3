//! Worker supervision and handshake protocol for the Atelier workbench
//! gateway.
//!
//! Owns the worker subprocess lifecycle (lazy single-instance start,
//! readiness, restart-on-crash), negotiates workbench sessions over a typed
//! IPC channel, and transfers upgraded sockets to the worker via descriptor
//! passing.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod error;
mod fd;
pub mod link;
pub mod protocol;
pub mod session;
pub mod spawn;
pub mod supervisor;

#[cfg(test)]
mod mock;

pub use error::WorkerError;
pub use link::{WorkerEvent, WorkerHandle, WorkerLink};
pub use protocol::{GatewayMessage, WorkerMessage};
pub use session::SessionInitializer;
pub use spawn::{LaunchedWorker, UnixWorkerLauncher, WorkerLauncher, IPC_FD_ENV, WORKER_IPC_FD};
pub use supervisor::WorkerSupervisor;
