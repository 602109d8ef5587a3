//! Spawning the worker subprocess and wiring its IPC channel.
//!
//! The worker inherits one end of a Unix socketpair as file descriptor 3
//! (named by [`IPC_FD_ENV`]) and speaks the handshake protocol over it as
//! newline-delimited JSON. Upgraded connections are later transferred over
//! the same socket via SCM_RIGHTS.

use std::io;
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::Interest;
use tokio::net::{TcpStream, UnixStream};
use tokio::process::Command;
use tokio::sync::broadcast;

use crate::fd;
use crate::link::{WorkerEvent, WorkerHandle, WorkerLink};
use crate::protocol::{self, GatewayMessage};
use crate::WorkerError;

/// Environment variable naming the worker's inherited IPC descriptor.
pub const IPC_FD_ENV: &str = "ATELIER_IPC_FD";

/// Descriptor number the worker inherits the IPC socket as.
pub const WORKER_IPC_FD: RawFd = 3;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A freshly launched worker: its handle plus an event subscription opened
/// before any channel task started, so no early event can be missed.
pub struct LaunchedWorker {
    /// Handle shared with every caller of the supervisor.
    pub handle: WorkerHandle,
    /// Event stream primed from before the worker produced its first byte.
    pub events: broadcast::Receiver<WorkerEvent>,
}

/// Spawns worker processes and wires their IPC channels.
///
/// Abstracted so lifecycle logic can run against scripted fakes; the
/// production implementation is [`UnixWorkerLauncher`].
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Spawn one worker.
    ///
    /// # Errors
    /// Returns [`WorkerError::SpawnFailed`] if the process cannot be
    /// started or the channel cannot be established.
    async fn launch(&self) -> Result<LaunchedWorker, WorkerError>;
}

/// Production launcher: forks the configured worker command with an
/// inherited socketpair end.
#[derive(Debug, Clone)]
pub struct UnixWorkerLauncher {
    command: PathBuf,
    args: Vec<String>,
}

impl UnixWorkerLauncher {
    /// Create a launcher for the given worker command and arguments.
    #[must_use]
    pub fn new(command: PathBuf, args: Vec<String>) -> Self {
        Self { command, args }
    }
}

#[async_trait]
impl WorkerLauncher for UnixWorkerLauncher {
    async fn launch(&self) -> Result<LaunchedWorker, WorkerError> {
        let (ours, theirs) = std::os::unix::net::UnixStream::pair()
            .map_err(|e| WorkerError::SpawnFailed(format!("socketpair: {e}")))?;
        ours.set_nonblocking(true)
            .map_err(|e| WorkerError::SpawnFailed(format!("set_nonblocking: {e}")))?;
        let stream = UnixStream::from_std(ours)
            .map_err(|e| WorkerError::SpawnFailed(format!("register socket: {e}")))?;

        let theirs_fd = theirs.into_raw_fd();
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .env(IPC_FD_ENV, WORKER_IPC_FD.to_string())
            .kill_on_drop(true);
        unsafe {
            // dup2 clears CLOEXEC, so the worker inherits exactly fd 3.
            // If the pair already landed on fd 3, dup2 to self would leave
            // CLOEXEC set; strip it directly instead.
            command.pre_exec(move || {
                if theirs_fd == WORKER_IPC_FD {
                    let flags = libc::fcntl(WORKER_IPC_FD, libc::F_GETFD);
                    if flags < 0
                        || libc::fcntl(WORKER_IPC_FD, libc::F_SETFD, flags & !libc::FD_CLOEXEC) < 0
                    {
                        return Err(io::Error::last_os_error());
                    }
                } else if libc::dup2(theirs_fd, WORKER_IPC_FD) < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let spawned = command.spawn();
        // The parent's copy of the child end is no longer needed; closing it
        // is what lets the reader observe EOF when the worker exits.
        unsafe {
            libc::close(theirs_fd);
        }
        let mut child = spawned.map_err(|e| {
            WorkerError::SpawnFailed(format!("exec {}: {e}", self.command.display()))
        })?;
        let Some(pid) = child.id() else {
            return Err(WorkerError::SpawnFailed("worker pid unavailable".to_owned()));
        };

        tracing::info!(pid, command = %self.command.display(), "spawned workbench worker");

        let (events_tx, events_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let stream = Arc::new(stream);

        let reader_stream = Arc::clone(&stream);
        let reader_events = events_tx.clone();
        tokio::spawn(async move {
            read_worker_messages(&reader_stream, &reader_events).await;
        });

        let exit_events = events_tx.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let _ = exit_events.send(WorkerEvent::Exit(status.code()));
                }
                Err(e) => {
                    let _ = exit_events.send(WorkerEvent::Error(format!("wait: {e}")));
                }
            }
        });

        let link = UnixWorkerLink {
            stream,
            write_gate: tokio::sync::Mutex::new(()),
            pid,
        };
        let handle = WorkerHandle::new(Box::new(link), events_tx);
        Ok(LaunchedWorker { handle, events: events_rx })
    }
}

/// Decode newline-delimited protocol messages until EOF or a read error.
///
/// EOF itself is silent: the exit watcher reports how the process ended.
async fn read_worker_messages(stream: &UnixStream, events: &broadcast::Sender<WorkerEvent>) {
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Err(e) = stream.readable().await {
            let _ = events.send(WorkerEvent::Error(format!("read: {e}")));
            return;
        }
        match stream.try_read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => {
                pending.extend_from_slice(&chunk[..n]);
                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    let text = String::from_utf8_lossy(&line[..line.len() - 1]);
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    match protocol::decode_line(text) {
                        Ok(message) => {
                            tracing::trace!(?message, "message from worker");
                            let _ = events.send(WorkerEvent::Message(message));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "undecodable message from worker");
                            let _ = events.send(WorkerEvent::Error(e.to_string()));
                            return;
                        }
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                let _ = events.send(WorkerEvent::Error(format!("read: {e}")));
                return;
            }
        }
    }
}

async fn write_bytes(stream: &UnixStream, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        stream.writable().await?;
        match stream.try_write(buf) {
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

struct UnixWorkerLink {
    stream: Arc<UnixStream>,
    /// Serializes writers so a handoff's payload is never interleaved with
    /// another message.
    write_gate: tokio::sync::Mutex<()>,
    pid: u32,
}

#[async_trait]
impl WorkerLink for UnixWorkerLink {
    async fn send(&self, message: &GatewayMessage) -> Result<(), WorkerError> {
        let line = protocol::encode_line(message)?;
        let _gate = self.write_gate.lock().await;
        write_bytes(&self.stream, &line)
            .await
            .map_err(|e| WorkerError::Channel(format!("write: {e}")))
    }

    async fn send_with_socket(
        &self,
        message: &GatewayMessage,
        socket: TcpStream,
    ) -> Result<(), WorkerError> {
        let line = protocol::encode_line(message)?;
        let _gate = self.write_gate.lock().await;
        let channel_fd = self.stream.as_raw_fd();
        let socket_fd = socket.as_raw_fd();
        let sent = self
            .stream
            .async_io(Interest::WRITABLE, || {
                fd::send_with_fd(channel_fd, &line, socket_fd)
            })
            .await
            .map_err(|e| WorkerError::Channel(format!("socket handoff: {e}")))?;
        // The descriptor travels with the first accepted byte; any payload
        // remainder goes out as a plain write under the same gate.
        if sent < line.len() {
            write_bytes(&self.stream, &line[sent..])
                .await
                .map_err(|e| WorkerError::Channel(format!("handoff tail: {e}")))?;
        }
        drop(socket);
        Ok(())
    }

    async fn kill(&self) -> Result<(), WorkerError> {
        #[allow(clippy::cast_possible_wrap)]
        let rc = unsafe { libc::kill(self.pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            // ESRCH means the worker already exited, which is fine here.
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(WorkerError::Channel(format!("kill: {err}")));
            }
        }
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }
}
