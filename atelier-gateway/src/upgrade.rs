//! WebSocket upgrade handling and socket handoff.
//!
//! The gateway completes only the opening handshake. All framing beyond
//! the `101` response belongs to the worker, which receives the raw socket
//! over the IPC channel.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use atelier_core::UserInfo;
use atelier_worker::{GatewayMessage, WorkerSupervisor};

use crate::error::GatewayError;
use crate::http::RequestHead;

/// Fixed GUID from the WebSocket opening handshake (RFC 6455 §4.2.2).
const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Compute the `Sec-WebSocket-Accept` token for a client key:
/// `base64(sha1(key + GUID))`.
#[must_use]
pub fn accept_token(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Completes WebSocket opening handshakes and hands the sockets to the
/// worker.
pub struct UpgradeHandler {
    supervisor: Arc<WorkerSupervisor>,
}

impl UpgradeHandler {
    /// Create a handler bound to the given supervisor.
    #[must_use]
    pub fn new(supervisor: Arc<WorkerSupervisor>) -> Self {
        Self { supervisor }
    }

    /// Perform the opening handshake on `socket` and transfer it to the
    /// worker together with the request's query parameters.
    ///
    /// Preconditions are checked before anything touches the socket: the
    /// caller must be authenticated and the workbench must not be
    /// disabled. The worker must already be running; this path never
    /// starts one, and a missing worker fails the connection rather than
    /// leaving a half-upgraded socket behind.
    ///
    /// The caller must have consumed exactly the request head from
    /// `socket`: unread bytes stay in the kernel buffer and travel with
    /// the transferred descriptor, so byte-stream continuity is free.
    ///
    /// # Errors
    /// Returns [`GatewayError::Unauthorized`] / [`GatewayError::Disabled`]
    /// for failed gates (nothing written), [`GatewayError::InvalidRequest`]
    /// when the opening key is missing, and worker errors when the handoff
    /// cannot complete.
    pub async fn handle_upgrade(
        &self,
        user: Option<&UserInfo>,
        disabled: bool,
        head: &RequestHead,
        mut socket: TcpStream,
    ) -> Result<(), GatewayError> {
        if user.is_none() {
            return Err(GatewayError::Unauthorized);
        }
        if disabled {
            return Err(GatewayError::Disabled);
        }

        let key = head.header("sec-websocket-key").ok_or_else(|| {
            GatewayError::InvalidRequest("missing Sec-WebSocket-Key header".to_owned())
        })?;
        let token = accept_token(key);

        // The worker owns all framing; only the initial upgrade happens
        // here, straight onto the raw socket.
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {token}\r\n\
             \r\n"
        );
        socket.write_all(response.as_bytes()).await?;

        let worker = self.supervisor.running_worker().await?;
        worker
            .send_with_socket(&GatewayMessage::Socket { query: head.query.clone() }, socket)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use atelier_worker::{UnixWorkerLauncher, WorkerError};

    use super::*;

    /// Known-answer vector from RFC 6455 §1.3.
    #[test]
    fn accept_token_matches_the_standard_example() {
        assert_eq!(accept_token("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn accept_token_is_deterministic_and_key_sensitive() {
        let a = accept_token("AQIDBAUGBwgJCgsMDQ4PEC==");
        assert_eq!(a, accept_token("AQIDBAUGBwgJCgsMDQ4PEC=="));
        assert_ne!(a, accept_token("dGhlIHNhbXBsZSBub25jZQ=="));
    }

    fn upgrade_head() -> RequestHead {
        RequestHead::parse(
            b"GET /?token=t HTTP/1.1\r\n\
              Connection: Upgrade\r\n\
              Upgrade: websocket\r\n\
              Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
              \r\n",
        )
        .expect("head must parse")
    }

    fn idle_handler() -> UpgradeHandler {
        // A supervisor that was never started: the upgrade path must not
        // start a worker on its own.
        UpgradeHandler::new(Arc::new(WorkerSupervisor::new(Arc::new(
            UnixWorkerLauncher::new("/nonexistent/worker".into(), Vec::new()),
        ))))
    }

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let client = TcpStream::connect(addr).await.expect("connect");
        let (server, _) = listener.accept().await.expect("accept");
        (client, server)
    }

    #[tokio::test]
    async fn unauthenticated_upgrade_writes_nothing() {
        let handler = idle_handler();
        let (mut client, server) = socket_pair().await;

        let result = handler.handle_upgrade(None, false, &upgrade_head(), server).await;
        assert!(matches!(result, Err(GatewayError::Unauthorized)), "got: {result:?}");

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.expect("read");
        assert!(buf.is_empty(), "no byte may be written before the auth gate passes");
    }

    #[tokio::test]
    async fn disabled_upgrade_writes_nothing() {
        let handler = idle_handler();
        let (mut client, server) = socket_pair().await;
        let user = UserInfo::new("default");

        let result = handler.handle_upgrade(Some(&user), true, &upgrade_head(), server).await;
        assert!(matches!(result, Err(GatewayError::Disabled)), "got: {result:?}");

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.expect("read");
        assert!(buf.is_empty(), "no byte may be written while disabled");
    }

    #[tokio::test]
    async fn missing_key_is_rejected_before_any_write() {
        let handler = idle_handler();
        let (mut client, server) = socket_pair().await;
        let user = UserInfo::new("default");
        let head = RequestHead::parse(
            b"GET / HTTP/1.1\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n",
        )
        .expect("head must parse");

        let result = handler.handle_upgrade(Some(&user), false, &head, server).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))), "got: {result:?}");

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.expect("read");
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn handshake_bytes_match_the_wire_format_exactly() {
        let handler = idle_handler();
        let (mut client, server) = socket_pair().await;
        let user = UserInfo::new("default");

        // No worker is running, so the handoff fails after the handshake.
        let result = handler.handle_upgrade(Some(&user), false, &upgrade_head(), server).await;
        assert!(
            matches!(result, Err(GatewayError::Worker(WorkerError::NotRunning))),
            "the upgrade path must not start a worker, got {result:?}"
        );

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.expect("read");
        let expected = "HTTP/1.1 101 Switching Protocols\r\n\
                        Upgrade: websocket\r\n\
                        Connection: Upgrade\r\n\
                        Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
                        \r\n";
        assert_eq!(
            String::from_utf8_lossy(&buf),
            expected,
            "the 101 response must match byte-for-byte"
        );
    }
}
