//! TCP accept loop and connection dispatch.
//!
//! Each connection's request head is located with `peek` before a single
//! byte is consumed. WebSocket upgrades are then handled directly on the
//! raw socket (which must stay transferable to the worker); everything
//! else is served through the axum router over a per-connection HTTP
//! stack.

use std::io;
use std::sync::Arc;

use axum::Router;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

use atelier_worker::{SessionInitializer, UnixWorkerLauncher, WorkerSupervisor};

use crate::auth::Authenticator;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::{self, RequestHead};
use crate::routes;
use crate::settings::SettingsFile;
use crate::upgrade::UpgradeHandler;

/// Shared gateway state: configuration, collaborators, and the worker
/// stack.
pub struct AppState {
    /// Runtime configuration.
    pub config: GatewayConfig,
    /// Authentication collaborator.
    pub auth: Arc<dyn Authenticator>,
    /// Lifecycle owner of the worker subprocess.
    pub supervisor: Arc<WorkerSupervisor>,
    /// Session negotiation over the supervised worker.
    pub sessions: SessionInitializer,
    /// Persisted gateway state.
    pub settings: SettingsFile,
    /// WebSocket upgrade handling.
    pub upgrade: UpgradeHandler,
}

/// Handle on the shared state, cloned into every connection task.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the full gateway stack from configuration.
    #[must_use]
    pub fn new(config: GatewayConfig, auth: Arc<dyn Authenticator>) -> SharedState {
        let launcher = Arc::new(UnixWorkerLauncher::new(
            config.worker_command.clone(),
            config.worker_args.clone(),
        ));
        let supervisor = Arc::new(WorkerSupervisor::new(launcher));
        Arc::new(Self {
            sessions: SessionInitializer::new(Arc::clone(&supervisor)),
            upgrade: UpgradeHandler::new(Arc::clone(&supervisor)),
            settings: SettingsFile::new(config.settings_path.clone()),
            supervisor,
            auth,
            config,
        })
    }
}

/// Run the accept loop until the listener fails.
///
/// # Errors
/// Returns the listener's `accept` error; individual connection failures
/// are logged, not propagated.
pub async fn serve(listener: TcpListener, state: SharedState) -> io::Result<()> {
    let router = routes::create_router(Arc::clone(&state));
    loop {
        let (stream, peer) = listener.accept().await?;
        let state = Arc::clone(&state);
        let router = router.clone();
        tokio::spawn(async move {
            if let Err(error) = handle_connection(stream, &state, router).await {
                tracing::debug!(%peer, %error, "connection closed with error");
            }
        });
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    state: &AppState,
    router: Router,
) -> Result<(), GatewayError> {
    let Some((head_len, head_bytes)) = http::peek_request_head(&stream).await? else {
        return Ok(());
    };
    let head = RequestHead::parse(&head_bytes)?;

    if head.is_upgrade() {
        // Consume exactly the head. Anything the client sent beyond it
        // stays unread in the kernel buffer and travels with the
        // descriptor during handoff.
        let mut consumed = vec![0u8; head_len];
        stream.read_exact(&mut consumed).await?;

        let user = state.auth.authenticate(head.header("cookie"));
        if let Err(error) = state
            .upgrade
            .handle_upgrade(user.as_ref(), state.config.disabled, &head, stream)
            .await
        {
            tracing::warn!(%error, path = %head.path, "websocket upgrade failed");
        }
        return Ok(());
    }

    hyper::server::conn::http1::Builder::new()
        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(router))
        .await
        .map_err(|e| GatewayError::InvalidRequest(format!("http connection: {e}")))
}
