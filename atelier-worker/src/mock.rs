//! Scripted launcher and link fakes shared by the lifecycle tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use atelier_core::WorkbenchOptions;

use crate::link::{WorkerEvent, WorkerHandle, WorkerLink};
use crate::protocol::GatewayMessage;
use crate::spawn::{LaunchedWorker, WorkerLauncher};
use crate::WorkerError;

type OnSend = Arc<dyn Fn(&GatewayMessage, &broadcast::Sender<WorkerEvent>) + Send + Sync>;

/// Launcher fake: counts spawns, replays a scripted event prefix, and lets
/// tests inject events into the most recent worker's stream.
pub(crate) struct MockLauncher {
    pub(crate) launches: AtomicUsize,
    pub(crate) kills: Arc<AtomicUsize>,
    pub(crate) sent: Arc<Mutex<Vec<GatewayMessage>>>,
    script: Vec<WorkerEvent>,
    fail_spawn: Option<String>,
    delay: Option<Duration>,
    on_send: Option<OnSend>,
    last_events: Mutex<Option<broadcast::Sender<WorkerEvent>>>,
}

impl MockLauncher {
    /// A launcher whose workers immediately signal ready.
    pub(crate) fn ready() -> Self {
        Self::scripted(vec![WorkerEvent::Message(crate::protocol::WorkerMessage::Ready)])
    }

    /// A launcher whose workers replay `script` right after launch.
    pub(crate) fn scripted(script: Vec<WorkerEvent>) -> Self {
        Self {
            launches: AtomicUsize::new(0),
            kills: Arc::new(AtomicUsize::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
            script,
            fail_spawn: None,
            delay: None,
            on_send: None,
            last_events: Mutex::new(None),
        }
    }

    /// A launcher that always fails to spawn.
    pub(crate) fn failing_spawn(message: &str) -> Self {
        let mut launcher = Self::scripted(Vec::new());
        launcher.fail_spawn = Some(message.to_owned());
        launcher
    }

    /// Stall each launch, widening windows for concurrency tests.
    pub(crate) fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// React to messages the supervisor side sends.
    pub(crate) fn with_on_send(
        mut self,
        on_send: impl Fn(&GatewayMessage, &broadcast::Sender<WorkerEvent>) + Send + Sync + 'static,
    ) -> Self {
        self.on_send = Some(Arc::new(on_send));
        self
    }

    /// Inject an event into the most recently launched worker's stream.
    pub(crate) fn inject(&self, event: WorkerEvent) {
        let last = self.last_events.lock().expect("last events lock");
        let sender = last.as_ref().expect("no worker launched yet");
        let _ = sender.send(event);
    }
}

#[async_trait]
impl WorkerLauncher for MockLauncher {
    async fn launch(&self) -> Result<LaunchedWorker, WorkerError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_spawn {
            return Err(WorkerError::SpawnFailed(message.clone()));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let (events_tx, events_rx) = broadcast::channel(64);
        let link = MockLink {
            events: events_tx.clone(),
            sent: Arc::clone(&self.sent),
            kills: Arc::clone(&self.kills),
            on_send: self.on_send.clone(),
        };
        let handle = WorkerHandle::new(Box::new(link), events_tx.clone());

        // The subscription above exists before any scripted event fires,
        // mirroring the production launcher's ordering guarantee.
        for event in &self.script {
            let _ = events_tx.send(event.clone());
        }
        *self.last_events.lock().expect("last events lock") = Some(events_tx);

        Ok(LaunchedWorker { handle, events: events_rx })
    }
}

struct MockLink {
    events: broadcast::Sender<WorkerEvent>,
    sent: Arc<Mutex<Vec<GatewayMessage>>>,
    kills: Arc<AtomicUsize>,
    on_send: Option<OnSend>,
}

#[async_trait]
impl WorkerLink for MockLink {
    async fn send(&self, message: &GatewayMessage) -> Result<(), WorkerError> {
        self.sent.lock().expect("sent lock").push(message.clone());
        if let Some(on_send) = &self.on_send {
            on_send(message, &self.events);
        }
        Ok(())
    }

    async fn send_with_socket(
        &self,
        message: &GatewayMessage,
        socket: TcpStream,
    ) -> Result<(), WorkerError> {
        drop(socket);
        self.send(message).await
    }

    async fn kill(&self) -> Result<(), WorkerError> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        let _ = self.events.send(WorkerEvent::Exit(None));
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        Some(4242)
    }
}

/// Workbench options with a recognizable marker for assertions.
pub(crate) fn sample_options(marker: &str) -> WorkbenchOptions {
    WorkbenchOptions {
        product_configuration: serde_json::json!({ "marker": marker }),
        ..Default::default()
    }
}

/// Poll `condition` until it holds, panicking after one second.
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition did not hold within one second");
}
