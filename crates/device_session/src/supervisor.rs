//! Connection supervisor: owns the one device transport, drives the
//! connect/retry lifecycle, and fans decoded gestures and status changes
//! out to subscribers. Transport trouble is never fatal; it only moves
//! the state machine.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use shared::protocol::{DeviceCommand, DeviceEvent};

use crate::codec;
use crate::dispatcher::display_commands;
use crate::transport::{DeviceLink, DeviceTransport};
use crate::SelectionHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Reconnecting => "reconnecting",
        }
    }
}

/// Retry schedule for lost connections. The default mirrors the kiosk
/// deployment: retry every two seconds, forever.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    StatusChanged(SessionStatus),
    Gesture(DeviceEvent),
}

struct SessionInner {
    status: SessionStatus,
    manual_disconnect: bool,
    /// Bumped by every `connect()`/`disconnect()`. Tasks spawned for an
    /// older generation must not touch the session when they wake up.
    generation: u64,
    attempts: u32,
    writer: Option<mpsc::UnboundedSender<String>>,
    link_task: Option<JoinHandle<()>>,
    retry_task: Option<JoinHandle<()>>,
}

pub struct DeviceSession {
    transport: Arc<dyn DeviceTransport>,
    selection: Arc<dyn SelectionHost>,
    policy: RetryPolicy,
    endpoint: String,
    inner: Mutex<SessionInner>,
    events: broadcast::Sender<SessionEvent>,
}

impl DeviceSession {
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        selection: Arc<dyn SelectionHost>,
        policy: RetryPolicy,
        endpoint: String,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            transport,
            selection,
            policy,
            endpoint,
            inner: Mutex::new(SessionInner {
                status: SessionStatus::Disconnected,
                manual_disconnect: false,
                generation: 0,
                attempts: 0,
                writer: None,
                link_task: None,
                retry_task: None,
            }),
            events,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn status(&self) -> SessionStatus {
        self.inner.lock().await.status
    }

    /// Starts (or restarts) the session. Any open transport is torn down
    /// first and any pending retry is cancelled, so there is never more
    /// than one live connection. Returns immediately; the outcome shows
    /// up as status events.
    pub async fn connect(self: &Arc<Self>) {
        let generation = {
            let mut inner = self.inner.lock().await;
            if let Some(task) = inner.retry_task.take() {
                task.abort();
            }
            if let Some(task) = inner.link_task.take() {
                task.abort();
            }
            inner.writer = None;
            inner.manual_disconnect = false;
            inner.generation += 1;
            inner.attempts = 0;
            self.set_status(&mut inner, SessionStatus::Connecting);
            inner.generation
        };
        self.spawn_link_task(generation).await;
    }

    /// Stops the session for good: cancels any pending retry, closes the
    /// transport, and suppresses all further reconnection until the next
    /// `connect()`.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        inner.manual_disconnect = true;
        inner.generation += 1;
        if let Some(task) = inner.retry_task.take() {
            task.abort();
        }
        if let Some(task) = inner.link_task.take() {
            task.abort();
        }
        inner.writer = None;
        self.set_status(&mut inner, SessionStatus::Disconnected);
        info!("device session disconnected");
    }

    /// Hands one command to the open transport, in call order. With no
    /// open connection the command is dropped with a warning; nothing is
    /// queued for later.
    pub async fn send(&self, command: &DeviceCommand) {
        let frame = match codec::encode(command) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "failed to encode device command");
                return;
            }
        };

        let inner = self.inner.lock().await;
        let writer = match (&inner.status, &inner.writer) {
            (SessionStatus::Connected, Some(writer)) => writer,
            _ => {
                warn!(
                    status = inner.status.as_str(),
                    command = ?command,
                    "device command dropped, no open connection"
                );
                return;
            }
        };
        if writer.send(frame).is_err() {
            warn!(command = ?command, "device command dropped, connection closing");
        }
    }

    fn set_status(&self, inner: &mut SessionInner, status: SessionStatus) {
        if inner.status == status {
            return;
        }
        inner.status = status;
        let _ = self.events.send(SessionEvent::StatusChanged(status));
    }

    fn spawn_link_task<'a>(
        self: &'a Arc<Self>,
        generation: u64,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let session = Arc::clone(self);
            let handle = tokio::spawn(async move {
                match session.transport.connect(&session.endpoint).await {
                    Ok(link) => session.run_link(generation, link).await,
                    Err(err) => {
                        warn!(error = %err, endpoint = %session.endpoint, "device connect failed");
                        session.handle_link_down(generation).await;
                    }
                }
            });

            let mut inner = self.inner.lock().await;
            if inner.generation == generation {
                inner.link_task = Some(handle);
            } else {
                handle.abort();
            }
        })
    }

    async fn run_link(self: &Arc<Self>, generation: u64, link: DeviceLink) {
        let DeviceLink {
            mut sink,
            mut stream,
        } = link;
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<String>();

        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                sink.close().await;
                return;
            }
            inner.attempts = 0;
            inner.writer = Some(writer_tx);
            self.set_status(&mut inner, SessionStatus::Connected);
        }
        info!(endpoint = %self.endpoint, "device connected");

        // The writer owns the sink; it closes the connection once the
        // supervisor drops the sending half.
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = writer_rx.recv().await {
                if let Err(err) = sink.send(frame).await {
                    warn!(error = %err, "device send failed");
                    break;
                }
            }
            sink.close().await;
        });

        // The device display must never lag a (re)connect.
        if let Some(task) = self.selection.snapshot().current_task() {
            for command in display_commands(task) {
                self.send(&command).await;
            }
        }

        while let Some(frame) = stream.next_frame().await {
            match frame {
                Ok(text) => {
                    let _ = self.events.send(SessionEvent::Gesture(codec::decode(&text)));
                }
                Err(err) => {
                    warn!(error = %err, "device receive failed");
                    break;
                }
            }
        }

        writer_task.abort();
        self.handle_link_down(generation).await;
    }

    async fn handle_link_down(self: &Arc<Self>, generation: u64) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return;
        }
        inner.writer = None;

        if inner.manual_disconnect {
            self.set_status(&mut inner, SessionStatus::Disconnected);
            return;
        }

        if let Some(max) = self.policy.max_attempts {
            if inner.attempts >= max {
                warn!(attempts = inner.attempts, "device retry budget exhausted");
                self.set_status(&mut inner, SessionStatus::Disconnected);
                return;
            }
        }

        inner.attempts += 1;
        self.set_status(&mut inner, SessionStatus::Reconnecting);
        let session = Arc::clone(self);
        let interval = self.policy.interval;
        inner.retry_task = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            session.retry(generation).await;
        }));
    }

    async fn retry(self: &Arc<Self>, generation: u64) {
        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation || inner.manual_disconnect {
                return;
            }
            inner.retry_task = None;
            self.set_status(&mut inner, SessionStatus::Connecting);
        }
        self.spawn_link_task(generation).await;
    }
}
