//! Turns decoded device gestures into application actions. The router is
//! stateless: every decision reads a fresh selection snapshot.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::warn;

use shared::domain::VibratePattern;
use shared::protocol::DeviceEvent;

use crate::dispatcher::CommandDispatcher;
use crate::supervisor::{DeviceSession, SessionEvent};
use crate::{Announcer, SelectionHost};

const FETCH_PROMPT: &str = "No tasks yet. Fetch recommendations to get started.";

pub struct GestureRouter {
    dispatcher: CommandDispatcher,
    selection: Arc<dyn SelectionHost>,
    announcer: Arc<dyn Announcer>,
}

impl GestureRouter {
    pub fn new(
        session: Arc<DeviceSession>,
        selection: Arc<dyn SelectionHost>,
        announcer: Arc<dyn Announcer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            dispatcher: CommandDispatcher::new(session),
            selection,
            announcer,
        })
    }

    /// Consumes the session's gesture stream until the session is dropped.
    /// Inbound gestures are handled strictly in arrival order.
    pub fn spawn(self: Arc<Self>, session: &Arc<DeviceSession>) -> JoinHandle<()> {
        let mut events = session.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if let SessionEvent::Gesture(gesture) = event {
                    self.handle(gesture).await;
                }
            }
        })
    }

    pub async fn handle(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Wake => {
                let snapshot = self.selection.snapshot();
                match snapshot.current_task() {
                    Some(task) => {
                        self.announcer
                            .announce(&format!("Device awake. Current task: {}", task.title));
                        self.dispatcher.push_task(task).await;
                    }
                    None => self.announcer.announce(FETCH_PROMPT),
                }
            }
            DeviceEvent::Next => self.advance(1).await,
            DeviceEvent::Prev => self.advance(-1).await,
            DeviceEvent::Confirm => {
                let snapshot = self.selection.snapshot();
                if snapshot.detail_open {
                    self.selection.complete().await;
                } else if let Some(task) = self.selection.open_detail().await {
                    self.dispatcher.vibrate(VibratePattern::Short).await;
                    self.announcer.announce(&format!(
                        "Selected {}. Squeeze firmly to complete.",
                        task.title
                    ));
                }
            }
            DeviceEvent::Unknown(raw) => {
                warn!(action = %raw, "ignoring unrecognized device gesture");
            }
        }
    }

    async fn advance(&self, step: i64) {
        match self.selection.advance(step).await {
            Some(task) => self
                .announcer
                .announce(&format!("Switched to {}", task.title)),
            None => self.announcer.announce(FETCH_PROMPT),
        }
    }
}
