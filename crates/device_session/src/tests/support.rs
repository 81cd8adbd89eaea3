use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::timeout;

use shared::domain::{Task, TaskCategory};

use crate::transport::{DeviceLink, DeviceTransport, FrameSink, FrameStream};
use crate::{
    Announcer, RetryPolicy, SelectionHost, SelectionSnapshot, SessionEvent, SessionStatus,
};

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        interval: Duration::from_millis(40),
        max_attempts: None,
    }
}

pub fn task(id: &str, title: &str, category: TaskCategory, color: &str) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        desc: format!("{title} for one minute"),
        category,
        color: color.to_string(),
    }
}

pub fn sample_tasks() -> Vec<Task> {
    vec![
        task("t1", "Drink a glass of water", TaskCategory::Body, "blue"),
        task("t2", "Three deep breaths", TaskCategory::Care, "green"),
        task("t3", "Clear one desk corner", TaskCategory::Focus, "yellow"),
    ]
}

enum ConnectOutcome {
    Refused,
    Link(DeviceLink),
}

/// Scripted transport: each `connect` consumes the next outcome. The
/// session's side of an accepted link is observable through the returned
/// [`FakeLink`] handles.
pub struct FakeTransport {
    outcomes: Mutex<VecDeque<ConnectOutcome>>,
    connects: Mutex<Vec<String>>,
}

pub struct FakeLink {
    /// Frames "sent by the device"; drop the sender to close the link.
    pub inbound: mpsc::UnboundedSender<Result<String>>,
    /// Frames the session wrote to the device.
    pub outbound: mpsc::UnboundedReceiver<String>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(VecDeque::new()),
            connects: Mutex::new(Vec::new()),
        })
    }

    pub async fn refuse_next(&self) {
        self.outcomes
            .lock()
            .await
            .push_back(ConnectOutcome::Refused);
    }

    pub async fn accept_next(&self) -> FakeLink {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let link = DeviceLink {
            sink: Box::new(FakeSink { tx: outbound_tx }),
            stream: Box::new(FakeStream { rx: inbound_rx }),
        };
        self.outcomes.lock().await.push_back(ConnectOutcome::Link(link));
        FakeLink {
            inbound: inbound_tx,
            outbound: outbound_rx,
        }
    }

    pub async fn connect_count(&self) -> usize {
        self.connects.lock().await.len()
    }

    pub async fn connected_endpoints(&self) -> Vec<String> {
        self.connects.lock().await.clone()
    }
}

#[async_trait]
impl DeviceTransport for FakeTransport {
    async fn connect(&self, endpoint: &str) -> Result<DeviceLink> {
        self.connects.lock().await.push(endpoint.to_string());
        match self.outcomes.lock().await.pop_front() {
            Some(ConnectOutcome::Link(link)) => Ok(link),
            Some(ConnectOutcome::Refused) | None => Err(anyhow!("connection refused")),
        }
    }
}

struct FakeSink {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl FrameSink for FakeSink {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.tx.send(frame).map_err(|_| anyhow!("fake sink closed"))
    }

    async fn close(&mut self) {}
}

struct FakeStream {
    rx: mpsc::UnboundedReceiver<Result<String>>,
}

#[async_trait]
impl FrameStream for FakeStream {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        self.rx.recv().await
    }
}

/// Selection host that records every callback.
pub struct ScriptedHost {
    state: StdMutex<SelectionSnapshot>,
    pub advances: StdMutex<Vec<i64>>,
    pub opened: StdMutex<Vec<String>>,
    pub completions: AtomicUsize,
}

impl ScriptedHost {
    pub fn new(tasks: Vec<Task>) -> Arc<Self> {
        Arc::new(Self {
            state: StdMutex::new(SelectionSnapshot {
                tasks,
                index: 0,
                detail_open: false,
            }),
            advances: StdMutex::new(Vec::new()),
            opened: StdMutex::new(Vec::new()),
            completions: AtomicUsize::new(0),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn set_index(&self, index: usize) {
        self.state.lock().expect("state lock").index = index;
    }

    pub fn index(&self) -> usize {
        self.state.lock().expect("state lock").index
    }

    pub fn detail_open(&self) -> bool {
        self.state.lock().expect("state lock").detail_open
    }

    pub fn advance_calls(&self) -> Vec<i64> {
        self.advances.lock().expect("advances lock").clone()
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SelectionHost for ScriptedHost {
    fn snapshot(&self) -> SelectionSnapshot {
        self.state.lock().expect("state lock").clone()
    }

    async fn advance(&self, step: i64) -> Option<Task> {
        let task = {
            let mut state = self.state.lock().expect("state lock");
            if state.tasks.is_empty() {
                return None;
            }
            let len = state.tasks.len() as i64;
            state.index = (state.index as i64 + step).rem_euclid(len) as usize;
            state.tasks[state.index].clone()
        };
        self.advances.lock().expect("advances lock").push(step);
        Some(task)
    }

    async fn open_detail(&self) -> Option<Task> {
        let task = {
            let mut state = self.state.lock().expect("state lock");
            let task = state.tasks.get(state.index).cloned()?;
            state.detail_open = true;
            task
        };
        self.opened
            .lock()
            .expect("opened lock")
            .push(task.title.clone());
        Some(task)
    }

    async fn complete(&self) {
        self.completions.fetch_add(1, Ordering::SeqCst);
        self.state.lock().expect("state lock").detail_open = false;
    }
}

pub struct RecordingAnnouncer {
    lines: StdMutex<Vec<String>>,
}

impl RecordingAnnouncer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            lines: StdMutex::new(Vec::new()),
        })
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("lines lock").clone()
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce(&self, text: &str) {
        self.lines.lock().expect("lines lock").push(text.to_string());
    }
}

pub async fn wait_for_status(
    events: &mut broadcast::Receiver<SessionEvent>,
    want: SessionStatus,
) {
    timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::StatusChanged(status)) if status == want => break,
                Ok(_) => {}
                Err(err) => panic!("session event stream closed: {err}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for status {want:?}"));
}

pub async fn next_outbound(link: &mut FakeLink) -> String {
    timeout(Duration::from_secs(2), link.outbound.recv())
        .await
        .expect("timed out waiting for outbound frame")
        .expect("device link closed")
}
