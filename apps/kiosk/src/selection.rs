use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::{info, warn};

use device_session::{
    Announcer, CommandDispatcher, DeviceSession, SelectionHost, SelectionSnapshot,
};
use shared::domain::{Task, VibratePattern};
use shared::protocol::{CompletionRecord, RecommendRequest, RecommendResponse};

/// Announcement seam. The kiosk build routes spoken lines to the log; a
/// real TTS engine slots in behind the same trait.
pub struct SpeechLog;

impl Announcer for SpeechLog {
    fn announce(&self, text: &str) {
        info!(speech = text, "announce");
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

/// Owns the task selection and answers the device session's callbacks.
/// Holds the session weakly; the session owns the host.
pub struct KioskHost {
    http: reqwest::Client,
    server_url: String,
    mood: i32,
    energy: i32,
    state: Mutex<SelectionSnapshot>,
    session: OnceLock<Weak<DeviceSession>>,
}

impl KioskHost {
    pub fn new(server_url: String, mood: i32, energy: i32) -> Arc<Self> {
        Arc::new(Self {
            http: reqwest::Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
            mood,
            energy,
            state: Mutex::new(SelectionSnapshot::default()),
            session: OnceLock::new(),
        })
    }

    pub fn attach_session(&self, session: &Arc<DeviceSession>) {
        let _ = self.session.set(Arc::downgrade(session));
    }

    fn dispatcher(&self) -> Option<CommandDispatcher> {
        self.session
            .get()
            .and_then(Weak::upgrade)
            .map(CommandDispatcher::new)
    }

    pub fn set_tasks(&self, tasks: Vec<Task>) {
        let mut state = self.state.lock().expect("selection state");
        state.tasks = tasks;
        state.index = 0;
        state.detail_open = false;
    }

    pub async fn fetch_recommendations(&self, time_of_day: &str, place: &str) -> anyhow::Result<()> {
        let request = RecommendRequest {
            mood: self.mood,
            energy: self.energy,
            time_of_day: Some(time_of_day.to_string()),
            place: Some(place.to_string()),
        };
        let response: RecommendResponse = self
            .http
            .post(format!("{}/api/recommend", self.server_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!(
            count = response.tasks.len(),
            source = ?response.source,
            "fetched recommendations"
        );
        self.set_tasks(response.tasks);
        Ok(())
    }
}

#[async_trait]
impl SelectionHost for KioskHost {
    fn snapshot(&self) -> SelectionSnapshot {
        self.state.lock().expect("selection state").clone()
    }

    async fn advance(&self, step: i64) -> Option<Task> {
        let task = {
            let mut state = self.state.lock().expect("selection state");
            if state.tasks.is_empty() {
                return None;
            }
            let len = state.tasks.len() as i64;
            state.index = (state.index as i64 + step).rem_euclid(len) as usize;
            state.tasks[state.index].clone()
        };
        if let Some(dispatcher) = self.dispatcher() {
            dispatcher.push_task(&task).await;
        }
        Some(task)
    }

    async fn open_detail(&self) -> Option<Task> {
        let task = {
            let mut state = self.state.lock().expect("selection state");
            let task = state.tasks.get(state.index).cloned()?;
            state.detail_open = true;
            task
        };
        if let Some(dispatcher) = self.dispatcher() {
            dispatcher.push_task(&task).await;
        }
        Some(task)
    }

    async fn complete(&self) {
        let task = {
            let mut state = self.state.lock().expect("selection state");
            state.detail_open = false;
            state.tasks.get(state.index).cloned()
        };
        let Some(task) = task else {
            return;
        };

        let record = CompletionRecord {
            title: task.title.clone(),
            ts: now_ms(),
            mood: Some(self.mood),
            energy: Some(self.energy),
            category: Some(task.category),
        };
        let http = self.http.clone();
        let url = format!("{}/api/log", self.server_url);
        tokio::spawn(async move {
            if let Err(err) = http.post(url).json(&record).send().await {
                warn!(error = %err, "failed to log completion");
            }
        });

        if let Some(dispatcher) = self.dispatcher() {
            dispatcher.vibrate(VibratePattern::Long).await;
        }
        info!(title = %task.title, "task completed");
    }
}
