use serde::{Deserialize, Serialize};

use crate::domain::{DeviceColor, Task, TaskCategory, VibratePattern};

/// Outbound frame to the companion device, one JSON object per message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum DeviceCommand {
    Color { value: DeviceColor },
    Display { icon: String },
    Vibrate { pattern: VibratePattern },
}

/// Semantic inbound gesture, decoded from a `{"action": ...}` frame.
/// `Unknown` carries the raw payload for logging; it is never acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Wake,
    Next,
    Prev,
    Confirm,
    Unknown(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub mood: i32,
    pub energy: i32,
    #[serde(default, rename = "timeOfDay")]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub place: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskSource {
    Deepseek,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub tasks: Vec<Task>,
    pub source: TaskSource,
}

/// Completion record posted by the application when a task is finished.
/// `ts` is the client-side completion time in milliseconds since epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub title: String,
    pub ts: i64,
    #[serde(default)]
    pub mood: Option<i32>,
    #[serde(default)]
    pub energy: Option<i32>,
    #[serde(default, rename = "type")]
    pub category: Option<TaskCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub title: String,
    pub ts: i64,
    #[serde(default)]
    pub mood: Option<i32>,
    #[serde(default)]
    pub energy: Option<i32>,
    #[serde(default, rename = "type")]
    pub category: Option<TaskCategory>,
}
