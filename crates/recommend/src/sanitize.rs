//! Shapes whatever the language model returned into well-formed tasks.
//! A task without an id or title poisons the whole batch (the caller then
//! falls back to the offline pool); everything else is coerced.

use serde::Deserialize;
use serde_json::Value;

use shared::domain::{Task, TaskCategory};

use crate::{RecommendError, RECOMMENDED_TASK_COUNT};

pub const MAX_ID_LEN: usize = 12;
pub const MAX_TITLE_LEN: usize = 24;
pub const MAX_DESC_LEN: usize = 180;

pub const DEFAULT_DESC: &str =
    "Take sixty seconds for one small action and notice how body and breath respond.";

#[derive(Debug, Clone, Deserialize)]
pub struct RawTask {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub category: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawTaskList {
    #[serde(default)]
    pub tasks: Vec<RawTask>,
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn known_category(raw: &str) -> Option<TaskCategory> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "body" => Some(TaskCategory::Body),
        "care" => Some(TaskCategory::Care),
        "focus" => Some(TaskCategory::Focus),
        _ => None,
    }
}

pub fn sanitize_task(raw: &RawTask, index: usize) -> Result<Task, RecommendError> {
    let id = raw
        .id
        .as_ref()
        .and_then(id_string)
        .filter(|id| !id.is_empty())
        .ok_or(RecommendError::MissingFields { index })?;
    let title = raw
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .ok_or(RecommendError::MissingFields { index })?;

    // A recognized category dictates its accent color; otherwise the task
    // is treated as self-care and may keep a canonical color it supplied.
    let (category, color) = match raw.category.as_deref().and_then(known_category) {
        Some(category) => (category, category.color().as_str().to_string()),
        None => {
            let color = raw
                .color
                .as_deref()
                .map(|color| color.trim().to_ascii_lowercase())
                .filter(|color| matches!(color.as_str(), "blue" | "green" | "yellow"))
                .unwrap_or_else(|| "green".to_string());
            (TaskCategory::Care, color)
        }
    };

    let desc = raw
        .desc
        .as_deref()
        .map(str::trim)
        .filter(|desc| !desc.is_empty())
        .map(|desc| truncate(desc, MAX_DESC_LEN))
        .unwrap_or_else(|| DEFAULT_DESC.to_string());

    Ok(Task {
        id: truncate(&id, MAX_ID_LEN),
        title: truncate(title, MAX_TITLE_LEN),
        desc,
        category,
        color,
    })
}

/// Takes at most three tasks, sanitizes each, and backfills generic care
/// tasks so callers always get exactly three.
pub fn sanitize_tasks(raws: Vec<RawTask>) -> Result<Vec<Task>, RecommendError> {
    let mut tasks = raws
        .iter()
        .take(RECOMMENDED_TASK_COUNT)
        .enumerate()
        .map(|(index, raw)| sanitize_task(raw, index))
        .collect::<Result<Vec<_>, _>>()?;

    while tasks.len() < RECOMMENDED_TASK_COUNT {
        tasks.push(Task {
            id: format!("fallback_{}", tasks.len()),
            title: "One small action".to_string(),
            desc: "Pick one small action you can start right away, then take a deep breath."
                .to_string(),
            category: TaskCategory::Care,
            color: "green".to_string(),
        });
    }

    Ok(tasks)
}
