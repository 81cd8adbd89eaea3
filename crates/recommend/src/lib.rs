//! Recommendation upstream: a DeepSeek-compatible chat-completions client
//! that shapes the model's JSON into exactly three sanitized tasks, plus
//! the offline fallback pool used whenever the upstream cannot deliver.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared::domain::Task;
use shared::protocol::RecommendRequest;

pub mod fallback;
pub mod sanitize;

pub use fallback::fallback_tasks;

pub const RECOMMENDED_TASK_COUNT: usize = 3;
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("recommendation upstream returned status {0}")]
    UpstreamStatus(u16),
    #[error("recommendation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream response carried no content")]
    EmptyChoice,
    #[error("upstream content was not valid JSON: {0}")]
    NonJsonContent(#[source] serde_json::Error),
    #[error("upstream content had no usable tasks")]
    BadShape,
    #[error("task {index} missing required fields")]
    MissingFields { index: usize },
}

#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(&self, request: &RecommendRequest) -> Result<Vec<Task>, RecommendError>;
}

pub struct DeepSeekClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl DeepSeekClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

const SYSTEM_PROMPT: &str = r#"You recommend tiny wellbeing micro-tasks that take about one minute each.
Reply with strict JSON only, shaped exactly like:
{"tasks":[{"id":"string","title":"string","type":"body|care|focus","color":"blue|green|yellow","desc":"string"}, ...]}
Rules: exactly 3 tasks, titles under 24 characters, descriptions one or two
concrete sentences, and every task immediately doable with no equipment."#;

fn user_prompt(request: &RecommendRequest) -> String {
    format!(
        "Current state:\n\
         - mood: {} (-2 awful, 0 neutral, +2 great)\n\
         - energy: {}/5\n\
         - time of day: {}\n\
         - place: {}\n\
         Pick 3 micro-tasks that fit this state.",
        request.mood,
        request.energy,
        request.time_of_day.as_deref().unwrap_or("unspecified"),
        request
            .place
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or("unspecified"),
    )
}

#[async_trait]
impl Recommender for DeepSeekClient {
    async fn recommend(&self, request: &RecommendRequest) -> Result<Vec<Task>, RecommendError> {
        let payload = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(request),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            max_tokens: 800,
            temperature: 0.7,
        };

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(UPSTREAM_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RecommendError::UpstreamStatus(response.status().as_u16()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(RecommendError::EmptyChoice)?;

        let parsed: sanitize::RawTaskList =
            serde_json::from_str(&content).map_err(RecommendError::NonJsonContent)?;
        if parsed.tasks.is_empty() {
            return Err(RecommendError::BadShape);
        }
        sanitize::sanitize_tasks(parsed.tasks)
    }
}
