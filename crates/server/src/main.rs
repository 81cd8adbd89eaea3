use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use recommend::{fallback_tasks, DeepSeekClient, Recommender};
use serde::{Deserialize, Serialize};
use shared::error::{ApiError, ErrorCode};
use shared::protocol::{
    CompletionRecord, HistoryEntry, RecommendRequest, RecommendResponse, TaskSource,
};
use storage::Storage;
use tokio::sync::broadcast;
use tracing::{info, warn};

mod config;

use config::load_settings;

struct AppState {
    storage: Storage,
    recommender: Option<Arc<dyn Recommender>>,
    relay: broadcast::Sender<RelayFrame>,
    next_peer_id: AtomicU64,
}

/// One text frame on the device bridge, tagged with the peer that sent it
/// so the relay never echoes a frame back to its source.
#[derive(Debug, Clone)]
struct RelayFrame {
    from: u64,
    text: String,
}

impl AppState {
    fn new(storage: Storage, recommender: Option<Arc<dyn Recommender>>) -> Arc<Self> {
        let (relay, _) = broadcast::channel(256);
        Arc::new(Self {
            storage,
            recommender,
            relay,
            next_peer_id: AtomicU64::new(1),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let storage = Storage::new(&settings.database_url).await?;

    let recommender: Option<Arc<dyn Recommender>> = settings.deepseek_api_key.as_ref().map(|key| {
        Arc::new(DeepSeekClient::new(
            settings.deepseek_base_url.clone(),
            key.clone(),
            settings.deepseek_model.clone(),
        )) as Arc<dyn Recommender>
    });
    if recommender.is_none() {
        warn!("no DeepSeek API key configured, serving fallback tasks only");
    }

    let state = AppState::new(storage, recommender);
    let addr: SocketAddr = settings.server_bind.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "task recommender listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/recommend", post(http_recommend))
        .route("/api/log", post(http_log_completion))
        .route("/api/history", get(http_history).delete(http_clear_history))
        .route("/api/recent", delete(http_clear_recent))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

fn bad_request(message: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new(ErrorCode::Validation, message)),
    )
}

fn internal(err: anyhow::Error) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::new(ErrorCode::Internal, err.to_string())),
    )
}

async fn http_recommend(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, (StatusCode, Json<ApiError>)> {
    if !(-2..=2).contains(&request.mood) {
        return Err(bad_request("mood must be between -2 and 2"));
    }
    if !(1..=5).contains(&request.energy) {
        return Err(bad_request("energy must be between 1 and 5"));
    }

    let response = match &state.recommender {
        Some(recommender) => match recommender.recommend(&request).await {
            Ok(tasks) => RecommendResponse {
                tasks,
                source: TaskSource::Deepseek,
            },
            Err(err) => {
                warn!(error = %err, "recommendation upstream failed, serving fallback");
                fallback_response(&state, &request).await
            }
        },
        None => fallback_response(&state, &request).await,
    };

    for task in &response.tasks {
        if let Err(err) = state.storage.record_shown(&task.title).await {
            warn!(error = %err, title = %task.title, "failed to record shown title");
        }
    }

    Ok(Json(response))
}

async fn fallback_response(state: &AppState, request: &RecommendRequest) -> RecommendResponse {
    let recent = match state.storage.recent_titles().await {
        Ok(recent) => recent,
        Err(err) => {
            warn!(error = %err, "failed to load recent titles");
            Vec::new()
        }
    };
    RecommendResponse {
        tasks: fallback_tasks(request.time_of_day.as_deref(), &recent),
        source: TaskSource::Fallback,
    }
}

#[derive(Debug, Serialize)]
struct LogResponse {
    ok: bool,
    echo: CompletionRecord,
}

/// Completion logging is fire-and-forget for callers: only validation
/// problems surface; persistence trouble is logged here.
async fn http_log_completion(
    State(state): State<Arc<AppState>>,
    Json(record): Json<CompletionRecord>,
) -> Result<Json<LogResponse>, (StatusCode, Json<ApiError>)> {
    if record.title.trim().is_empty() {
        return Err(bad_request("title must not be empty"));
    }

    if let Err(err) = state.storage.record_completion(&record).await {
        warn!(error = %err, title = %record.title, "failed to persist completion");
    }

    Ok(Json(LogResponse {
        ok: true,
        echo: record,
    }))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    limit: u32,
}

fn default_history_limit() -> u32 {
    50
}

async fn http_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, (StatusCode, Json<ApiError>)> {
    state
        .storage
        .history(query.limit)
        .await
        .map(Json)
        .map_err(internal)
}

async fn http_clear_history(
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    state.storage.clear_history().await.map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_clear_recent(
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    state.storage.clear_recent().await.map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| relay_connection(state, socket))
}

/// Frame relay between the application and the device: every text frame
/// from one attached peer goes to all other peers. Binary frames and
/// per-peer hiccups are ignored; the bridge itself never closes.
async fn relay_connection(state: Arc<AppState>, socket: WebSocket) {
    let peer_id = state.next_peer_id.fetch_add(1, Ordering::Relaxed);
    let (mut sender, mut receiver) = socket.split();
    let mut relay_rx = state.relay.subscribe();

    info!(peer_id, "relay peer attached");

    let forward_task = tokio::spawn(async move {
        while let Ok(frame) = relay_rx.recv().await {
            if frame.from == peer_id {
                continue;
            }
            if sender.send(Message::Text(frame.text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => {
                let _ = state.relay.send(RelayFrame {
                    from: peer_id,
                    text,
                });
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    forward_task.abort();
    info!(peer_id, "relay peer detached");
}
