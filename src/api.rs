use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::SecondsFormat;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

use crate::config::TriageConfig;
use crate::engine::TriageEngine;
use crate::random::ThreadRandom;
use crate::scheduler::TokioScheduler;
use crate::session::{session_key, Message, Session};
use crate::store::{CrisisEvent, InMemoryMessageLog, MessageLog};
use crate::telemetry::fingerprint;
use crate::timeline::Timeline;

const MESSAGE_REQUIRED: &str = "Message is required";
const INTERNAL_ERROR: &str = "Internal server error";

#[derive(Clone)]
pub struct AppState {
    timeline: Timeline,
    history: Option<Arc<dyn MessageLog>>,
}

impl AppState {
    /// Stateless: every call is its own one-shot session.
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            history: None,
        }
    }

    /// Persist each exchange to `log` and enable the history route.
    pub fn with_history(mut self, log: Arc<dyn MessageLog>) -> Self {
        self.history = Some(log);
        self
    }

    pub fn from_config(cfg: &TriageConfig) -> anyhow::Result<Self> {
        let policy = cfg.load_policy()?;
        let engine = Arc::new(TriageEngine::new(policy, Arc::new(ThreadRandom)));
        let timeline = Timeline::new(engine, Arc::new(TokioScheduler), cfg.api_pacing());
        let state = Self::new(timeline);
        Ok(if cfg.keep_history {
            state.with_history(Arc::new(InMemoryMessageLog::new()))
        } else {
            state
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/chat", post(chat))
        .route("/api/chat/history", get(chat_history))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct ChatReq {
    #[serde(default)]
    message: Option<Value>,
    #[serde(default, rename = "userId")]
    user_id: Option<Value>,
}

#[derive(serde::Serialize)]
struct ChatResp {
    success: bool,
    response: String,
    #[serde(rename = "isCrisis")]
    is_crisis: bool,
    timestamp: String,
}

#[derive(serde::Deserialize)]
struct HistoryQuery {
    #[serde(default, rename = "userId")]
    user_id: Option<String>,
}

#[derive(serde::Serialize)]
struct HistoryResp {
    success: bool,
    messages: Vec<Message>,
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

// userId may arrive as a string or a number; anything else counts as absent
fn user_id_of(raw: Option<&Value>) -> Option<String> {
    match raw? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatReq>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            debug!(target: "api", error = %rejection, "chat body rejected");
            return error_json(StatusCode::BAD_REQUEST, MESSAGE_REQUIRED);
        }
    };

    let Some(text) = req
        .message
        .as_ref()
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
    else {
        return error_json(StatusCode::BAD_REQUEST, MESSAGE_REQUIRED);
    };

    let user_id = user_id_of(req.user_id.as_ref());
    let key = session_key(user_id.as_deref());
    let session = Arc::new(Session::new(key.clone()));

    let (user, bot) = match state.timeline.exchange(&session, text).await {
        Ok(pair) => pair,
        Err(e) if e.is_client_error() => {
            return error_json(StatusCode::BAD_REQUEST, MESSAGE_REQUIRED);
        }
        Err(e) => {
            error!(target: "api", error = %e, "chat exchange failed");
            return error_json(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
        }
    };

    // The reply still goes out if history persistence fails.
    if let Some(log) = &state.history {
        for m in [&user, &bot] {
            if let Err(e) = log.append(&key, m).await {
                error!(target: "api", error = %e, message_id = %m.id, "history append failed");
            }
        }
        if bot.is_crisis() {
            let event = CrisisEvent::escalated(&key, &user, &bot);
            if let Err(e) = log.record_crisis(&event).await {
                error!(target: "api", error = %e, message_id = %user.id, "crisis record failed");
            }
        }
    }

    let is_crisis = bot.is_crisis();
    info!(
        target: "api",
        user = %fingerprint(&key),
        is_crisis,
        "chat reply sent"
    );

    Json(ChatResp {
        success: true,
        response: bot.body,
        is_crisis,
        timestamp: bot.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
    .into_response()
}

async fn chat_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Response {
    let Some(log) = &state.history else {
        return error_json(StatusCode::NOT_FOUND, "History is disabled");
    };

    let key = session_key(q.user_id.as_deref());
    match log.list(&key).await {
        Ok(messages) => Json(HistoryResp {
            success: true,
            messages,
        })
        .into_response(),
        Err(e) => {
            error!(target: "api", error = %e, "history read failed");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
    }
}
