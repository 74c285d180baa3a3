use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::agent::{Conversation, HostedAgent, Role};
use crate::pipeline::{MatchResult, Pipeline};

pub const UI_DIR: &str = "ui";
pub const NO_REPLY_TEXT: &str = "Sorry, I didn't understand that.";
pub const DEFAULT_MAX_CONVERSATIONS: usize = 256;

type SharedConversation = Arc<tokio::sync::Mutex<Conversation>>;

struct Slot {
    conv: SharedConversation,
    last_used: u64,
}

/// Live threads, capped; the least recently used one is evicted first.
struct Conversations {
    slots: HashMap<String, Slot>,
    clock: u64,
    capacity: usize,
}

impl Conversations {
    fn new(capacity: usize) -> Self {
        Self {
            slots: HashMap::new(),
            clock: 0,
            capacity: capacity.max(1),
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn touch(&mut self, id: &str) -> Option<SharedConversation> {
        let now = self.tick();
        let slot = self.slots.get_mut(id)?;
        slot.last_used = now;
        Some(Arc::clone(&slot.conv))
    }

    fn insert(&mut self, id: String, conv: SharedConversation) {
        while self.slots.len() >= self.capacity {
            let Some(oldest) = self
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            self.slots.remove(&oldest);
            tracing::debug!(conversation = %oldest, "conversation evicted");
        }
        let now = self.tick();
        self.slots.insert(id, Slot { conv, last_used: now });
    }
}

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    agent: Arc<HostedAgent>,
    conversations: Arc<Mutex<Conversations>>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, agent: Arc<HostedAgent>) -> Self {
        Self {
            pipeline,
            agent,
            conversations: Arc::new(Mutex::new(Conversations::new(
                DEFAULT_MAX_CONVERSATIONS,
            ))),
        }
    }

    /// Keep at most `capacity` threads alive. Applies from the next insert.
    pub fn with_max_conversations(self, capacity: usize) -> Self {
        self.threads().capacity = capacity.max(1);
        self
    }

    fn threads(&self) -> MutexGuard<'_, Conversations> {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Existing thread for `id`, or a fresh one when the id is absent/unknown.
    fn conversation(&self, id: Option<&str>) -> SharedConversation {
        let mut threads = self.threads();
        if let Some(existing) = id.and_then(|id| threads.touch(id)) {
            return existing;
        }
        let conv = self.agent.start_conversation();
        let key = conv.id().to_string();
        let shared = Arc::new(tokio::sync::Mutex::new(conv));
        threads.insert(key, Arc::clone(&shared));
        shared
    }

    fn lookup(&self, id: &str) -> Option<SharedConversation> {
        self.threads().touch(id)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/fetch", post(fetch))
        .route("/chat", post(chat))
        .route("/chat/{id}/history", get(chat_history))
        .fallback_service(ServeDir::new(UI_DIR))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct FetchReq {
    keywords: Vec<String>,
    #[serde(default)]
    message_limit: Option<usize>,
}

async fn fetch(
    State(state): State<AppState>,
    Json(body): Json<FetchReq>,
) -> Result<Json<MatchResult>, (StatusCode, String)> {
    state
        .pipeline
        .fetch_and_filter(&body.keywords, body.message_limit)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(error = %e, "fetch cycle failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}

#[derive(serde::Deserialize)]
struct ChatReq {
    #[serde(default)]
    conversation_id: Option<String>,
    message: String,
}

#[derive(serde::Serialize)]
struct ChatResp {
    conversation_id: String,
    reply: String,
}

#[derive(serde::Serialize)]
struct ChatErr {
    conversation_id: Option<String>,
    error: String,
}

async fn chat(State(state): State<AppState>, Json(body): Json<ChatReq>) -> Response {
    let text = body.message.trim();
    if text.is_empty() {
        let err = ChatErr {
            conversation_id: body.conversation_id,
            error: "Please enter a prompt.".to_string(),
        };
        return (StatusCode::BAD_REQUEST, Json(err)).into_response();
    }

    let shared = state.conversation(body.conversation_id.as_deref());
    let mut conv = shared.lock().await;
    let conversation_id = conv.id().to_string();

    match state.agent.run_turn(&mut conv, text).await {
        Ok(reply) => Json(ChatResp {
            conversation_id,
            reply: reply.unwrap_or_else(|| NO_REPLY_TEXT.to_string()),
        })
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, conversation = %conversation_id, "agent run failed");
            let err = ChatErr {
                conversation_id: Some(conversation_id),
                error: format!("Run failed: {e}"),
            };
            (StatusCode::BAD_GATEWAY, Json(err)).into_response()
        }
    }
}

#[derive(serde::Serialize)]
struct TurnOut {
    role: &'static str,
    text: String,
}

async fn chat_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TurnOut>>, StatusCode> {
    let shared = state.lookup(&id).ok_or(StatusCode::NOT_FOUND)?;
    let conv = shared.lock().await;
    let out = conv
        .transcript()
        .into_iter()
        .map(|(role, text)| TurnOut {
            role: match role {
                Role::User => "user",
                _ => "agent",
            },
            text,
        })
        .collect();
    Ok(Json(out))
}
