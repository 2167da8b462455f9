//! Creative-direction sessions.
//!
//! A session walks through four clarifying questions and one final
//! generation. Each user message is answered by a streamed model reply sent
//! to the client as server-sent events:
//!
//! - `delta`: `{"text": "..."}` for every chunk of model output
//! - `done`: the parsed question/options and the session's new phase
//! - `error`: the turn failed; nothing was persisted
//!
//! The turn (user message + assistant reply) and the phase change are
//! written together once the stream completes. If the client goes away
//! mid-stream the turn is dropped and the phase stays where it was.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use futures::StreamExt;
use logoreel_core::CoreError;
use logoreel_core::direction::{
    BrandBrief, Conversation, MAX_CONVERSATION_MESSAGES, Message, Phase, PhaseKind, parse_response, system_prompt,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, error, info, warn};
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

use crate::clients::auth::AuthUser;
use crate::clients::model::{ModelRequest, TextStream};
use crate::entities::{DirectionSessionRecord, DirectionStore, SessionStatus};
use crate::error::ServerError;
use crate::schemas::v1::direction::{
    CreateDirectionSessionRequest, DirectionMessageResponse, DirectionSessionDetail, DirectionSessionResponse,
    OptionResponse, SendMessageRequest, TurnCompleted,
};
use crate::state::AppState;

/// Buffered SSE events between the model task and the response body.
const EVENT_BUFFER: usize = 32;

#[derive(OpenApi)]
#[openapi(
    paths(create_session, list_sessions, get_session, send_message),
    components(schemas(
        CreateDirectionSessionRequest,
        DirectionSessionResponse,
        DirectionSessionDetail,
        DirectionMessageResponse,
        OptionResponse,
        SendMessageRequest,
        TurnCompleted
    ))
)]
pub struct DirectionApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/direction/sessions", post(create_session).get(list_sessions))
        .route("/direction/sessions/{id}", get(get_session))
        .route("/direction/sessions/{id}/messages", post(send_message))
}

/// Load a session, hiding sessions owned by someone else.
pub(crate) async fn load_owned_session(
    state: &AppState,
    user: &AuthUser,
    id: &str,
) -> Result<DirectionSessionRecord, ServerError> {
    match state.store.get_direction_session(id).await? {
        Some(session) if session.user_id == user.id => Ok(session),
        _ => Err(ServerError::NotFound(format!("direction session {id} not found"))),
    }
}

#[utoipa::path(
    post,
    path = "/v1/direction/sessions",
    tag = "direction",
    security(("bearer" = [])),
    request_body = CreateDirectionSessionRequest,
    responses(
        (status = 200, description = "Session created", body = DirectionSessionResponse),
        (status = 400, description = "Invalid brand details"),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateDirectionSessionRequest>,
) -> Result<Json<DirectionSessionResponse>, ServerError> {
    let req = CreateDirectionSessionRequest {
        brand_name: req.brand_name.trim().to_owned(),
        brand_description: req
            .brand_description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty()),
    };
    req.validate()?;

    let now = Utc::now();
    let session = DirectionSessionRecord {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        brand_name: req.brand_name,
        brand_description: req.brand_description,
        phase: Phase::FIRST.number(),
        status: SessionStatus::Active,
        created_at: now,
        updated_at: now,
    };
    state.store.create_direction_session(&session).await?;
    info!(session_id = %session.id, user_id = %user.id, "direction session created");
    Ok(Json(session.to_response()))
}

#[utoipa::path(
    get,
    path = "/v1/direction/sessions",
    tag = "direction",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller's sessions, newest first", body = Vec<DirectionSessionResponse>),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<DirectionSessionResponse>>, ServerError> {
    let sessions = state.store.list_direction_sessions(&user.id).await?;
    Ok(Json(sessions.iter().map(|s| s.to_response()).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/direction/sessions/{id}",
    tag = "direction",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session with its messages", body = DirectionSessionDetail),
        (status = 404, description = "No such session for this user"),
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DirectionSessionDetail>, ServerError> {
    let session = load_owned_session(&state, &user, &id).await?;
    let messages = state.store.list_direction_messages(&id).await?;
    Ok(Json(DirectionSessionDetail {
        session: session.to_response(),
        messages: messages.iter().map(|m| m.to_response()).collect(),
    }))
}

/// Send the user's answer and stream the assistant's reply.
#[utoipa::path(
    post,
    path = "/v1/direction/sessions/{id}/messages",
    tag = "direction",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Session id")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "SSE stream of `delta`, `done` and `error` events", content_type = "text/event-stream"),
        (status = 400, description = "Invalid message, finished session or full conversation"),
        (status = 404, description = "No such session for this user"),
        (status = 429, description = "Too many AI requests"),
        (status = 503, description = "AI service not configured"),
    )
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Response, ServerError> {
    let content = req.content.trim().to_owned();
    SendMessageRequest {
        content: content.clone(),
        generate_now: req.generate_now,
    }
    .validate()?;

    let decision = state
        .rate_limiter
        .check_limit(
            &user.id,
            state.config.rate_limit_max_requests,
            state.config.rate_limit_window,
        )
        .await;
    if !decision.allowed {
        info!(user_id = %user.id, reset_at = %decision.reset_at, "AI request rate limited");
        return Err(ServerError::RateLimited {
            reset_at: decision.reset_at,
        });
    }

    let session = load_owned_session(&state, &user, &id).await?;
    if session.status == SessionStatus::Complete {
        return Err(ServerError::BadRequest("this session is already complete".into()));
    }

    let started_from = Phase::new(session.phase)?;
    let mut phase = started_from;
    if req.generate_now {
        phase = phase.advance_to(Phase::GENERATION)?;
    }

    let history = state.store.list_direction_messages(&id).await?;
    let mut conversation = Conversation::from_messages(history.iter().map(|m| m.to_message()))?;
    // The reply needs a slot too.
    if conversation.remaining_capacity() < 2 {
        return Err(CoreError::ConversationFull {
            capacity: MAX_CONVERSATION_MESSAGES,
        }
        .into());
    }
    let user_message = Message::user(content);
    conversation.push(user_message.clone())?;

    let brand = BrandBrief {
        name: session.brand_name.clone(),
        description: session.brand_description.clone(),
    };
    let request = ModelRequest {
        settings: phase.settings(&state.config.models),
        system_prompt: system_prompt(phase, &brand),
        messages: conversation.messages().to_vec(),
    };
    debug!(session_id = %id, phase = phase.number(), model = %request.settings.model, "starting turn");
    let stream = state.model.stream(request).await?;

    let (tx, rx) = mpsc::channel::<Event>(EVENT_BUFFER);
    let turn = Turn {
        state: Arc::clone(&state),
        session_id: id,
        started_from,
        phase,
        user_message,
    };
    tokio::spawn(turn.forward(stream, tx).in_current_span());

    let events = ReceiverStream::new(rx).map(Ok::<Event, Infallible>);
    Ok(Sse::new(events).keep_alive(KeepAlive::default()).into_response())
}

fn sse_event(name: &str, payload: serde_json::Value) -> Event {
    Event::default().event(name).data(payload.to_string())
}

/// One in-flight exchange, owned by the forwarding task.
struct Turn {
    state: Arc<AppState>,
    session_id: String,
    /// Stored phase when the turn began; the write is conditional on it.
    started_from: Phase,
    phase: Phase,
    user_message: Message,
}

impl Turn {
    async fn forward(self, mut stream: TextStream, tx: mpsc::Sender<Event>) {
        let mut reply = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(text) => {
                    reply.push_str(&text);
                    if tx.send(sse_event("delta", json!({ "text": text }))).await.is_err() {
                        info!(session_id = %self.session_id, "client disconnected; turn discarded");
                        return;
                    }
                }
                Err(e) => {
                    error!(session_id = %self.session_id, error = %e, "model stream failed");
                    let _ = tx.send(sse_event("error", json!({ "error": "generation failed" }))).await;
                    return;
                }
            }
        }

        if reply.trim().is_empty() {
            warn!(session_id = %self.session_id, "model returned an empty reply");
            let _ = tx.send(sse_event("error", json!({ "error": "empty reply" }))).await;
            return;
        }
        if tx.is_closed() {
            info!(session_id = %self.session_id, "client disconnected; turn discarded");
            return;
        }

        let parsed = parse_response(&reply);
        let (next_phase, status) = match self.phase.next() {
            Some(next) => (next, SessionStatus::Active),
            None => (self.phase, SessionStatus::Complete),
        };
        let assistant = Message::assistant(reply)
            .with_options(parsed.options.clone())
            .with_clarification(self.phase.kind() == PhaseKind::Clarification);

        let recorded = self
            .state
            .store
            .record_direction_turn(
                &self.session_id,
                self.started_from,
                &[self.user_message, assistant],
                next_phase,
                status,
            )
            .await;
        let event = match recorded {
            Ok(true) => {
                info!(session_id = %self.session_id, phase = next_phase.number(), %status, "turn recorded");
                sse_event(
                    "done",
                    json!(TurnCompleted {
                        question: parsed.question,
                        options: parsed.options.as_ref().map(|o| o.iter().map(OptionResponse::from).collect()),
                        phase: next_phase.number(),
                        status: status.to_string(),
                    }),
                )
            }
            Ok(false) => {
                warn!(session_id = %self.session_id, "session moved on during the turn; reply dropped");
                sse_event("error", json!({ "error": "session changed during this reply" }))
            }
            Err(e) => {
                error!(session_id = %self.session_id, error = %e, "failed to record turn");
                sse_event("error", json!({ "error": "failed to save reply" }))
            }
        };
        let _ = tx.send(event).await;
    }
}
