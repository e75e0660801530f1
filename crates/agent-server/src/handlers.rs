//! HTTP/WebSocket Handlers

use axum::{
    Json,
    extract::{Path, State, WebSocketUpgrade, ws::Message},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use agent_core::{
    AgentError, ChatSession, Credential, FailureKind, SessionHandle, SessionId, SessionStore,
    TraceEvent, Turn, session::Phase, trace,
};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub tools: Vec<String>,
    pub sessions: usize,
}

/// A user message plus the caller's Groq key.
///
/// No `Debug` impl, since it carries the API key.
#[derive(Deserialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(default)]
    pub api_key: String,
}

impl MessageRequest {
    fn credential(&self) -> Credential {
        Credential::from(self.api_key.as_str())
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: SessionId,
    pub phase: Phase,
    pub transcript: Vec<Turn>,
}

impl SessionResponse {
    fn of(session: &ChatSession) -> Self {
        Self {
            session_id: session.id().clone(),
            phase: session.phase(),
            transcript: session.transcript().turns().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub answer: String,
    pub trace: Vec<TraceEvent>,
    pub transcript: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Frames sent on the streaming socket
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamFrame {
    Trace { event: TraceEvent },
    Answer { answer: String, transcript: Vec<Turn> },
    Error { error: String, code: String },
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Malformed request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Agent(AgentError::SessionNotFound(_)) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
            Self::Agent(AgentError::SessionBusy(_)) => (StatusCode::CONFLICT, "SESSION_BUSY"),
            Self::Agent(AgentError::EmptyInput) => (StatusCode::BAD_REQUEST, "EMPTY_MESSAGE"),
            Self::Agent(e) if e.kind() == FailureKind::Authentication => {
                (StatusCode::UNAUTHORIZED, "AUTHENTICATION_FAILED")
            }
            Self::Agent(_) => (StatusCode::BAD_GATEWAY, "AGENT_ERROR"),
        }
    }

    fn body(&self) -> ErrorResponse {
        let (_, code) = self.status_and_code();
        let error = match self {
            Self::Agent(e) => e.user_message(),
            Self::BadRequest(_) => self.to_string(),
        };
        ErrorResponse {
            error,
            code: code.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, _) = self.status_and_code();
        (status, Json(self.body())).into_response()
    }
}

fn lookup(state: &AppState, id: &str) -> Result<SessionHandle, ApiError> {
    Ok(state.sessions.get(&SessionId::from_string(id))?)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model: state.model.clone(),
        tools: state.tool_names.to_vec(),
        sessions: state.sessions.len(),
    })
}

/// Start a session with a freshly seeded transcript
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionResponse>) {
    let (_, handle) = state
        .sessions
        .create(state.factory.clone(), state.session_config.clone());
    let session = handle.lock().await;

    (StatusCode::CREATED, Json(SessionResponse::of(&session)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let handle = lookup(&state, &id)?;
    let session = handle.lock().await;
    Ok(Json(SessionResponse::of(&session)))
}

/// End a session
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.sessions.remove(&SessionId::from_string(id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Submit one message and wait for the answer
pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let handle = lookup(&state, &id)?;
    let mut session = handle
        .try_lock_owned()
        .map_err(|_| AgentError::SessionBusy(id.clone()))?;

    // The submit runs on its own task so a dropped client cannot cancel it
    // between the user turn and the assistant turn.
    let submit = tokio::spawn(async move {
        let reply = session.submit(&payload.message, &payload.credential()).await?;
        Ok::<_, AgentError>(MessageResponse {
            answer: reply.answer,
            trace: reply.trace,
            transcript: session.transcript().turns().to_vec(),
        })
    });

    let response = submit
        .await
        .map_err(|e| AgentError::Other(format!("submit task failed: {e}")))??;
    Ok(Json(response))
}

/// WebSocket streaming: trace events are forwarded as the agent works
pub async fn stream_session(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let handle = lookup(&state, &id)?;
    Ok(ws.on_upgrade(move |socket| {
        let (sender, receiver) = socket.split();
        handle_stream(sender, receiver, handle, id)
    }))
}

async fn send_frame<S>(sender: &mut S, frame: &StreamFrame) -> bool
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(frame) {
        Ok(text) => sender.send(Message::Text(text.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Frame serialization failed: {}", e);
            false
        }
    }
}

async fn send_error<S>(sender: &mut S, err: &ApiError) -> bool
where
    S: Sink<Message> + Unpin,
{
    let body = err.body();
    send_frame(
        sender,
        &StreamFrame::Error {
            error: body.error,
            code: body.code,
        },
    )
    .await
}

/// Serve one socket: each text frame is a [`MessageRequest`], answered by
/// live trace frames and then one answer or error frame.
pub(crate) async fn handle_stream<S, R>(
    mut sender: S,
    mut receiver: R,
    handle: SessionHandle,
    id: String,
) where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::error!("WebSocket error: {}", e);
                break;
            }
            _ => continue,
        };

        let request: MessageRequest = match serde_json::from_str(text.as_str()) {
            Ok(r) => r,
            Err(e) => {
                if !send_error(&mut sender, &ApiError::BadRequest(e.to_string())).await {
                    break;
                }
                continue;
            }
        };

        let Ok(mut session) = handle.try_lock() else {
            if !send_error(&mut sender, &AgentError::SessionBusy(id.clone()).into()).await {
                break;
            }
            continue;
        };

        let credential = request.credential();
        let (sink, mut events) = trace::channel();
        let mut connected = true;
        let outcome = {
            let submit = session.submit_streaming(&request.message, &credential, sink);
            tokio::pin!(submit);
            loop {
                tokio::select! {
                    outcome = &mut submit => break outcome,
                    Some(event) = events.recv() => {
                        if connected {
                            connected = send_frame(&mut sender, &StreamFrame::Trace { event }).await;
                        }
                    }
                }
            }
        };
        for event in events.drain() {
            if connected {
                connected = send_frame(&mut sender, &StreamFrame::Trace { event }).await;
            }
        }

        let frame = match outcome {
            Ok(answer) => StreamFrame::Answer {
                answer,
                transcript: session.transcript().turns().to_vec(),
            },
            Err(e) => {
                let body = ApiError::from(e).body();
                StreamFrame::Error {
                    error: body.error,
                    code: body.code,
                }
            }
        };
        if !connected || !send_frame(&mut sender, &frame).await {
            break;
        }
    }
}
