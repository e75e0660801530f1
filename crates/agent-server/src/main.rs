//! search-assistant HTTP Server
//!
//! Axum-based server providing REST API and WebSocket endpoints for chat
//! sessions backed by a Groq-hosted ReAct agent with Wikipedia, DuckDuckGo
//! and arXiv lookup tools.

mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{MemorySessionStore, SessionConfig, SessionStore};
use agent_runtime::{GroqAgentFactory, GroqConfig};
use search_tools::{SearchConfig, ToolSet};

use crate::handlers::{
    create_session, delete_session, get_session, health_check, post_message, stream_session,
};
use crate::state::AppState;

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/messages", post(post_message))
        .route("/api/sessions/{id}/stream", get(stream_session))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically drop sessions idle for longer than `idle_timeout`
fn spawn_idle_sweeper(
    sessions: Arc<MemorySessionStore>,
    idle_timeout: Duration,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let expired = sessions.expire_idle(idle_timeout);
            if expired > 0 {
                tracing::info!(expired, live = sessions.len(), "expired idle sessions");
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let groq = GroqConfig::from_env();
    let search = SearchConfig::from_env();
    let session_config = SessionConfig::from_env();

    let tools = ToolSet::standard(&search)?;
    let registry = Arc::new(tools.registry());
    tracing::info!("Registered {} tools:", registry.len());
    for name in registry.names() {
        tracing::info!("  • {}", name);
    }

    // No key at startup: each message carries the caller's own Groq key
    let factory = GroqAgentFactory::new(groq.clone(), registry.clone())?;
    let model = factory.model().to_string();
    tracing::info!(base_url = %groq.base_url, model = %model, "Groq agent factory ready");

    let state = AppState::new(
        Arc::new(factory),
        session_config.clone(),
        model,
        registry.names(),
    );

    if let Some(idle_timeout) = session_config.idle_timeout {
        let every = idle_timeout.clamp(Duration::from_secs(1), Duration::from_secs(60));
        spawn_idle_sweeper(state.sessions.clone(), idle_timeout, every);
        tracing::info!(idle_secs = idle_timeout.as_secs(), "Idle session expiry enabled");
    }

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("search-assistant server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!(context = ?session_config.context, "Session context policy");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                      - Health check");
    tracing::info!("  POST   /api/sessions                - Start a session");
    tracing::info!("  GET    /api/sessions/{{id}}           - Transcript");
    tracing::info!("  DELETE /api/sessions/{{id}}           - End a session");
    tracing::info!("  POST   /api/sessions/{{id}}/messages  - Ask a question");
    tracing::info!("  GET    /api/sessions/{{id}}/stream    - WebSocket streaming");

    axum::serve(listener, app(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{
        AgentError, AgentFactory, Credential, ReasoningAgent, Result, SessionId, SessionStore,
        TraceEvent, trace::TraceSink,
    };
    use async_trait::async_trait;
    use axum::{
        body::Body,
        extract::ws::Message,
        http::{Method, Request, StatusCode},
    };
    use futures::StreamExt;
    use futures::channel::mpsc;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::handlers::handle_stream;

    struct EchoAgent;

    #[async_trait]
    impl ReasoningAgent for EchoAgent {
        async fn run(&self, task: &str, trace: &TraceSink) -> Result<String> {
            trace.emit(TraceEvent::Thinking { step: 1 });
            match task {
                "fail" => Err(AgentError::ProviderUnavailable("connection refused".into())),
                "slow" => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok("4".into())
                }
                _ => Ok("4".into()),
            }
        }
    }

    struct KeyCheckingFactory;

    impl AgentFactory for KeyCheckingFactory {
        fn build(&self, credential: &Credential) -> Result<Box<dyn ReasoningAgent>> {
            if credential.expose() != "valid-key" {
                return Err(AgentError::Auth("invalid api key".into()));
            }
            Ok(Box::new(EchoAgent))
        }
    }

    fn test_state() -> AppState {
        AppState::new(
            Arc::new(KeyCheckingFactory),
            SessionConfig::default(),
            "Llama3-8b-8192",
            vec!["wikipedia".into(), "duckduckgo_search".into(), "arxiv".into()],
        )
    }

    async fn call(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn new_session(state: &AppState) -> String {
        let (status, body) = call(state, Method::POST, "/api/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["transcript"].as_array().unwrap().len(), 1);
        assert_eq!(body["transcript"][0]["role"], "assistant");
        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_lists_tools_in_order() {
        let state = test_state();
        let (status, body) = call(&state, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"], "Llama3-8b-8192");
        assert_eq!(body["tools"], json!(["wikipedia", "duckduckgo_search", "arxiv"]));
    }

    #[tokio::test]
    async fn test_message_round_trip() {
        let state = test_state();
        let id = new_session(&state).await;

        let (status, body) = call(
            &state,
            Method::POST,
            &format!("/api/sessions/{id}/messages"),
            Some(json!({"message": "What is 2+2?", "api_key": "valid-key"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "4");
        assert_eq!(body["trace"][0]["type"], "thinking");

        let transcript = body["transcript"].as_array().unwrap();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1]["content"], "What is 2+2?");
        assert_eq!(transcript[2]["content"], "4");
    }

    #[tokio::test]
    async fn test_failures_keep_user_turn() {
        let state = test_state();
        let id = new_session(&state).await;
        let uri = format!("/api/sessions/{id}/messages");

        let (status, body) = call(
            &state,
            Method::POST,
            &uri,
            Some(json!({"message": "What is 2+2?", "api_key": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTHENTICATION_FAILED");

        let (status, body) = call(
            &state,
            Method::POST,
            &uri,
            Some(json!({"message": "fail", "api_key": "valid-key"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "AGENT_ERROR");

        let (status, body) = call(&state, Method::POST, &uri, Some(json!({"message": "  ", "api_key": "valid-key"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "EMPTY_MESSAGE");

        let (_, body) = call(&state, Method::GET, &format!("/api/sessions/{id}"), None).await;
        assert_eq!(body["transcript"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_busy_session_is_refused() {
        let state = test_state();
        let id = new_session(&state).await;
        let handle = state.sessions.get(&SessionId::from_string(id.as_str())).unwrap();
        let _guard = handle.lock().await;

        let (status, body) = call(
            &state,
            Method::POST,
            &format!("/api/sessions/{id}/messages"),
            Some(json!({"message": "What is 2+2?", "api_key": "valid-key"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "SESSION_BUSY");
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let state = test_state();
        let id = new_session(&state).await;
        let uri = format!("/api/sessions/{id}");

        let (status, _) = call(&state, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&state, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "SESSION_NOT_FOUND");

        let (status, _) = call(&state, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_request_still_records_answer() {
        let state = test_state();
        let id = new_session(&state).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            call(
                &state,
                Method::POST,
                &format!("/api/sessions/{id}/messages"),
                Some(json!({"message": "slow", "api_key": "valid-key"})),
            ),
        )
        .await;
        assert!(abandoned.is_err());

        let (status, body) = call(&state, Method::GET, &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "idle");
        let transcript = body["transcript"].as_array().unwrap();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1]["content"], "slow");
        assert_eq!(transcript[2]["content"], "4");
    }

    #[tokio::test]
    async fn test_idle_sweeper_expires_sessions() {
        let state = test_state();
        let id = new_session(&state).await;

        let sweeper = spawn_idle_sweeper(
            state.sessions.clone(),
            Duration::from_millis(20),
            Duration::from_millis(10),
        );
        tokio::time::sleep(Duration::from_millis(150)).await;
        sweeper.abort();

        assert!(state.sessions.is_empty());
        let (status, body) = call(&state, Method::GET, &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "SESSION_NOT_FOUND");
    }

    /// Feed `requests` through the socket loop and collect every frame it sends
    async fn stream_frames(state: &AppState, id: &str, requests: Vec<Message>) -> Vec<Value> {
        let handle = state.sessions.get(&SessionId::from_string(id)).unwrap();
        let (client_tx, server_rx) = mpsc::unbounded::<std::result::Result<Message, axum::Error>>();
        let (server_tx, client_rx) = mpsc::unbounded::<Message>();
        for request in requests {
            client_tx.unbounded_send(Ok(request)).unwrap();
        }
        drop(client_tx);

        handle_stream(server_tx, server_rx, handle, id.to_string()).await;

        client_rx
            .map(|frame| match frame {
                Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("unexpected frame: {other:?}"),
            })
            .collect()
            .await
    }

    fn text(value: &Value) -> Message {
        Message::Text(value.to_string().into())
    }

    #[tokio::test]
    async fn test_stream_sends_trace_before_answer() {
        let state = test_state();
        let id = new_session(&state).await;

        let frames = stream_frames(
            &state,
            &id,
            vec![
                text(&json!({"message": "What is 2+2?", "api_key": "valid-key"})),
                text(&json!({"message": "Who wrote Dune?", "api_key": "wrong"})),
                Message::Text("not json".into()),
            ],
        )
        .await;

        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0]["type"], "trace");
        assert_eq!(frames[0]["event"]["type"], "thinking");
        assert_eq!(frames[1]["type"], "answer");
        assert_eq!(frames[1]["answer"], "4");
        assert_eq!(frames[1]["transcript"].as_array().unwrap().len(), 3);
        assert_eq!(frames[2]["type"], "error");
        assert_eq!(frames[2]["code"], "AUTHENTICATION_FAILED");
        assert_eq!(frames[3]["type"], "error");
        assert_eq!(frames[3]["code"], "BAD_REQUEST");

        let (_, body) = call(&state, Method::GET, &format!("/api/sessions/{id}"), None).await;
        let transcript = body["transcript"].as_array().unwrap();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[3]["role"], "user");
        assert_eq!(transcript[3]["content"], "Who wrote Dune?");
    }

    #[tokio::test]
    async fn test_stream_refuses_busy_session_and_stops_on_close() {
        let state = test_state();
        let id = new_session(&state).await;
        let handle = state.sessions.get(&SessionId::from_string(id.as_str())).unwrap();
        let guard = handle.lock().await;

        let request = json!({"message": "What is 2+2?", "api_key": "valid-key"});
        let frames = stream_frames(&state, &id, vec![text(&request), Message::Close(None), text(&request)]).await;
        drop(guard);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "error");
        assert_eq!(frames[0]["code"], "SESSION_BUSY");
        assert_eq!(handle.lock().await.transcript().len(), 1);
    }
}
