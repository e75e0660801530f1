//! Session Management
//!
//! A [`ChatSession`] owns one transcript and mediates each request/response
//! cycle with a reasoning agent. Sessions live in memory only; the server
//! keeps them in a [`MemorySessionStore`] keyed by [`SessionId`].

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use uuid::Uuid;

use crate::credential::Credential;
use crate::error::{AgentError, Result};
use crate::reasoning::AgentFactory;
use crate::trace::{self, TraceEvent, TraceSink};
use crate::transcript::{Transcript, Turn};

/// Greeting every new transcript starts with
pub const DEFAULT_GREETING: &str = "Hi! Ask me anything related to AI, research, or current topics.";

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the agent is given as its task
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextPolicy {
    /// Only the latest user text; the agent has no memory of earlier turns
    #[default]
    LatestTurn,
    /// The prior transcript followed by the latest user text
    FullTranscript,
}

impl std::str::FromStr for ContextPolicy {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" | "latest_turn" => Ok(Self::LatestTurn),
            "full" | "full_transcript" => Ok(Self::FullTranscript),
            other => Err(AgentError::Config(format!("unknown context policy '{other}'"))),
        }
    }
}

/// Default idle time after which the server drops a session
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Per-session settings
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub greeting: String,
    pub context: ContextPolicy,
    /// How long a session may sit untouched before it is expired.
    /// `None` keeps sessions until they are deleted.
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.into(),
            context: ContextPolicy::default(),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
        }
    }
}

impl SessionConfig {
    /// Read `SESSION_CONTEXT` (`latest` | `full`) and `SESSION_IDLE_SECS`
    /// (`0` disables expiry). Invalid values are logged and the default kept.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let context = setting_or(
            "SESSION_CONTEXT",
            std::env::var("SESSION_CONTEXT").ok().as_deref(),
            defaults.context,
        );
        let idle_secs = setting_or(
            "SESSION_IDLE_SECS",
            std::env::var("SESSION_IDLE_SECS").ok().as_deref(),
            DEFAULT_IDLE_TIMEOUT.as_secs(),
        );

        Self {
            context,
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            ..defaults
        }
    }
}

/// Parse a raw setting, warning and falling back to `default` when it is malformed
fn setting_or<T>(name: &str, raw: Option<&str>, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(setting = name, value = %raw, error = %e, fallback = ?default, "ignoring invalid setting");
            default
        }
    }
}

/// Where a session is in its request cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Dispatched,
}

/// Holds a session in [`Phase::Dispatched`] and returns it to
/// [`Phase::Idle`] when dropped, including when the submit future is
/// cancelled mid-await.
struct DispatchGuard<'a>(&'a mut Phase);

impl<'a> DispatchGuard<'a> {
    fn enter(phase: &'a mut Phase) -> Self {
        *phase = Phase::Dispatched;
        Self(phase)
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        *self.0 = Phase::Idle;
    }
}

/// A successful submit
#[derive(Clone, Debug, Serialize)]
pub struct Reply {
    pub answer: String,
    pub trace: Vec<TraceEvent>,
}

/// One chat session: the transcript plus the agent factory it asks
pub struct ChatSession {
    id: SessionId,
    transcript: Transcript,
    factory: Arc<dyn AgentFactory>,
    config: SessionConfig,
    phase: Phase,
    updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("turns", &self.transcript.len())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    /// Start a session whose transcript holds only the greeting.
    ///
    /// This is the only way to obtain a session, so a transcript is seeded
    /// exactly once and never reset.
    pub fn initialize(factory: Arc<dyn AgentFactory>, config: SessionConfig) -> Self {
        let session = Self {
            id: SessionId::new(),
            transcript: Transcript::seeded(config.greeting.clone()),
            factory,
            config,
            phase: Phase::Idle,
            updated_at: Utc::now(),
        };
        tracing::info!(session = %session.id, "session initialized");
        session
    }

    /// Submit one user turn and collect the trace once the agent is done.
    pub async fn submit(&mut self, user_text: &str, credential: &Credential) -> Result<Reply> {
        let (sink, mut stream) = trace::channel();
        let answer = self.submit_streaming(user_text, credential, sink).await?;

        Ok(Reply {
            answer,
            trace: stream.drain(),
        })
    }

    /// Submit one user turn, sending intermediate events to `trace` as they
    /// happen.
    ///
    /// The user turn is appended before the agent is asked. The assistant
    /// turn is appended only on success; on failure the transcript keeps the
    /// user turn and the error is returned.
    pub async fn submit_streaming(
        &mut self,
        user_text: &str,
        credential: &Credential,
        trace: TraceSink,
    ) -> Result<String> {
        if user_text.trim().is_empty() {
            return Err(AgentError::EmptyInput);
        }

        let task = self.task_for(user_text);
        self.transcript.push(Turn::user(user_text));
        self.touch();

        let outcome = {
            let _dispatched = DispatchGuard::enter(&mut self.phase);
            tracing::debug!(session = %self.id, turns = self.transcript.len(), "dispatching to agent");
            dispatch(self.factory.as_ref(), &task, credential, &trace).await
        };

        match outcome {
            Ok(answer) => {
                self.transcript.push(Turn::assistant(answer.clone()));
                self.touch();
                tracing::info!(session = %self.id, turns = self.transcript.len(), "turn answered");
                Ok(answer)
            }
            Err(e) => {
                tracing::warn!(session = %self.id, kind = ?e.kind(), error = %e, "turn failed");
                Err(e)
            }
        }
    }

    /// The agent task for `user_text` under the configured context policy.
    /// Called before the user turn is appended.
    fn task_for(&self, user_text: &str) -> String {
        match self.config.context {
            ContextPolicy::LatestTurn => user_text.to_string(),
            ContextPolicy::FullTranscript => format!(
                "Previous conversation:\n{}\n\nCurrent question: {user_text}",
                self.transcript.render()
            ),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

async fn dispatch(
    factory: &dyn AgentFactory,
    task: &str,
    credential: &Credential,
    trace: &TraceSink,
) -> Result<String> {
    let agent = factory.build(credential)?;
    agent.run(task, trace).await
}

/// Shared handle to one session. The mutex makes the transcript
/// single-writer across requests.
pub type SessionHandle = Arc<tokio::sync::Mutex<ChatSession>>;

/// Session store trait
pub trait SessionStore: Send + Sync {
    /// Add a session and return its handle
    fn insert(&self, session: ChatSession) -> SessionHandle;

    /// Look a session up by ID
    fn get(&self, id: &SessionId) -> Result<SessionHandle>;

    /// End a session, dropping its transcript
    fn remove(&self, id: &SessionId) -> Result<()>;

    /// Number of live sessions
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory session store
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize a new session and store it
    pub fn create(
        &self,
        factory: Arc<dyn AgentFactory>,
        config: SessionConfig,
    ) -> (SessionId, SessionHandle) {
        let session = ChatSession::initialize(factory, config);
        let id = session.id().clone();
        (id, self.insert(session))
    }

    /// Drop every session untouched for longer than `max_idle` and return
    /// how many went. Sessions with a submit in flight are kept.
    pub fn expire_idle(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = TimeDelta::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return 0;
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|id, handle| {
            let expired = handle
                .try_lock()
                .is_ok_and(|session| session.updated_at() < cutoff);
            if expired {
                tracing::info!(session = %id, "session expired after idling");
            }
            !expired
        });
        before - sessions.len()
    }
}

impl SessionStore for MemorySessionStore {
    fn insert(&self, session: ChatSession) -> SessionHandle {
        let id = session.id().clone();
        let handle = Arc::new(tokio::sync::Mutex::new(session));
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, handle.clone());
        handle
    }

    fn get(&self, id: &SessionId) -> Result<SessionHandle> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))
    }

    fn remove(&self, id: &SessionId) -> Result<()> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);

        match removed {
            Some(_) => {
                tracing::info!(session = %id, "session ended");
                Ok(())
            }
            None => Err(AgentError::SessionNotFound(id.to_string())),
        }
    }

    fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
