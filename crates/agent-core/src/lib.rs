//! # agent-core
//!
//! Chat session loop with a provider-agnostic ReAct agent and an ordered
//! tool system.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ ChatSession  (transcript, one submit at a time)              │
//! │      │ AgentFactory::build(credential)                       │
//! │      ▼                                                       │
//! │  ┌─────────────┐  ┌──────────────┐  ┌─────────────────────┐  │
//! │  │ ReactAgent  │──│ ToolRegistry │  │ LlmProvider         │  │
//! │  │  (ReAct)    │──│  (ordered)   │  │  (Strategy)         │  │
//! │  └─────────────┘  └──────────────┘  └─────────────────────┘  │
//! │      │ TraceSink ──▶ TraceStream (UI)                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session never touches a concrete agent or provider: both are injected
//! through [`AgentFactory`] and [`LlmProvider`].

pub mod credential;
pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod tool;
pub mod trace;
pub mod transcript;

pub use credential::Credential;
pub use error::{AgentError, FailureKind, Result};
pub use message::{Message, Role};
pub use provider::LlmProvider;
pub use reasoning::{AgentBuilder, AgentConfig, AgentFactory, ReactAgent, ReasoningAgent};
pub use session::{
    ChatSession, ContextPolicy, MemorySessionStore, Reply, SessionConfig, SessionHandle,
    SessionId, SessionStore,
};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
pub use trace::{TraceEvent, TraceSink, TraceStream};
pub use transcript::{Speaker, Transcript, Turn};
