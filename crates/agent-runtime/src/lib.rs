//! # agent-runtime
//!
//! Runtime providers for the search assistant.
//!
//! ## Providers
//!
//! - **Groq** (default): hosted inference over the OpenAI-compatible API
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{GroqAgentFactory, GroqConfig};
//!
//! let factory = Arc::new(GroqAgentFactory::new(GroqConfig::from_env(), tools)?);
//! let mut session = ChatSession::initialize(factory, SessionConfig::default());
//! let reply = session.submit("What is a transformer?", &credential).await?;
//! ```

#[cfg(feature = "groq")]
pub mod factory;
#[cfg(feature = "groq")]
pub mod groq;

#[cfg(feature = "groq")]
pub use factory::GroqAgentFactory;
#[cfg(feature = "groq")]
pub use groq::{GroqConfig, GroqProvider};

// Re-export core types for convenience
pub use agent_core::{
    AgentError, AgentFactory, ChatSession, Credential, LlmProvider, Message, ReasoningAgent,
    Result, Role, SessionConfig, Tool, ToolRegistry,
};
