//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Maximum iterations reached in reasoning loop
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Model output could not be parsed into an action or a final answer
    #[error("Parse error: {0}")]
    Parse(String),

    /// Submitted text was empty
    #[error("Empty input")]
    EmptyInput,

    /// A submit is already in flight for this session
    #[error("Session busy: {0}")]
    SessionBusy(String),

    /// No session with this ID
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Credential rejected by the model endpoint
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

/// Coarse failure classes surfaced to the UI layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The credential was rejected
    Authentication,
    /// The agent failed while reasoning or calling a tool
    AgentExecution,
    /// The caller misused the session (raised before dispatch)
    Session,
}

impl AgentError {
    /// Classify the error
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Auth(_) => FailureKind::Authentication,
            Self::EmptyInput | Self::SessionBusy(_) | Self::SessionNotFound(_) => {
                FailureKind::Session
            }
            _ => FailureKind::AgentExecution,
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::MaxIterations(_) => "The request took too long to process. Please try a simpler query.".into(),
            Self::Parse(msg) => format!("Could not understand the model's reply: {msg}"),
            Self::EmptyInput => "Please enter a question.".into(),
            Self::SessionBusy(_) => "Still working on your previous question.".into(),
            Self::SessionNotFound(_) => "This chat session has ended. Please start a new one.".into(),
            Self::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            Self::Auth(_) => "Authentication failed. Please check your API key.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        assert_eq!(AgentError::Auth("401".into()).kind(), FailureKind::Authentication);
        assert_eq!(AgentError::Parse("junk".into()).kind(), FailureKind::AgentExecution);
        assert_eq!(AgentError::ToolExecution("boom".into()).kind(), FailureKind::AgentExecution);
        assert_eq!(AgentError::EmptyInput.kind(), FailureKind::Session);
    }
}
