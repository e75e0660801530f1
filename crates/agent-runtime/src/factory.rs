//! Agent Factory
//!
//! Builds a fresh Groq-backed ReAct agent for every submit, bound to the
//! caller's credential and the shared tool registry.

use std::sync::Arc;

use agent_core::{
    credential::Credential,
    error::Result,
    reasoning::{AgentConfig, AgentFactory, ReactAgent, ReasoningAgent},
    tool::ToolRegistry,
};

use crate::groq::{GroqConfig, GroqProvider};

/// Creates [`ReactAgent`]s that talk to Groq with streaming enabled.
/// All built agents share one pooled HTTP client.
pub struct GroqAgentFactory {
    http: reqwest::Client,
    config: GroqConfig,
    tools: Arc<ToolRegistry>,
    agent: AgentConfig,
}

impl GroqAgentFactory {
    /// Factory for the default model with streaming on
    pub fn new(config: GroqConfig, tools: Arc<ToolRegistry>) -> Result<Self> {
        let mut agent = AgentConfig::default();
        agent.generation.stream = true;

        Self::with_agent_config(config, tools, agent)
    }

    pub fn with_agent_config(
        config: GroqConfig,
        tools: Arc<ToolRegistry>,
        agent: AgentConfig,
    ) -> Result<Self> {
        Ok(Self {
            http: config.http_client()?,
            config,
            tools,
            agent,
        })
    }

    /// Model every built agent uses
    pub fn model(&self) -> &str {
        &self.agent.generation.model
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}

impl AgentFactory for GroqAgentFactory {
    fn build(&self, credential: &Credential) -> Result<Box<dyn ReasoningAgent>> {
        let provider =
            GroqProvider::with_client(self.http.clone(), self.config.clone(), credential.clone());

        Ok(Box::new(ReactAgent::new(
            Arc::new(provider),
            self.tools.clone(),
            self.agent.clone(),
        )))
    }
}
