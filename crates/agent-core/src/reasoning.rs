//! Reasoning Loop
//!
//! Zero-shot ReAct (Reason + Act) agent. The model is shown the tool list and
//! a fixed Thought/Action/Observation format; each step either names a tool
//! to call or gives the final answer. Every step is reported on the trace
//! sink as it happens.

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use std::sync::{Arc, LazyLock};

use crate::credential::Credential;
use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolRegistry, ToolResult};
use crate::trace::{TraceEvent, TraceSink};

const PREFIX: &str = "Answer the following questions as best you can. You have access to the following tools:";

const FORMAT_INSTRUCTIONS: &str = "Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question";

const SUFFIX: &str = "Begin!

Question: {input}
Thought:{agent_scratchpad}";

const FINAL_ANSWER: &str = "Final Answer:";
const OBSERVATION_STOP: &str = "\nObservation:";

/// Returned in place of an answer when the loop is cut off with
/// [`EarlyStopping::Force`].
pub const STOPPED_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
        .expect("action pattern is valid")
});
static ACTION_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action\s*\d*\s*:").expect("action pattern is valid"));
static ACTION_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Action\s*\d*\s*Input\s*\d*\s*:").expect("action input pattern is valid")
});

/// Something that can answer a task, optionally using tools.
///
/// The session loop only sees this trait; the concrete agent is built per
/// request by an [`AgentFactory`].
#[async_trait]
pub trait ReasoningAgent: Send + Sync {
    /// Work on `task` until a final answer, reporting steps on `trace`
    async fn run(&self, task: &str, trace: &TraceSink) -> Result<String>;
}

/// Builds a reasoning agent bound to one caller credential
pub trait AgentFactory: Send + Sync {
    fn build(&self, credential: &Credential) -> Result<Box<dyn ReasoningAgent>>;
}

/// What to do when the iteration cap is hit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EarlyStopping {
    /// Return [`STOPPED_MESSAGE`] as the answer
    #[default]
    Force,
    /// Fail with [`AgentError::MaxIterations`]
    Error,
}

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum reasoning iterations before giving up
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,

    pub early_stopping: EarlyStopping,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            generation: GenerationOptions {
                stop_sequences: vec![OBSERVATION_STOP.into()],
                ..GenerationOptions::default()
            },
            early_stopping: EarlyStopping::default(),
        }
    }
}

/// One parsed model step
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Call `tool` with `input`
    Action {
        thought: String,
        tool: String,
        input: String,
    },
    /// Stop and answer
    Finish { thought: String, answer: String },
}

/// Parse one model output into an action or a final answer
pub fn parse_step(text: &str) -> Result<Step> {
    let final_at = text.find(FINAL_ANSWER);

    if let Some(caps) = ACTION_RE.captures(text) {
        let whole = caps.get(0).map_or(0, |m| m.start());
        if let Some(start) = final_at {
            if start < whole {
                // Final answer came first; whatever follows is hallucinated
                let body = &text[start + FINAL_ANSWER.len()..];
                let end = body.find("\n\n").unwrap_or(body.len());
                return Ok(Step::Finish {
                    thought: thought_before(text, start),
                    answer: body[..end].trim().to_string(),
                });
            }
            return Err(AgentError::Parse(format!(
                "Parsing LLM output produced both a final answer and a parse-able action: {text}"
            )));
        }

        let tool = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
        let raw_input = caps.get(2).map_or("", |m| m.as_str());
        let raw_input = raw_input
            .find(OBSERVATION_STOP)
            .map_or(raw_input, |cut| &raw_input[..cut]);
        let input = raw_input.trim().trim_matches('"').to_string();

        return Ok(Step::Action {
            thought: thought_before(text, whole),
            tool,
            input,
        });
    }

    if let Some(start) = final_at {
        let answer = text
            .rsplit(FINAL_ANSWER)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        return Ok(Step::Finish {
            thought: thought_before(text, start),
            answer,
        });
    }

    if !ACTION_ONLY_RE.is_match(text) {
        Err(AgentError::Parse(format!(
            "Invalid Format: Missing 'Action:' after 'Thought:': {text}"
        )))
    } else if !ACTION_INPUT_RE.is_match(text) {
        Err(AgentError::Parse(format!(
            "Invalid Format: Missing 'Action Input:' after 'Action:': {text}"
        )))
    } else {
        Err(AgentError::Parse(format!("Could not parse LLM output: `{text}`")))
    }
}

fn thought_before(text: &str, end: usize) -> String {
    text[..end].trim().to_string()
}

/// Zero-shot ReAct agent over any [`LlmProvider`]
pub struct ReactAgent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl ReactAgent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Build the full prompt for `task` with the steps taken so far
    pub fn build_prompt(&self, task: &str, scratchpad: &str) -> String {
        let tool_names = self.tools.names().join(", ");
        let format = FORMAT_INSTRUCTIONS.replace("{tool_names}", &tool_names);
        let suffix = SUFFIX
            .replace("{input}", task)
            .replace("{agent_scratchpad}", scratchpad);

        format!("{PREFIX}\n\n{}\n\n{format}\n\n{suffix}", self.tools.describe())
    }

    /// Ask the model for the next step, streaming tokens when enabled
    async fn generate(&self, prompt: String, trace: &TraceSink) -> Result<String> {
        let messages = [Message::user(prompt)];
        let options = &self.config.generation;

        if !options.stream {
            let completion = self.provider.complete(&messages, options).await?;
            return Ok(completion.content);
        }

        let mut stream = self.provider.complete_stream(&messages, options).await?;
        let mut content = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.delta.is_empty() {
                trace.emit(TraceEvent::Token {
                    text: chunk.delta.clone(),
                });
                content.push_str(&chunk.delta);
            }
            if chunk.done {
                break;
            }
        }
        Ok(content)
    }

    /// Execute a tool call; failures become observations, never errors
    async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        match self.tools.execute(call).await {
            Ok(result) => result,
            Err(AgentError::ToolNotFound(name)) => ToolResult::failure(
                name.clone(),
                format!(
                    "{name} is not a valid tool, try one of [{}].",
                    self.tools.names().join(", ")
                ),
            ),
            Err(e) => ToolResult::failure(call.name.clone(), format!("Error: {e}")),
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

#[async_trait]
impl ReasoningAgent for ReactAgent {
    async fn run(&self, task: &str, trace: &TraceSink) -> Result<String> {
        let mut scratchpad = String::new();

        for step in 1..=self.config.max_iterations {
            trace.emit(TraceEvent::Thinking { step });

            let output = self.generate(self.build_prompt(task, &scratchpad), trace).await?;

            match parse_step(&output)? {
                Step::Finish { thought, answer } => {
                    if !thought.is_empty() {
                        trace.emit(TraceEvent::Thought { text: thought });
                    }
                    trace.emit(TraceEvent::FinalAnswer {
                        text: answer.clone(),
                    });
                    tracing::debug!(step, "agent finished");
                    return Ok(answer);
                }
                Step::Action {
                    thought,
                    tool,
                    input,
                } => {
                    if !thought.is_empty() {
                        trace.emit(TraceEvent::Thought { text: thought });
                    }
                    trace.emit(TraceEvent::Action {
                        tool: tool.clone(),
                        input: input.clone(),
                    });
                    tracing::debug!(step, tool = %tool, "executing tool");

                    let result = self.execute_tool(&ToolCall::query(&tool, &input)).await;
                    if !result.success {
                        tracing::debug!(tool = %tool, "tool reported failure");
                    }
                    trace.emit(TraceEvent::Observation {
                        tool,
                        output: result.output.clone(),
                        success: result.success,
                    });

                    scratchpad.push_str(&output);
                    scratchpad.push_str("\nObservation: ");
                    scratchpad.push_str(&result.output);
                    scratchpad.push_str("\nThought: ");
                }
            }
        }

        tracing::warn!(max = self.config.max_iterations, "agent hit iteration limit");
        match self.config.early_stopping {
            EarlyStopping::Force => Ok(STOPPED_MESSAGE.into()),
            EarlyStopping::Error => Err(AgentError::MaxIterations(self.config.max_iterations)),
        }
    }
}

/// Builder for [`ReactAgent`]
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: Arc::new(ToolRegistry::new()),
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub const fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    #[must_use]
    pub const fn streaming(mut self, enabled: bool) -> Self {
        self.config.generation.stream = enabled;
        self
    }

    #[must_use]
    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    #[must_use]
    pub const fn early_stopping(mut self, policy: EarlyStopping) -> Self {
        self.config.early_stopping = policy;
        self
    }

    pub fn build(self) -> Result<ReactAgent> {
        let provider = self.provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(ReactAgent::new(provider, self.tools, self.config))
    }
}
