//! Groq LLM Provider
//!
//! Implementation of `LlmProvider` for Groq's hosted, OpenAI-compatible chat
//! completions API. Each provider is bound to one caller credential.

use agent_core::{
    credential::Credential,
    error::{AgentError, Result},
    message::Message,
    provider::{
        Completion, CompletionStream, FinishReason, GenerationOptions, LlmProvider, ModelInfo,
        StreamChunk, TokenUsage,
    },
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_stream::wrappers::LinesStream;
use tokio_util::io::StreamReader;

/// Groq provider configuration
#[derive(Clone, Debug)]
pub struct GroqConfig {
    /// API base URL, up to and including `/v1`
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".into(),
            timeout_secs: 120,
        }
    }
}

impl GroqConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("GROQ_API_BASE").unwrap_or(defaults.base_url);
        let timeout_secs = std::env::var("GROQ_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(defaults.timeout_secs);

        Self {
            base_url,
            timeout_secs,
        }
    }

    /// HTTP client with this configuration's timeouts. Built once and shared
    /// by every provider, so connections are pooled across requests.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(e.to_string()))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    stream: bool,
}

impl<'a> ChatRequest<'a> {
    fn new(messages: &'a [Message], options: &'a GenerationOptions, stream: bool) -> Self {
        Self {
            model: &options.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            stop: &options.stop_sequences,
            stream,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<Delta>,
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    x_groq: Option<GroqExtra>,
}

#[derive(Deserialize)]
struct GroqExtra {
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<Usage> for TokenUsage {
    fn from(u: Usage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    owned_by: Option<String>,
    #[serde(default)]
    context_window: Option<u32>,
}

/// Groq LLM provider
pub struct GroqProvider {
    http: reqwest::Client,
    config: GroqConfig,
    credential: Credential,
}

impl GroqProvider {
    /// Create a provider with its own HTTP client
    pub fn new(config: GroqConfig, credential: Credential) -> Result<Self> {
        let http = config.http_client()?;
        Ok(Self::with_client(http, config, credential))
    }

    /// Create a provider on an existing client; every request is authorized
    /// with `credential`
    pub const fn with_client(
        http: reqwest::Client,
        config: GroqConfig,
        credential: Credential,
    ) -> Self {
        Self {
            http,
            config,
            credential,
        }
    }

    async fn post_chat(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        tracing::debug!(model = %request.model, stream = request.stream, "Groq chat request");

        let response = self
            .http
            .post(self.config.endpoint("chat/completions"))
            .bearer_auth(self.credential.expose())
            .json(request)
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        check_status(response).await
    }
}

/// Map non-success HTTP statuses onto the agent error taxonomy
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect());

    Err(match status.as_u16() {
        401 | 403 => AgentError::Auth(message),
        429 => AgentError::RateLimited(message),
        500..=599 => AgentError::ProviderUnavailable(format!("HTTP {status}: {message}")),
        _ => AgentError::Provider(format!("HTTP {status}: {message}")),
    })
}

/// Parse one SSE line into a chunk. Lines that carry no data yield `None`.
fn parse_sse_line(line: &str) -> Option<Result<StreamChunk>> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(StreamChunk {
            delta: String::new(),
            done: true,
            usage: None,
        }));
    }

    let parsed = match serde_json::from_str::<ChunkResponse>(data) {
        Ok(parsed) => parsed,
        Err(e) => return Some(Err(AgentError::Provider(format!("bad stream chunk: {e}")))),
    };

    let mut delta = String::new();
    let mut finished = false;
    for choice in parsed.choices {
        if let Some(content) = choice.delta.and_then(|d| d.content) {
            delta.push_str(&content);
        }
        finished |= choice.finish_reason.is_some();
    }

    let usage = parsed
        .usage
        .or_else(|| parsed.x_groq.and_then(|x| x.usage))
        .map(TokenUsage::from);

    Some(Ok(StreamChunk {
        delta,
        done: finished,
        usage,
    }))
}

#[async_trait]
impl LlmProvider for GroqProvider {
    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = ChatRequest::new(messages, options, false);
        let response: ChatResponse = self
            .post_chat(&request)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Provider("response contained no choices".into()))?;

        Ok(Completion {
            content: choice.message.and_then(|m| m.content).unwrap_or_default(),
            model: response.model,
            usage: response.usage.map(TokenUsage::from),
            finish_reason: choice.finish_reason.as_deref().map(FinishReason::parse),
        })
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let request = ChatRequest::new(messages, options, true);
        let response = self.post_chat(&request).await?;

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        let lines = LinesStream::new(tokio::io::BufReader::new(StreamReader::new(bytes)).lines());

        let chunks = lines.filter_map(|line| {
            futures::future::ready(match line {
                Ok(line) => parse_sse_line(&line),
                Err(e) => Some(Err(AgentError::ProviderUnavailable(e.to_string()))),
            })
        });

        Ok(Box::pin(chunks))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .http
            .get(self.config.endpoint("models"))
            .bearer_auth(self.credential.expose())
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        let models: ModelList = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        Ok(models
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                owned_by: m.owned_by,
                context_length: m.context_window,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, key: &str) -> GroqProvider {
        let config = GroqConfig {
            base_url: format!("{}/openai/v1", server.uri()),
            ..Default::default()
        };
        GroqProvider::new(config, Credential::from(key)).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = GroqConfig::default();
        assert_eq!(config.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(
            config.endpoint("chat/completions"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_sse_lines() {
        let chunk = parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.delta, "Hel");
        assert!(!chunk.done);

        let last = parse_sse_line(
            r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}],"x_groq":{"usage":{"prompt_tokens":5,"completion_tokens":2,"total_tokens":7}}}"#,
        )
        .unwrap()
        .unwrap();
        assert!(last.done);
        assert_eq!(last.usage.map(|u| u.total_tokens), Some(7));

        assert!(parse_sse_line("data: [DONE]").unwrap().unwrap().done);
        assert!(parse_sse_line(": keep-alive").is_none());
        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line("data: {not json").unwrap().is_err());
    }

    #[tokio::test]
    async fn test_complete_sends_credential_and_options() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(header("authorization", "Bearer gsk_test"))
            .and(body_partial_json(json!({
                "model": "Llama3-8b-8192",
                "stream": false,
                "stop": ["\nObservation:"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3-8b-8192",
                "choices": [{
                    "message": {"role": "assistant", "content": "Final Answer: 4"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
            })))
            .mount(&server)
            .await;

        let options = GenerationOptions {
            stop_sequences: vec!["\nObservation:".into()],
            ..Default::default()
        };
        let completion = provider(&server, "gsk_test")
            .complete(&[Message::user("2+2?")], &options)
            .await
            .unwrap();

        assert_eq!(completion.content, "Final Answer: 4");
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
        assert_eq!(completion.usage.map(|u| u.total_tokens), Some(14));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(header("authorization", "Bearer bad"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Invalid API Key", "code": "invalid_api_key"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(header("authorization", "Bearer busy"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(header("authorization", "Bearer down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let messages = [Message::user("hi")];
        let options = GenerationOptions::default();

        let auth = provider(&server, "bad").complete(&messages, &options).await;
        assert!(matches!(auth, Err(AgentError::Auth(msg)) if msg == "Invalid API Key"));

        let limited = provider(&server, "busy").complete(&messages, &options).await;
        assert!(matches!(limited, Err(AgentError::RateLimited(_))));

        let down = provider(&server, "down").complete(&messages, &options).await;
        assert!(matches!(down, Err(AgentError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn test_complete_stream() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Final \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Answer: 4\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let options = GenerationOptions {
            stream: true,
            ..Default::default()
        };
        let mut stream = provider(&server, "k")
            .complete_stream(&[Message::user("2+2?")], &options)
            .await
            .unwrap();

        let mut text = String::new();
        let mut saw_done = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            text.push_str(&chunk.delta);
            saw_done |= chunk.done;
        }
        assert_eq!(text, "Final Answer: 4");
        assert!(saw_done);
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openai/v1/models"))
            .and(header("authorization", "Bearer k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{"id": "llama3-8b-8192", "owned_by": "Meta", "context_window": 8192}]
            })))
            .mount(&server)
            .await;

        let models = provider(&server, "k").list_models().await.unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].context_length, Some(8192));

        let unknown_key = provider(&server, "other").list_models().await;
        assert!(unknown_key.is_err());
    }
}
