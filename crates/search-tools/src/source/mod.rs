//! Search Sources
//!
//! Abstractions and implementations for the upstream lookup services.

mod arxiv;
mod duckduckgo;
mod mock;
mod wikipedia;

pub use arxiv::ArxivClient;
pub use duckduckgo::DuckDuckGoClient;
pub use mock::MockSource;
pub use wikipedia::WikipediaClient;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Result, SearchError};
use crate::model::Document;

/// Sent with every upstream request; some services reject anonymous clients
pub const USER_AGENT: &str = concat!("search-assistant/", env!("CARGO_PKG_VERSION"));

/// Search source trait (Strategy pattern)
///
/// Implement this for each upstream service.
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Return at most `max_results` documents for `query`
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Document>>;

    /// Source name
    fn name(&self) -> &str;
}

/// Upstream endpoints and timeouts
#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub wikipedia_url: String,
    pub arxiv_url: String,
    pub duckduckgo_url: String,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            wikipedia_url: "https://en.wikipedia.org/w/api.php".into(),
            arxiv_url: "https://export.arxiv.org/api/query".into(),
            duckduckgo_url: "https://html.duckduckgo.com/html/".into(),
            timeout_secs: 30,
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            wikipedia_url: std::env::var("WIKIPEDIA_API_URL").unwrap_or(defaults.wikipedia_url),
            arxiv_url: std::env::var("ARXIV_API_URL").unwrap_or(defaults.arxiv_url),
            duckduckgo_url: std::env::var("DUCKDUCKGO_URL").unwrap_or(defaults.duckduckgo_url),
            timeout_secs: std::env::var("SEARCH_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    /// HTTP client shared by the real sources
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| SearchError::Config(e.to_string()))
    }
}

/// Fail on non-success statuses, naming the source
pub(crate) fn check_status(source_name: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SearchError::Upstream {
            source_name: source_name.to_string(),
            status: status.as_u16(),
        })
    }
}
