//! Service Kit - Lookup Tools
//!
//! One `agent_core::Tool` per lookup service. Every tool takes a single
//! free-text query and returns plain text for the agent to read.

mod encyclopedia;
mod preprint;
mod web_search;

use async_trait::async_trait;
use std::sync::Arc;

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
    tool::ParameterSchema,
};

use crate::error::{Result, SearchError};
use crate::model::{Document, truncate_chars};
use crate::source::SearchSource;
use crate::toolset::ToolKind;

/// Longest query forwarded upstream
pub const MAX_QUERY_CHARS: usize = 300;

/// Longest text handed back to the agent
pub const MAX_OUTPUT_CHARS: usize = 4000;

pub(crate) fn format_documents(kind: ToolKind, documents: &[Document]) -> String {
    match kind {
        ToolKind::EncyclopediaLookup => encyclopedia::format(documents),
        ToolKind::WebSearch => web_search::format(documents),
        ToolKind::PreprintLookup => preprint::format(documents),
    }
}

/// A lookup tool backed by one search source
pub struct LookupTool {
    kind: ToolKind,
    source: Arc<dyn SearchSource>,
    max_results: usize,
}

impl LookupTool {
    pub fn new(kind: ToolKind, source: Arc<dyn SearchSource>) -> Self {
        Self {
            kind,
            source,
            max_results: kind.default_max_results(),
        }
    }

    /// Wikipedia-style encyclopedia lookup
    pub fn encyclopedia(source: Arc<dyn SearchSource>) -> Self {
        Self::new(ToolKind::EncyclopediaLookup, source)
    }

    pub fn web_search(source: Arc<dyn SearchSource>) -> Self {
        Self::new(ToolKind::WebSearch, source)
    }

    /// arXiv-style preprint lookup
    pub fn preprint(source: Arc<dyn SearchSource>) -> Self {
        Self::new(ToolKind::PreprintLookup, source)
    }

    #[must_use]
    pub const fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub const fn kind(&self) -> ToolKind {
        self.kind
    }

    /// Run `query` against the source and render the hits as text
    pub async fn invoke(&self, query: &str) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let query = truncate_chars(query, MAX_QUERY_CHARS);

        let documents = self.source.search(&query, self.max_results).await?;
        tracing::debug!(
            tool = self.kind.name(),
            source = self.source.name(),
            hits = documents.len(),
            "lookup finished"
        );

        if documents.is_empty() {
            return Ok(self.kind.empty_result().to_string());
        }
        Ok(truncate_chars(
            &format_documents(self.kind, &documents),
            MAX_OUTPUT_CHARS,
        ))
    }
}

#[async_trait]
impl Tool for LookupTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.kind.name().into(),
            description: self.kind.description().into(),
            parameters: vec![ParameterSchema::query("Search query")],
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let query = call.query_arg().unwrap_or_default();
        let output = self.invoke(query).await?;
        Ok(ToolResult::success(self.kind.name(), output))
    }
}
