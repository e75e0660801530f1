//! Tool Set
//!
//! The assistant's fixed tool list: one lookup tool per [`ToolKind`], handed
//! to the agent in priority order.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use agent_core::ToolRegistry;

use crate::error::Result;
use crate::source::{ArxivClient, DuckDuckGoClient, SearchConfig, SearchSource, WikipediaClient};
use crate::svckit::LookupTool;

/// The three kinds of lookup the assistant can do
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    EncyclopediaLookup,
    WebSearch,
    PreprintLookup,
}

impl ToolKind {
    /// Order in which tools are offered to the agent
    pub const PRIORITY: [Self; 3] = [Self::EncyclopediaLookup, Self::WebSearch, Self::PreprintLookup];

    /// Name the agent uses in `Action:` lines
    pub const fn name(self) -> &'static str {
        match self {
            Self::EncyclopediaLookup => "wikipedia",
            Self::WebSearch => "duckduckgo_search",
            Self::PreprintLookup => "arxiv",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::EncyclopediaLookup => {
                "A wrapper around Wikipedia. Useful for when you need to answer general questions about people, places, companies, facts, historical events, or other subjects. Input should be a search query."
            }
            Self::WebSearch => {
                "A wrapper around DuckDuckGo Search. Useful for when you need to answer questions about current events. Input should be a search query."
            }
            Self::PreprintLookup => {
                "A wrapper around Arxiv.org Useful for when you need to answer questions about Physics, Mathematics, Computer Science, Quantitative Biology, Quantitative Finance, Statistics, Electrical Engineering, and Economics from scientific articles on arxiv.org. Input should be a search query."
            }
        }
    }

    pub const fn default_max_results(self) -> usize {
        match self {
            Self::EncyclopediaLookup | Self::PreprintLookup => 2,
            Self::WebSearch => 5,
        }
    }

    /// Text returned when a lookup finds nothing
    pub const fn empty_result(self) -> &'static str {
        match self {
            Self::EncyclopediaLookup => "No good Wikipedia Search Result was found",
            Self::WebSearch => "No good DuckDuckGo Search Result was found",
            Self::PreprintLookup => "No good Arxiv Result was found",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Exactly one tool of each kind
#[derive(Clone)]
pub struct ToolSet {
    encyclopedia: Arc<LookupTool>,
    web_search: Arc<LookupTool>,
    preprint: Arc<LookupTool>,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet").field("kinds", &self.kinds()).finish()
    }
}

impl ToolSet {
    /// Tools backed by the public Wikipedia, DuckDuckGo and arXiv services
    pub fn standard(config: &SearchConfig) -> Result<Self> {
        let http = config.http_client()?;
        Ok(Self::from_sources(
            Arc::new(WikipediaClient::new(http.clone(), &config.wikipedia_url)),
            Arc::new(DuckDuckGoClient::new(http.clone(), &config.duckduckgo_url)),
            Arc::new(ArxivClient::new(http, &config.arxiv_url)),
        ))
    }

    pub fn from_sources(
        encyclopedia: Arc<dyn SearchSource>,
        web_search: Arc<dyn SearchSource>,
        preprint: Arc<dyn SearchSource>,
    ) -> Self {
        Self {
            encyclopedia: Arc::new(LookupTool::encyclopedia(encyclopedia)),
            web_search: Arc::new(LookupTool::web_search(web_search)),
            preprint: Arc::new(LookupTool::preprint(preprint)),
        }
    }

    pub fn get(&self, kind: ToolKind) -> &Arc<LookupTool> {
        match kind {
            ToolKind::EncyclopediaLookup => &self.encyclopedia,
            ToolKind::WebSearch => &self.web_search,
            ToolKind::PreprintLookup => &self.preprint,
        }
    }

    /// Tools in priority order
    pub fn tools(&self) -> impl Iterator<Item = &Arc<LookupTool>> {
        ToolKind::PRIORITY.into_iter().map(|kind| self.get(kind))
    }

    pub fn kinds(&self) -> Vec<ToolKind> {
        self.tools().map(|t| t.kind()).collect()
    }

    /// An ordered registry for the agent
    pub fn registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in self.tools() {
            registry.register_shared(tool.clone());
        }
        registry
    }
}
