//! # search-tools
//!
//! Lookup tools for the search assistant: an encyclopedia (Wikipedia), a web
//! search engine (DuckDuckGo) and a preprint archive (arXiv).
//!
//! ```text
//! ToolSet ──▶ LookupTool (wikipedia)         ──▶ WikipediaClient
//!        ├──▶ LookupTool (duckduckgo_search) ──▶ DuckDuckGoClient
//!        └──▶ LookupTool (arxiv)             ──▶ ArxivClient
//! ```
//!
//! Each [`LookupTool`](svckit::LookupTool) implements `agent_core::Tool` and
//! talks to its service through the [`SearchSource`](source::SearchSource)
//! trait, so tests can swap in a [`MockSource`](source::MockSource).

pub mod error;
pub mod model;
pub mod source;
pub mod svckit;
pub mod toolset;

pub use error::{Result, SearchError};
pub use model::Document;
pub use source::{SearchConfig, SearchSource};
pub use toolset::{ToolKind, ToolSet};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::LookupTool;
}
