//! In-memory search source for tests and offline runs

use async_trait::async_trait;
use std::sync::Mutex;

use super::SearchSource;
use crate::error::{Result, SearchError};
use crate::model::Document;

/// Serves canned documents and records every query it receives
pub struct MockSource {
    name: String,
    documents: Vec<Document>,
    fail: bool,
    queries: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new(name: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            name: name.into(),
            documents,
            fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// A source whose every search fails with HTTP 503
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            fail: true,
            ..Self::new(name, Vec::new())
        }
    }

    /// Queries received so far, oldest first
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SearchSource for MockSource {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Document>> {
        self.queries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(query.to_string());

        if self.fail {
            return Err(SearchError::Upstream {
                source_name: self.name.clone(),
                status: 503,
            });
        }
        Ok(self.documents.iter().take(max_results).cloned().collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
