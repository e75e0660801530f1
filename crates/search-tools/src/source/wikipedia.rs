//! Wikipedia Client
//!
//! Two MediaWiki API calls per lookup: a full-text search for page titles,
//! then the plain-text intro of each page.

use async_trait::async_trait;
use serde::Deserialize;

use super::{SearchSource, check_status};
use crate::error::Result;
use crate::model::Document;

const NAME: &str = "Wikipedia";

#[derive(Deserialize)]
struct SearchResponse {
    query: SearchQuery,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    query: ExtractQuery,
}

#[derive(Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    extract: Option<String>,
}

/// MediaWiki API client
pub struct WikipediaClient {
    http: reqwest::Client,
    api_url: String,
}

impl WikipediaClient {
    pub fn new(http: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
        }
    }

    async fn titles(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let limit = limit.to_string();
        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("srprop", ""),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .send()
            .await?;

        let body: SearchResponse = check_status(NAME, response)?.json().await?;
        Ok(body.query.search.into_iter().map(|hit| hit.title).collect())
    }

    /// Intro extract for one title; `None` for missing or empty pages
    async fn summary(&self, title: &str) -> Result<Option<Document>> {
        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("prop", "extracts|info"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("inprop", "url"),
                ("redirects", "1"),
                ("titles", title),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .send()
            .await?;

        let body: ExtractResponse = check_status(NAME, response)?.json().await?;
        let page = body
            .query
            .pages
            .into_iter()
            .find(|p| !p.missing && p.extract.as_deref().is_some_and(|e| !e.trim().is_empty()));

        Ok(page.map(|p| {
            let url = format!(
                "https://en.wikipedia.org/wiki/{}",
                urlencoding::encode(&p.title.replace(' ', "_"))
            );
            Document::new(p.title, p.extract.unwrap_or_default().trim()).with_url(url)
        }))
    }
}

#[async_trait]
impl SearchSource for WikipediaClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Document>> {
        let titles = self.titles(query, max_results).await?;
        tracing::debug!(query, hits = titles.len(), "wikipedia search");

        let mut documents = Vec::new();
        for title in titles.iter().take(max_results) {
            match self.summary(title).await? {
                Some(doc) => documents.push(doc),
                None => tracing::debug!(title = %title, "skipping page without summary"),
            }
        }
        Ok(documents)
    }

    fn name(&self) -> &str {
        NAME
    }
}
