//! arXiv Client
//!
//! Queries the arXiv export API and reads entries out of the Atom feed.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use super::{SearchSource, check_status};
use crate::error::{Result, SearchError};
use crate::model::{Document, clean_text};

const NAME: &str = "arXiv";

static ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("entry pattern is valid"));
static AUTHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").expect("author pattern is valid")
});
static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}\.\d{4,5}(v\d+)?|[a-z\-]+(\.[A-Z]{2})?/\d{7}(v\d+)?)$")
        .expect("identifier pattern is valid")
});

/// True when every whitespace-separated word is an arXiv identifier
/// (`2301.00001`, `2301.00001v2`, `hep-th/9901001`)
pub fn is_arxiv_identifier(query: &str) -> bool {
    let mut words = query.split_whitespace().peekable();
    words.peek().is_some() && words.all(|w| IDENTIFIER_RE.is_match(w))
}

fn tag(block: &str, name: &str) -> Option<String> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = block.find(&open)? + open.len();
    let end = block[start..].find(&close)? + start;
    Some(clean_text(&block[start..end]))
}

/// Parse the entries of an arXiv Atom feed
pub fn parse_feed(feed: &str) -> Result<Vec<Document>> {
    if !feed.contains("<feed") {
        return Err(SearchError::Parse {
            source_name: NAME.into(),
            reason: "response is not an Atom feed".into(),
        });
    }

    let mut documents = Vec::new();
    for entry in ENTRY_RE.captures_iter(feed) {
        let block = &entry[1];
        let Some(title) = tag(block, "title") else {
            continue;
        };
        // arXiv reports bad queries as a single entry titled "Error"
        if title == "Error" {
            continue;
        }

        // Dated by last update, like the arXiv listing pages
        let published = tag(block, "updated")
            .or_else(|| tag(block, "published"))
            .and_then(|stamp| {
                chrono::DateTime::parse_from_rfc3339(&stamp)
                    .ok()
                    .map(|d| d.date_naive().to_string())
            });
        let authors: Vec<String> = AUTHOR_RE
            .captures_iter(block)
            .map(|c| clean_text(&c[1]))
            .collect();

        let mut doc = Document::new(title, tag(block, "summary").unwrap_or_default())
            .with_authors(authors);
        if let Some(url) = tag(block, "id") {
            doc = doc.with_url(url);
        }
        if let Some(date) = published {
            doc = doc.with_published(date);
        }
        documents.push(doc);
    }
    Ok(documents)
}

/// arXiv export API client
pub struct ArxivClient {
    http: reqwest::Client,
    api_url: String,
}

impl ArxivClient {
    pub fn new(http: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl SearchSource for ArxivClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Document>> {
        let max = max_results.to_string();
        let request = if is_arxiv_identifier(query) {
            let ids = query.split_whitespace().collect::<Vec<_>>().join(",");
            self.http
                .get(&self.api_url)
                .query(&[("id_list", ids.as_str()), ("max_results", max.as_str())])
        } else {
            self.http.get(&self.api_url).query(&[
                ("search_query", query),
                ("start", "0"),
                ("max_results", max.as_str()),
            ])
        };

        let response = request.send().await?;
        let feed = check_status(NAME, response)?.text().await?;
        let mut documents = parse_feed(&feed)?;
        documents.truncate(max_results);

        tracing::debug!(query, hits = documents.len(), "arxiv search");
        Ok(documents)
    }

    fn name(&self) -> &str {
        NAME
    }
}
