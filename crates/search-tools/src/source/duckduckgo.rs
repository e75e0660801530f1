//! DuckDuckGo Client
//!
//! Scrapes the no-JavaScript results page; DuckDuckGo has no public
//! search API.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use super::{SearchSource, check_status};
use crate::error::Result;
use crate::model::{Document, clean_text, decode_entities};

const NAME: &str = "DuckDuckGo";

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
        .expect("link pattern is valid")
});
static SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)class="result__snippet"[^>]*>(.*?)</(?:a|div|td)>"#)
        .expect("snippet pattern is valid")
});

/// Resolve DuckDuckGo's `/l/?uddg=` redirect to the target URL
fn resolve_link(href: &str) -> String {
    let href = decode_entities(href);
    let target = href
        .split_once("uddg=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or(rest))
        .and_then(|encoded| urlencoding::decode(encoded).ok())
        .map(|decoded| decoded.into_owned());

    match target {
        Some(url) => url,
        None if href.starts_with("//") => format!("https:{href}"),
        None => href,
    }
}

/// Parse organic results out of a results page, skipping ads
pub fn parse_results(html: &str) -> Vec<Document> {
    let links: Vec<_> = LINK_RE.captures_iter(html).collect();
    let mut documents = Vec::new();

    for (i, link) in links.iter().enumerate() {
        let href = &link[1];
        // Sponsored results go through the y.js click tracker
        if href.contains("duckduckgo.com/y.js") {
            continue;
        }

        let whole = link.get(0).map_or(0..0, |m| m.range());
        let block_end = links
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(html.len(), |m| m.start());
        let snippet = SNIPPET_RE
            .captures(&html[whole.end..block_end])
            .map(|c| clean_text(&c[1]))
            .unwrap_or_default();

        documents.push(Document::new(clean_text(&link[2]), snippet).with_url(resolve_link(href)));
    }
    documents
}

/// DuckDuckGo HTML search client
pub struct DuckDuckGoClient {
    http: reqwest::Client,
    search_url: String,
}

impl DuckDuckGoClient {
    pub fn new(http: reqwest::Client, search_url: impl Into<String>) -> Self {
        Self {
            http,
            search_url: search_url.into(),
        }
    }
}

#[async_trait]
impl SearchSource for DuckDuckGoClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Document>> {
        let response = self
            .http
            .get(&self.search_url)
            .query(&[("q", query)])
            .send()
            .await?;
        let html = check_status(NAME, response)?.text().await?;

        let mut documents = parse_results(&html);
        documents.retain(|d| !d.summary.is_empty());
        documents.truncate(max_results);

        tracing::debug!(query, hits = documents.len(), "duckduckgo search");
        Ok(documents)
    }

    fn name(&self) -> &str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><body>
<div class="result results_links result--ad">
  <h2 class="result__title"><a rel="nofollow" class="result__a" href="https://duckduckgo.com/y.js?ad_provider=x&amp;u3=y">Buy Rust Merch</a></h2>
  <a class="result__snippet" href="https://duckduckgo.com/y.js?ad">Sponsored snippet</a>
</div>
<div class="result results_links">
  <h2 class="result__title"><a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust%2Dlang.org%2F&amp;rut=abc">Rust Programming Language</a></h2>
  <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">A language empowering <b>everyone</b> to build reliable software.</a>
</div>
<div class="result results_links">
  <h2 class="result__title"><a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FRust&amp;rut=def">Rust - Wikipedia</a></h2>
  <a class="result__snippet" href="//duckduckgo.com/l/?uddg=y">Rust is a general&#x2d;purpose programming language.</a>
</div>
</body></html>"#;

    #[test]
    fn test_parse_results_skips_ads() {
        let docs = parse_results(PAGE);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].title, "Rust Programming Language");
        assert_eq!(docs[0].url.as_deref(), Some("https://www.rust-lang.org/"));
        assert_eq!(
            docs[0].summary,
            "A language empowering everyone to build reliable software."
        );
        assert_eq!(docs[1].summary, "Rust is a general-purpose programming language.");
    }

    #[test]
    fn test_resolve_link() {
        assert_eq!(resolve_link("https://example.com/a"), "https://example.com/a");
        assert_eq!(resolve_link("//example.com/a"), "https://example.com/a");
    }

    #[tokio::test]
    async fn test_search_truncates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "rust language"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let client = DuckDuckGoClient::new(reqwest::Client::new(), server.uri());
        let docs = client.search("rust language", 1).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "Rust Programming Language");
    }

    #[tokio::test]
    async fn test_search_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = DuckDuckGoClient::new(reqwest::Client::new(), server.uri());
        let err = client.search("rust", 5).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 503"));
    }
}
