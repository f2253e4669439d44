//! Built-in web research server.
//!
//! Three tools that cover the usual research workflow: brainstorm queries,
//! search, then read pages.
//! - `suggest_google_searches`: research-oriented query templates for a topic
//! - `search_brave`: Brave Search API, top organic results
//! - `scrape_website`: download a page and return its readable text

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use mcpilot_core::config::WebToolsConfig;

use super::base::{optional_usize, require_string, Tool};
use super::server::LocalToolServer;

/// Name the web tools are registered under.
pub const WEB_SERVER_NAME: &str = "web-search";

const USER_AGENT: &str = "Mozilla/5.0 (compatible; mcpilot/0.1)";

const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

const DEFAULT_MAX_SUGGESTIONS: usize = 10;
const DEFAULT_MAX_RESULTS: usize = 10;
const DEFAULT_MAX_CHARS: usize = 5000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Build the web research server from config.
pub fn web_research_server(config: &WebToolsConfig) -> LocalToolServer {
    let key = Some(config.brave_api_key.clone()).filter(|k| !k.is_empty());
    LocalToolServer::new(WEB_SERVER_NAME)
        .with_tool(Arc::new(SuggestSearchesTool))
        .with_tool(Arc::new(SearchBraveTool::new(key)))
        .with_tool(Arc::new(ScrapeWebsiteTool::new()))
}

fn http_client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .unwrap_or_default()
}

// ─────────────────────────────────────────────
// suggest_google_searches
// ─────────────────────────────────────────────

pub struct SuggestSearchesTool;

impl SuggestSearchesTool {
    fn suggestions(topic: &str, max: usize) -> Vec<String> {
        if topic.trim().is_empty() {
            return Vec::new();
        }
        let templates = [
            format!("Who is {topic}"),
            format!("What is {topic}'s background"),
            format!("{topic} latest news"),
            format!("{topic} controversies"),
            format!("{topic} achievements"),
            format!("{topic} timeline"),
            format!("{topic} impact on industry"),
            format!("{topic} criticisms"),
            format!("{topic} awards"),
            format!("interviews with {topic}"),
            format!("quotes by {topic}"),
        ];
        templates.into_iter().take(max).collect()
    }
}

#[async_trait]
impl Tool for SuggestSearchesTool {
    fn name(&self) -> &str {
        "suggest_google_searches"
    }

    fn description(&self) -> &str {
        "Given a topic, suggest up to `max_suggestions` Google search queries to deeply research the topic."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "Person, company or subject to research"
                },
                "max_suggestions": {
                    "type": "integer",
                    "description": "Maximum number of queries (default 10)",
                    "minimum": 1
                }
            },
            "required": ["topic"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let topic = require_string(&params, "topic")?;
        let max = optional_usize(&params, "max_suggestions", DEFAULT_MAX_SUGGESTIONS);
        Ok(serde_json::to_string(&Self::suggestions(&topic, max))?)
    }
}

// ─────────────────────────────────────────────
// search_brave
// ─────────────────────────────────────────────

#[derive(Debug, Serialize, PartialEq)]
struct SearchResult {
    title: String,
    url: String,
    description: String,
}

/// Searches the web using the Brave Search API.
pub struct SearchBraveTool {
    api_key: Option<String>,
    endpoint: String,
    client: Client,
}

impl SearchBraveTool {
    /// `api_key` falls back to the `BRAVE_API_KEY` env var when `None`.
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_endpoint(api_key, BRAVE_ENDPOINT)
    }

    pub fn with_endpoint(api_key: Option<String>, endpoint: impl Into<String>) -> Self {
        Self {
            api_key,
            endpoint: endpoint.into(),
            client: http_client(),
        }
    }

    fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("BRAVE_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }

    fn parse_results(body: &Value, max: usize) -> Vec<SearchResult> {
        // Results usually sit under `web.results`; some responses put them at the top.
        let raw = body["results"]
            .as_array()
            .or_else(|| body["web"]["results"].as_array())
            .cloned()
            .unwrap_or_default();

        raw.iter()
            .take(max)
            .map(|item| SearchResult {
                title: item["title"].as_str().unwrap_or("(no title)").to_string(),
                url: item["url"].as_str().unwrap_or_default().to_string(),
                description: item["description"]
                    .as_str()
                    .or_else(|| item["snippet"].as_str())
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect()
    }
}

#[async_trait]
impl Tool for SearchBraveTool {
    fn name(&self) -> &str {
        "search_brave"
    }

    fn description(&self) -> &str {
        "Search the web via Brave Search API and return a list of organic results with title, url, and description."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Number of results (1-20, default 10)",
                    "minimum": 1,
                    "maximum": 20
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let query = require_string(&params, "query")?;
        let max = optional_usize(&params, "max_results", DEFAULT_MAX_RESULTS).clamp(1, 20);

        let api_key = self.resolve_api_key().ok_or_else(|| {
            anyhow::anyhow!("No Brave API key configured (set tools.web.braveApiKey or BRAVE_API_KEY)")
        })?;

        debug!(query = %query, max_results = max, "searching web");
        let count = max.to_string();

        let resp = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &api_key)
            .query(&[("q", query.as_str()), ("count", count.as_str())])
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Brave API request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Brave API returned {status}: {body}");
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse Brave response: {e}"))?;

        let results = Self::parse_results(&body, max);
        Ok(serde_json::to_string_pretty(&results)?)
    }
}

// ─────────────────────────────────────────────
// scrape_website
// ─────────────────────────────────────────────

/// Downloads a page and returns its readable text.
pub struct ScrapeWebsiteTool {
    client: Client,
}

impl ScrapeWebsiteTool {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }
}

impl Default for ScrapeWebsiteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ScrapeWebsiteTool {
    fn name(&self) -> &str {
        "scrape_website"
    }

    fn description(&self) -> &str {
        "Download a web page and return its cleaned text content (scripts/styles removed). Truncates to `max_chars` characters."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                },
                "max_chars": {
                    "type": "integer",
                    "description": "Maximum characters to return (default 5000)",
                    "minimum": 1
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let url = require_string(&params, "url")?;
        let max_chars = optional_usize(&params, "max_chars", DEFAULT_MAX_CHARS);

        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("Invalid URL: must start with http:// or https://");
        }

        debug!(url = %url, "scraping web page");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("HTTP request failed: {e}"))?;

        if !resp.status().is_success() {
            anyhow::bail!("{url} returned {}", resp.status());
        }

        let body = resp
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read response body: {e}"))?;

        Ok(truncate_chars(&html_to_text(&body), max_chars))
    }
}

/// Convert HTML to plain text and collapse all whitespace runs.
fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 10_000);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::server::ToolServer;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_html_to_text_strips_markup() {
        let html = "<html><body><h1>Title</h1><p>Hello   <b>world</b></p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Title"));
        assert!(text.contains("world"));
        assert!(!text.contains('<'));
        assert!(!text.contains("  "));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("52°F and rain", 4), "52°F");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[tokio::test]
    async fn test_suggestions_capped() {
        let out = SuggestSearchesTool
            .execute(params(&[("topic", json!("Ada Lovelace")), ("max_suggestions", json!(3))]))
            .await
            .unwrap();
        let list: Vec<String> = serde_json::from_str(&out).unwrap();
        assert_eq!(
            list,
            vec![
                "Who is Ada Lovelace",
                "What is Ada Lovelace's background",
                "Ada Lovelace latest news"
            ]
        );
    }

    #[tokio::test]
    async fn test_suggestions_empty_topic() {
        let out = SuggestSearchesTool
            .execute(params(&[("topic", json!(""))]))
            .await
            .unwrap();
        assert_eq!(out, "[]");
    }

    #[tokio::test]
    async fn test_search_brave() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(header("X-Subscription-Token", "brave-key"))
            .and(query_param("q", "rust async"))
            .and(query_param("count", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "web": {
                    "results": [
                        {"title": "Tokio", "url": "https://tokio.rs", "description": "Runtime"},
                        {"title": "Async Book", "url": "https://rust-lang.github.io/async-book", "snippet": "Guide"},
                        {"title": "Extra", "url": "https://example.com"}
                    ]
                }
            })))
            .mount(&mock_server)
            .await;

        let tool = SearchBraveTool::with_endpoint(
            Some("brave-key".into()),
            format!("{}/search", mock_server.uri()),
        );
        let out = tool
            .execute(params(&[("query", json!("rust async")), ("max_results", json!(2))]))
            .await
            .unwrap();

        let results: Vec<Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["title"], "Tokio");
        assert_eq!(results[1]["description"], "Guide");
    }

    #[tokio::test]
    async fn test_search_brave_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&mock_server)
            .await;

        let tool = SearchBraveTool::with_endpoint(Some("k".into()), mock_server.uri());
        let err = tool
            .execute(params(&[("query", json!("x"))]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_scrape_website() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><body><p>Forecast: cloudy with light rain</p></body></html>"),
            )
            .mount(&mock_server)
            .await;

        let out = ScrapeWebsiteTool::new()
            .execute(params(&[
                ("url", json!(format!("{}/page", mock_server.uri()))),
                ("max_chars", json!(15)),
            ]))
            .await
            .unwrap();
        assert_eq!(out, "Forecast: cloud");
    }

    #[tokio::test]
    async fn test_scrape_invalid_url() {
        let err = ScrapeWebsiteTool::new()
            .execute(params(&[("url", json!("not-a-url"))]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[tokio::test]
    async fn test_web_research_server_lists_three_tools() {
        let server = web_research_server(&WebToolsConfig::default());
        assert_eq!(server.name(), WEB_SERVER_NAME);
        let names: Vec<String> = server
            .list_tools()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(
            names,
            vec!["scrape_website", "search_brave", "suggest_google_searches"]
        );
    }
}
