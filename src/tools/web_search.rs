//! `web_search` — DuckDuckGo Lite search with exponential-backoff retries.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use serde_json::{Value, json};
use url::Url;

use super::{Tool, string_arg};
use crate::constants::{TOOL_HTTP_TIMEOUT_SECS, WEB_SEARCH_ATTEMPTS, WEB_SEARCH_MAX_RESULTS};

const DDG_LITE_URL: &str = "https://lite.duckduckgo.com/lite/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One search hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub href: String,
}

pub struct WebSearchTool {
    http: reqwest::Client,
    endpoint: String,
    max_results: usize,
    attempts: u32,
    base_delay: Duration,
}

impl WebSearchTool {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(TOOL_HTTP_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            endpoint: DDG_LITE_URL.to_string(),
            max_results: WEB_SEARCH_MAX_RESULTS,
            attempts: WEB_SEARCH_ATTEMPTS,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Point at a different endpoint with a custom retry delay.
    #[cfg(test)]
    pub fn with_endpoint(mut self, endpoint: &str, base_delay: Duration) -> Self {
        self.endpoint = endpoint.to_string();
        self.base_delay = base_delay;
        self
    }

    async fn fetch(&self, query: &str) -> Result<Vec<SearchResult>> {
        let response = self
            .http
            .post(&self.endpoint)
            .form(&[("q", query)])
            .send()
            .await
            .context("send DuckDuckGo request")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("DuckDuckGo search failed with status {status}"));
        }
        let html = response.text().await.context("read DuckDuckGo response")?;
        Ok(parse_results(&html, self.max_results))
    }

    /// Search and render results, retrying transient failures.
    pub async fn search(&self, query: &str) -> String {
        let query = query.trim();
        if query.is_empty() {
            return "(no query)".to_string();
        }
        match retry_with_backoff(self.attempts, self.base_delay, || self.fetch(query)).await {
            Ok(results) => render_results(&results),
            Err(err) => format!("(search unavailable: {err:#})"),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return up to 5 concise results"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: &Value) -> String {
        self.search(string_arg(args, "query")).await
    }
}

/// Run `op` up to `attempts` times, sleeping `base_delay * 2^n` (plus up to
/// 25% jitter) between failures. Returns the last error when all fail.
pub async fn retry_with_backoff<T, F, Fut>(attempts: u32, base_delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut last_err = None;
    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::warn!(attempt = attempt + 1, error = %format!("{err:#}"), "web search attempt failed");
                last_err = Some(err);
            }
        }
        if attempt + 1 < attempts {
            let delay = base_delay * 2_u32.pow(attempt);
            let jitter_cap = u64::try_from(delay.as_millis() / 4).unwrap_or(0);
            let jitter = if jitter_cap > 0 {
                rand::thread_rng().gen_range(0..=jitter_cap)
            } else {
                0
            };
            tokio::time::sleep(delay + Duration::from_millis(jitter)).await;
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("no attempts made")))
}

// Attribute order varies, so match any <a> with class="result-link" and
// pull the href out of the opening tag separately.
static RESULT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a[^>]*\bclass=['"]result-link['"][^>]*>([\s\S]*?)</a>"#)
        .expect("result link pattern is valid")
});
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href=['"]([^'"]+)['"]"#).expect("href pattern is valid"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

/// Extract result links from a DuckDuckGo Lite page.
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();
    for caps in RESULT_LINK_RE.captures_iter(html).take(max_results) {
        let full_tag = caps.get(0).map_or("", |m| m.as_str());
        let href = HREF_RE
            .captures(full_tag)
            .and_then(|c| c.get(1))
            .map_or("", |m| m.as_str());
        let title = decode_entities(TAG_RE.replace_all(&caps[1], "").trim());
        let href = resolve_href(&decode_entities(href));
        if title.is_empty() && href.is_empty() {
            continue;
        }
        results.push(SearchResult {
            title: if title.is_empty() {
                "result".to_string()
            } else {
                title
            },
            href,
        });
    }
    results
}

/// Unwrap DuckDuckGo redirect links (`//duckduckgo.com/l/?uddg=<target>`).
fn resolve_href(raw: &str) -> String {
    let absolute = if raw.starts_with("//") {
        format!("https:{raw}")
    } else {
        raw.to_string()
    };
    let Ok(url) = Url::parse(&absolute) else {
        return raw.to_string();
    };
    url.query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, target)| target.into_owned())
        .unwrap_or(absolute)
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
}

/// One `- title  - href` line per result.
pub fn render_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "(no results)".to_string();
    }
    results
        .iter()
        .map(|r| {
            if r.href.is_empty() {
                format!("- {}", r.title)
            } else {
                format!("- {}  - {}", r.title, r.href)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const LITE_PAGE: &str = r#"
        <table>
          <tr><td><a rel="nofollow" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc" class='result-link'>Rust <b>Programming</b> Language</a></td></tr>
          <tr><td class='result-snippet'>A language empowering everyone.</td></tr>
          <tr><td><a class="result-link" href="https://doc.rust-lang.org/book/">The Rust Book &amp; more</a></td></tr>
          <tr><td><a class="result-link" href="https://example.com/3">Third</a></td></tr>
        </table>
    "#;

    #[test]
    fn parses_titles_and_unwraps_redirects() {
        let results = parse_results(LITE_PAGE, 5);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "Rust Programming Language");
        assert_eq!(results[0].href, "https://www.rust-lang.org/");
        assert_eq!(results[1].title, "The Rust Book & more");
        assert_eq!(results[1].href, "https://doc.rust-lang.org/book/");
    }

    #[test]
    fn respects_max_results() {
        assert_eq!(parse_results(LITE_PAGE, 2).len(), 2);
    }

    #[test]
    fn repeated_parses_share_compiled_patterns() {
        let first = parse_results(LITE_PAGE, 5);
        let second = parse_results(LITE_PAGE, 5);
        assert_eq!(first, second);
        assert!(TAG_RE.is_match("<b>"));
        assert_eq!(HREF_RE.captures_len(), 2);
    }

    #[test]
    fn page_without_links_renders_no_results() {
        let results = parse_results("<html><body>nothing here</body></html>", 5);
        assert!(results.is_empty());
        assert_eq!(render_results(&results), "(no results)");
    }

    #[test]
    fn renders_bullet_lines() {
        let rendered = render_results(&[
            SearchResult {
                title: "Tides".into(),
                href: "https://tides.example".into(),
            },
            SearchResult {
                title: "No link".into(),
                href: String::new(),
            },
        ]);
        assert_eq!(rendered, "- Tides  - https://tides.example\n- No link");
    }

    #[tokio::test]
    async fn retry_gives_up_after_all_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(3, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow!("rate limited")) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err().to_string(), "rate limited");
    }

    #[tokio::test]
    async fn retry_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(3, Duration::ZERO, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(anyhow!("flaky"))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn blank_query_short_circuits() {
        let tool = WebSearchTool::new();
        assert_eq!(tool.execute(&json!({"query": "   "})).await, "(no query)");
        assert_eq!(tool.execute(&json!({})).await, "(no query)");
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_unavailable() {
        let tool = WebSearchTool::new().with_endpoint("http://127.0.0.1:9/lite/", Duration::ZERO);
        let out = tool.search("weather in Austin").await;
        assert!(out.starts_with("(search unavailable:"), "{out}");
    }
}
