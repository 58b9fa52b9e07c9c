//! The search backend: calls the configured HTTP search API, digests its
//! response, and saves one JSON record per request for offline inspection.

use mcp_duplex::types::CallToolResult;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

pub struct SearchConfig {
    pub api_url: String,
    pub api_key: String,
    pub records_dir: PathBuf,
}

impl SearchConfig {
    /// Reads the configuration from the environment. `SEARCH_API_KEY` is
    /// required; the other variables have defaults.
    pub fn from_env() -> Result<Self, String> {
        let api_key = std::env::var("SEARCH_API_KEY")
            .map_err(|_| "SEARCH_API_KEY is not set".to_string())?;
        let api_url = std::env::var("SEARCH_API_URL")
            .unwrap_or_else(|_| "https://open.bigmodel.cn/api/paas/v4/tools".to_string());
        let records_dir = std::env::var("SEARCH_RECORDS_DIR")
            .unwrap_or_else(|_| "logs/search_records".to_string());
        Ok(Self {
            api_url,
            api_key,
            records_dir: PathBuf::from(records_dir),
        })
    }
}

/// What gets written to the records directory for each search request.
#[derive(Serialize)]
struct SearchRecord<'a> {
    request_id: &'a str,
    query: &'a str,
    status: &'a str,
    elapsed_ms: u64,
    result: Option<&'a str>,
    error: Option<&'a str>,
}

pub struct Searcher {
    http: reqwest::Client,
    config: SearchConfig,
    seq: AtomicU64,
}

impl Searcher {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            seq: AtomicU64::new(0),
        }
    }

    /// Runs one search and reports the outcome as a tool result. Every
    /// failure mode comes back as a failure result rather than an error, so
    /// the session stays up no matter what the search API does.
    pub async fn search(&self, query: &str) -> CallToolResult {
        let started = Instant::now();
        let request_id = self.next_request_id();
        info!(%request_id, %query, "search request");

        let response = self
            .http
            .post(&self.config.api_url)
            .header("Authorization", &self.config.api_key)
            .json(&json!({
                "tool": "web-search-pro",
                "messages": [{ "role": "user", "content": query }],
                "stream": false,
            }))
            .send()
            .await;

        let outcome = match response {
            Err(e) => Err(format!("search request failed: {}", e)),
            Ok(resp) if !resp.status().is_success() => Err(format!(
                "search request failed: HTTP {}",
                resp.status().as_u16()
            )),
            Ok(resp) => match resp.json::<Value>().await {
                Err(e) => Err(format!("could not parse search response: {}", e)),
                Ok(body) => Ok(extract_search_content(&body)),
            },
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(result) => {
                info!(%request_id, elapsed_ms, chars = result.len(), "search complete")
            }
            Err(e) => warn!(%request_id, elapsed_ms, error = %e, "search failed"),
        }
        self.save_record(&request_id, query, elapsed_ms, &outcome)
            .await;

        match outcome {
            Ok(result) => CallToolResult::text(result),
            Err(msg) => CallToolResult::failure(msg),
        }
    }

    fn next_request_id(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", nanos, seq)
    }

    // A record that cannot be written is logged and dropped; the search
    // result itself is never held hostage to record-keeping.
    async fn save_record(
        &self,
        request_id: &str,
        query: &str,
        elapsed_ms: u64,
        outcome: &Result<String, String>,
    ) {
        let record = SearchRecord {
            request_id,
            query,
            status: if outcome.is_ok() { "success" } else { "error" },
            elapsed_ms,
            result: outcome.as_ref().ok().map(String::as_str),
            error: outcome.as_ref().err().map(String::as_str),
        };
        let bytes = match serde_json::to_vec_pretty(&record) {
            Ok(b) => b,
            Err(e) => {
                warn!(%request_id, error = %e, "could not serialize search record");
                return;
            }
        };
        if let Err(e) = tokio::fs::create_dir_all(&self.config.records_dir).await {
            warn!(%request_id, error = %e, "could not create records directory");
            return;
        }
        let path = self
            .config
            .records_dir
            .join(format!("search_{}.json", request_id));
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => info!(%request_id, path = %path.display(), "search record saved"),
            Err(e) => warn!(%request_id, error = %e, "could not save search record"),
        }
    }
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Digests the search API's response: every `content` entry under
/// `choices[].message.tool_calls[].search_result[]`, joined with blank lines.
/// Anything missing or of the wrong shape is skipped.
pub fn extract_search_content(response: &Value) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for choice in array(response, "choices") {
        let tool_calls = choice
            .get("message")
            .map(|m| array(m, "tool_calls"))
            .unwrap_or(&[]);
        for call in tool_calls {
            for result in array(call, "search_result") {
                if let Some(content) = result.get("content").and_then(Value::as_str) {
                    parts.push(content);
                }
            }
        }
    }
    parts.join("\n\n\n")
}
