//! A stdio-served demo server exposing a `web_search` tool backed by an HTTP
//! search API. Configure with `SEARCH_API_KEY` (required), `SEARCH_API_URL`,
//! and `SEARCH_RECORDS_DIR`; each search writes a JSON record to the records
//! directory.

mod search;

use mcp_duplex::schema::{FieldKind, InputSchema};
use mcp_duplex::transport::StdioTransport;
use mcp_duplex::{Result, Server};
use search::{SearchConfig, Searcher};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout carries the protocol frames, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match SearchConfig::from_env() {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
    };
    let searcher = Arc::new(Searcher::new(config));

    let server = Server::new("web-search").register_tool(
        "web_search",
        "Searches the internet and returns a digest of the results",
        InputSchema::new().required("query", FieldKind::String, "What to search for"),
        move |_handle, args: Value| {
            let searcher = Arc::clone(&searcher);
            async move {
                let query = args["query"].as_str().unwrap_or_default().to_string();
                Ok(searcher.search(&query).await)
            }
        },
    )?;

    info!("web-search serving on stdio");
    server.serve(StdioTransport::new()).await
}
