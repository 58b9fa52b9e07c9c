//! Interactive demo client. Spawns a stdio server (the command is taken from
//! the argument list), lists its tools, then runs a small prompt loop that
//! calls `delete_file` for each path the user types. Whenever the server asks
//! for confirmation through `sampling/createMessage`, the question is put to
//! the user on the terminal and the typed answer is sent back.
//!
//! ```text
//! cargo run -p confirm-client -- cargo run -p file-guard
//! ```

use async_trait::async_trait;
use mcp_duplex::transport::ChildProcessTransport;
use mcp_duplex::types::{CreateMessageParams, CreateMessageResult};
use mcp_duplex::{Client, Error, Result, SamplingResolver};
use serde_json::json;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::info;

/// Answers sampling requests by showing the prompt on the terminal and
/// reading one line from stdin. The blocking read runs on the blocking pool
/// so the session's receive loop keeps draining frames while the user thinks.
struct StdinResolver;

#[async_trait]
impl SamplingResolver for StdinResolver {
    async fn resolve(&self, params: CreateMessageParams) -> Result<CreateMessageResult> {
        let prompt = params
            .messages
            .first()
            .and_then(|m| m.content.as_text())
            .unwrap_or("> ")
            .to_string();

        let line = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut out = std::io::stderr();
            write!(out, "{}", prompt)?;
            out.flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|_| Error::Protocol("stdin reader task failed".to_string()))??;

        Ok(CreateMessageResult::user_text(line.trim().to_string()))
    }
}

fn read_path_prompt() -> std::io::Result<Option<String>> {
    let mut out = std::io::stderr();
    write!(out, "file to delete (empty line quits): ")?;
    out.flush()?;
    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut argv = std::env::args().skip(1);
    let command = argv.next().ok_or_else(|| {
        Error::Protocol("usage: confirm-client <server-command> [args...]".to_string())
    })?;
    let args: Vec<String> = argv.collect();

    info!(%command, "spawning server");
    let transport = ChildProcessTransport::spawn(&command, &args)?;
    let client = Client::connect_with_resolver(transport, Arc::new(StdinResolver)).await?;

    let tools = client.list_tools().await?;
    for tool in &tools {
        eprintln!("tool: {}: {}", tool.name, tool.description.as_deref().unwrap_or(""));
    }

    loop {
        let path = match tokio::task::spawn_blocking(read_path_prompt)
            .await
            .map_err(|_| Error::Protocol("stdin reader task failed".to_string()))??
        {
            Some(path) => path,
            None => break,
        };

        let result = client.call_tool("delete_file", json!({ "path": path })).await?;
        let text = result
            .content
            .first()
            .and_then(|c| c.as_text())
            .unwrap_or("");
        if result.is_error {
            eprintln!("error: {}", text);
        } else {
            eprintln!("{}", text);
        }
    }

    client.close().await
}
