//! A stdio-served demo server exposing one dangerous tool, `delete_file`,
//! which asks the connected client for confirmation before touching the
//! filesystem. Pair it with the `confirm-client` demo:
//!
//! ```text
//! cargo run -p confirm-client -- cargo run -p file-guard
//! ```

use mcp_duplex::schema::{FieldKind, InputSchema};
use mcp_duplex::transport::StdioTransport;
use mcp_duplex::types::{CallToolResult, SamplingMessage};
use mcp_duplex::{Result, Server, SessionHandle};
use serde_json::Value;
use std::path::Path;
use tracing::info;

async fn delete_file(handle: SessionHandle, args: Value) -> Result<CallToolResult> {
    let path = args["path"].as_str().unwrap_or_default().to_string();

    // Don't bother the user with a confirmation for a file that isn't there.
    if !Path::new(&path).is_file() {
        return Ok(CallToolResult::failure(format!(
            "no such file: '{}'",
            path
        )));
    }

    let answer = handle
        .create_message(
            vec![SamplingMessage::user(format!(
                "confirm delete {}? (Y/N): ",
                path
            ))],
            100,
        )
        .await?;

    match answer.text().unwrap_or_default().trim() {
        "Y" | "y" => {
            tokio::fs::remove_file(&path).await?;
            info!(%path, "deleted file");
            Ok(CallToolResult::text(format!("deleted '{}'", path)))
        }
        other => {
            info!(%path, answer = %other, "deletion cancelled");
            Ok(CallToolResult::text(format!(
                "cancelled deletion of '{}'",
                path
            )))
        }
    }
}

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

    let server = Server::new("file-guard").register_tool(
        "delete_file",
        "Deletes a file after the user confirms the action",
        InputSchema::new().required("path", FieldKind::String, "Path of the file to delete"),
        delete_file,
    )?;

    info!("file-guard serving on stdio");
    server.serve(StdioTransport::new()).await
}
