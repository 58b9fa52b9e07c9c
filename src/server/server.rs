//! Defines the main `Server` struct and its builder API for registering tools.

use super::session::{ServerSession, SessionHandle};
use crate::{
    error::{Error, Result},
    protocol::ProtocolConnection,
    schema::InputSchema,
    transport::Transport,
    types::{CallToolResult, Tool},
};
use serde_json::Value;
use std::collections::HashMap;
use std::{future::Future, pin::Pin, sync::Arc, time::Duration};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

// Type alias for the boxed future returned by handlers
type BoxedFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

pub(crate) type ToolHandler =
    Box<dyn Fn(SessionHandle, Value) -> BoxedFuture<Result<CallToolResult>> + Send + Sync>;

/// A registered tool: its advertised metadata, the structural schema its
/// arguments are checked against, and the handler that runs validated calls.
pub(crate) struct RegisteredTool {
    pub(crate) tool: Tool,
    pub(crate) schema: InputSchema,
    pub(crate) handler: ToolHandler,
}

/// A tool-serving peer.
///
/// `Server` uses a builder pattern to register tools, then serves one or more
/// connections. Each connection gets its own [`ServerSession`]; each inbound
/// `tools/call` runs on its own task, so a handler suspended on a sampling
/// request never stalls the receive loop or other calls.
///
/// # Example
///
/// ```no_run
/// use mcp_duplex::schema::{FieldKind, InputSchema};
/// use mcp_duplex::server::Server;
/// use mcp_duplex::transport::StdioTransport;
/// use mcp_duplex::types::CallToolResult;
/// use mcp_duplex::Result;
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let server = Server::new("echo-server").register_tool(
///         "echo",
///         "Echoes its input back",
///         InputSchema::new().required("text", FieldKind::String, "Text to echo"),
///         |_handle, args| async move {
///             Ok(CallToolResult::text(args["text"].as_str().unwrap_or_default()))
///         },
///     )?;
///
///     server.serve(StdioTransport::new()).await
/// }
/// ```
pub struct Server {
    pub(crate) name: String,
    // Insertion order is the order `tools/list` advertises.
    pub(crate) tools: Vec<RegisteredTool>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) sampling_timeout: Option<Duration>,
}

impl Server {
    /// Creates a new `Server` builder.
    ///
    /// # Arguments
    ///
    /// * `name` - A name for the server implementation, e.g., "file-guard".
    ///   This is sent to the client during the initialization handshake.
    pub fn new(name: &str) -> Self {
        Server {
            name: name.to_string(),
            tools: Vec::new(),
            index: HashMap::new(),
            sampling_timeout: None,
        }
    }

    /// Sets a deadline for sampling requests issued from handlers on this
    /// server. Without one, a sampling request waits until the client answers
    /// or the connection closes.
    pub fn sampling_timeout(mut self, limit: Duration) -> Self {
        self.sampling_timeout = Some(limit);
        self
    }

    /// Registers a tool: its metadata, argument schema, and execution handler.
    ///
    /// Fails with [`Error::DuplicateToolName`] if a tool with the same name
    /// is already registered; the first registration remains active.
    pub fn register_tool<F, Fut>(
        mut self,
        name: &str,
        description: &str,
        schema: InputSchema,
        handler: F,
    ) -> Result<Self>
    where
        F: Fn(SessionHandle, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallToolResult>> + Send + 'static,
    {
        if self.index.contains_key(name) {
            return Err(Error::DuplicateToolName(name.to_string()));
        }
        let tool = Tool {
            name: name.to_string(),
            description: Some(description.to_string()),
            input_schema: schema.to_json(),
        };
        self.index.insert(name.to_string(), self.tools.len());
        self.tools.push(RegisteredTool {
            tool,
            schema,
            handler: Box::new(move |handle, args| Box::pin(handler(handle, args))),
        });
        Ok(self)
    }

    /// Returns the advertised tool descriptors, in registration order.
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|r| r.tool.clone()).collect()
    }

    /// Looks up, validates, and runs one tool call.
    ///
    /// Every failure mode short of a broken connection (unknown tool,
    /// invalid arguments, a handler error) comes back as a `CallToolResult`
    /// with `is_error` set, so the caller always receives a response frame.
    pub(crate) async fn run_tool(
        self: &Arc<Self>,
        handle: SessionHandle,
        name: &str,
        arguments: Value,
    ) -> CallToolResult {
        let registered = match self.index.get(name) {
            Some(&i) => &self.tools[i],
            None => {
                warn!(tool = %name, "call for unknown tool");
                return CallToolResult::failure(format!("unknown tool '{}'", name));
            }
        };
        if let Err(details) = registered.schema.validate(&arguments) {
            warn!(tool = %name, %details, "rejected tool arguments");
            return CallToolResult::failure(format!(
                "invalid arguments for '{}': {}",
                name, details
            ));
        }
        match (registered.handler)(handle, arguments).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %name, error = %e, "tool handler failed");
                CallToolResult::failure(e.to_string())
            }
        }
    }

    /// Runs a session over a single, pre-existing transport. Returns when the
    /// peer disconnects or a protocol error tears the connection down.
    pub async fn serve<T>(self, transport: T) -> Result<()>
    where
        T: Transport + 'static,
    {
        Arc::new(self).handle_connection(transport).await
    }

    /// Takes a single transport and runs a session for it. This is the core
    /// logic block used by both `serve` and `tcp_listen`.
    pub async fn handle_connection<T>(self: Arc<Self>, transport: T) -> Result<()>
    where
        T: Transport + 'static,
    {
        let conn = ProtocolConnection::new(transport);
        let session = ServerSession::new(conn, self);
        session.run().await
    }

    /// Starts a TCP listener and enters the accept loop.
    ///
    /// For each incoming client connection a new task handles that
    /// connection's entire lifecycle, so multiple clients are served
    /// concurrently. Runs indefinitely until the process is terminated or the
    /// listener fails.
    pub async fn tcp_listen<T>(self, addr: &str) -> Result<()>
    where
        T: Transport + From<TcpStream> + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        info!(server = %self.name, %addr, "listening");
        let server = Arc::new(self);

        loop {
            let (stream, client_addr) = listener.accept().await?;
            info!(%client_addr, "accepted connection");
            let server_clone = Arc::clone(&server);

            tokio::spawn(async move {
                let transport = T::from(stream);
                if let Err(e) = server_clone.handle_connection(transport).await {
                    error!(%client_addr, error = %e, "session failed");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;
    use serde_json::json;

    fn echo_server() -> Server {
        Server::new("test-server")
            .register_tool(
                "echo",
                "Echoes its input back",
                InputSchema::new().required("text", FieldKind::String, "Text to echo"),
                |_handle, args| async move {
                    Ok(CallToolResult::text(
                        args["text"].as_str().unwrap_or_default(),
                    ))
                },
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_tool_registration_and_listing() {
        let server = echo_server();
        let tools = server.tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");
        assert_eq!(tools[0].input_schema["required"], json!(["text"]));
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails_and_keeps_first() {
        let result = echo_server().register_tool(
            "echo",
            "A second echo",
            InputSchema::new(),
            |_handle, _args| async move { Ok(CallToolResult::text("second")) },
        );
        match result {
            Err(Error::DuplicateToolName(name)) => assert_eq!(name, "echo"),
            _ => panic!("expected DuplicateToolName"),
        }
    }

    #[tokio::test]
    async fn test_list_order_matches_registration_order() {
        let server = Server::new("ordered")
            .register_tool("b", "", InputSchema::new(), |_h, _a| async {
                Ok(CallToolResult::default())
            })
            .unwrap()
            .register_tool("a", "", InputSchema::new(), |_h, _a| async {
                Ok(CallToolResult::default())
            })
            .unwrap();
        let names: Vec<_> = server.tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_run_tool_unknown_tool_is_failure_result() {
        let server = Arc::new(echo_server());
        let handle = SessionHandle::detached();
        let result = server.run_tool(handle, "missing", json!({})).await;
        assert!(result.is_error);
        assert!(result.content[0]
            .as_text()
            .unwrap()
            .contains("unknown tool 'missing'"));
    }

    #[tokio::test]
    async fn test_run_tool_invalid_arguments_is_failure_result() {
        let server = Arc::new(echo_server());
        let handle = SessionHandle::detached();
        let result = server.run_tool(handle, "echo", json!({})).await;
        assert!(result.is_error);
        assert!(result.content[0]
            .as_text()
            .unwrap()
            .contains("missing required field 'text'"));
    }

    #[tokio::test]
    async fn test_run_tool_success() {
        let server = Arc::new(echo_server());
        let handle = SessionHandle::detached();
        let result = server.run_tool(handle, "echo", json!({ "text": "hi" })).await;
        assert!(!result.is_error);
        assert_eq!(result.content[0].as_text(), Some("hi"));
    }
}
