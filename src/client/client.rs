//! Defines the public-facing `Client` struct and its API methods.

use super::session::{ClientSession, Command};
use crate::{
    error::{Error, Result},
    protocol::ProtocolConnection,
    sampling::SamplingResolver,
    session::{IdGenerator, PendingRequests, SessionState, StateCell},
    transport::Transport,
    types::{
        CallToolParams, CallToolResult, ClientCapabilities, Implementation,
        InitializeRequestParams, InitializeResult, ListToolsParams, ListToolsResult, Request,
        SamplingCapability, Tool, LATEST_PROTOCOL_VERSION, METHOD_CALL_TOOL, METHOD_INITIALIZE,
        METHOD_LIST_TOOLS,
    },
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

/// A high-level, asynchronous client for a tool-serving peer.
///
/// The `Client` manages a persistent connection in a background task,
/// handling the request/response lifecycle and answering any
/// `sampling/createMessage` requests the server sends back through the
/// registered [`SamplingResolver`].
///
/// # Example
///
/// ```no_run
/// use mcp_duplex::client::Client;
/// use mcp_duplex::transport::NdjsonTransport;
/// use mcp_duplex::Result;
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let transport = NdjsonTransport::connect("127.0.0.1:8080").await?;
///     let client = Client::connect(transport).await?;
///
///     let tools = client.list_tools().await?;
///     println!("Available tools: {:?}", tools);
///
///     let result = client.call_tool("echo", json!({ "text": "hi" })).await?;
///     println!("Result: {:?}", result);
///
///     client.close().await
/// }
/// ```
pub struct Client {
    ids: IdGenerator,
    state: StateCell,
    pending: PendingRequests,
    command_tx: mpsc::Sender<Command>,
    session_handle: Option<JoinHandle<Result<()>>>,
}

impl Client {
    /// Connects over the given transport and performs the initialization
    /// handshake. The returned `Client` cannot answer sampling requests; a
    /// server asking for one receives a JSON-RPC error instead of hanging.
    pub async fn connect<T>(transport: T) -> Result<Self>
    where
        T: Transport + 'static,
    {
        Self::start(transport, None).await
    }

    /// Like [`Client::connect`], but registers the sampling resolver invoked
    /// for each server-initiated `sampling/createMessage` request. The
    /// resolver is fixed for the lifetime of the session.
    pub async fn connect_with_resolver<T>(
        transport: T,
        resolver: Arc<dyn SamplingResolver>,
    ) -> Result<Self>
    where
        T: Transport + 'static,
    {
        Self::start(transport, Some(resolver)).await
    }

    async fn start<T>(transport: T, resolver: Option<Arc<dyn SamplingResolver>>) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let can_sample = resolver.is_some();
        let connection = ProtocolConnection::new(transport);
        let pending = PendingRequests::new();
        let state = StateCell::new();
        let (command_tx, command_rx) = mpsc::channel(32);

        let session = ClientSession::new(
            connection,
            pending.clone(),
            state.clone(),
            resolver,
            command_rx,
        );
        let session_handle = tokio::spawn(session.run());

        let client = Self {
            ids: IdGenerator::new(),
            state,
            pending,
            command_tx,
            session_handle: Some(session_handle),
        };

        // Perform the initialize handshake before anything else may be sent.
        client.state.set(SessionState::Initializing);
        let init_params = InitializeRequestParams {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities {
                sampling: can_sample.then(SamplingCapability::default),
            },
            client_info: Implementation {
                name: "mcp-duplex-client".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        let init_result: InitializeResult =
            client.send_request(METHOD_INITIALIZE, init_params).await?;
        info!(
            server = %init_result.server_info.name,
            version = %init_result.server_info.version,
            "handshake complete"
        );
        client.state.set(SessionState::Ready);

        Ok(client)
    }

    /// True while the session is live and accepting requests.
    pub fn is_ready(&self) -> bool {
        self.state.get() == SessionState::Ready
    }

    /// Sends a generic request to the server and awaits the response.
    async fn send_request<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: serde::Serialize,
        R: DeserializeOwned,
    {
        // Fail locally once teardown has begun; the transport is not touched.
        if !self.state.is_open() {
            return Err(Error::SessionClosed);
        }
        let request = Request::new(self.ids.next_id(), method, params)?;
        let (tx, rx) = oneshot::channel();
        self.command_tx.send(Command::Request(request, tx)).await?;
        let value = rx.await.map_err(|_| Error::SessionClosed)??;
        Ok(serde_json::from_value(value)?)
    }

    // --- Public API Methods ---

    /// Sends a `tools/list` request to discover the server's tools.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let result: ListToolsResult = self.send_request(METHOD_LIST_TOOLS, ListToolsParams {}).await?;
        Ok(result.tools)
    }

    /// Sends a `tools/call` request to execute a tool on the server.
    ///
    /// Ordinary tool failures come back as a `CallToolResult` with
    /// `is_error` set; an `Err` from this method means the connection or
    /// session itself failed.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        self.send_request(
            METHOD_CALL_TOOL,
            CallToolParams {
                name: name.to_string(),
                arguments,
            },
        )
        .await
    }

    /// Shuts the session down: pending requests are rejected with
    /// [`Error::SessionClosed`] and the transport is released.
    pub async fn close(mut self) -> Result<()> {
        self.state.set(SessionState::Closing);
        let _ = self.command_tx.send(Command::Shutdown).await;
        if let Some(handle) = self.session_handle.take() {
            match handle.await {
                Ok(session_result) => session_result?,
                Err(_) => {}
            }
        }
        self.state.set(SessionState::Closed);
        Ok(())
    }
}

impl Drop for Client {
    /// Ensures the background connection task is terminated and no waiter is
    /// left hanging when the `Client` is dropped without `close`.
    fn drop(&mut self) {
        if let Some(handle) = self.session_handle.take() {
            handle.abort();
            self.pending.abort_all(|| Error::SessionClosed);
            self.state.set(SessionState::Closed);
        }
    }
}
