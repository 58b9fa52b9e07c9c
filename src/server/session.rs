//! Defines the ServerSession, which manages the state and logic for a single
//! client connection, and the SessionHandle given to tool handlers.

use super::server::Server;
use crate::error::{Error, Result};
use crate::protocol::ProtocolConnection;
use crate::session::{classify, FrameKind, IdGenerator, PendingRequests, SessionState, StateCell};
use crate::transport::Transport;
use crate::types::{
    CallToolParams, CreateMessageParams, CreateMessageResult, ErrorResponse, Implementation,
    InitializeRequestParams, InitializeResult, ListToolsResult, Request, Response,
    SamplingMessage, ServerCapabilities, ToolsCapability, INVALID_PARAMS, LATEST_PROTOCOL_VERSION,
    METHOD_CALL_TOOL, METHOD_CREATE_MESSAGE, METHOD_INITIALIZE, METHOD_LIST_TOOLS,
    METHOD_NOT_FOUND,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// A handle given to tool handlers, allowing them to talk back to the client
/// mid-execution.
///
/// The handle is a non-owning reference into the session: it shares the
/// session's outbound channel, pending-request table, and state. Cloning it
/// is cheap, and a handler may hold it across await points.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) outbound: mpsc::Sender<String>,
    pub(crate) pending: PendingRequests,
    pub(crate) ids: IdGenerator,
    pub(crate) state: StateCell,
    pub(crate) sampling_timeout: Option<Duration>,
}

impl SessionHandle {
    /// Sends a `sampling/createMessage` request to the client and suspends
    /// this handler until the client resolves it.
    ///
    /// Only the calling handler is parked: the session's receive loop and any
    /// other in-flight tool calls continue. Fails with
    /// [`Error::SessionClosed`] if the session is already shutting down,
    /// [`Error::SamplingInterrupted`] if it closes while waiting, and
    /// [`Error::SamplingTimeout`] if the server's configured deadline elapses
    /// first. A client without a sampling resolver answers with a JSON-RPC
    /// error, surfaced here as [`Error::JsonRpc`].
    pub async fn create_message(
        &self,
        messages: Vec<SamplingMessage>,
        max_tokens: u32,
    ) -> Result<CreateMessageResult> {
        if !self.state.is_open() {
            return Err(Error::SessionClosed);
        }

        let id = self.ids.next_id();
        // Register before sending so the answer cannot race the table.
        let rx = self.pending.register(id.clone());
        // Re-check after registering: if teardown swept the table before this
        // entry landed, the state is already Closing and nobody will abort it.
        if !self.state.is_open() {
            self.pending.forget(&id);
            return Err(Error::SessionClosed);
        }
        let request = Request::new(
            id.clone(),
            METHOD_CREATE_MESSAGE,
            CreateMessageParams {
                messages,
                max_tokens,
            },
        )?;
        let json = serde_json::to_string(&request)?;
        if self.outbound.send(json).await.is_err() {
            self.pending.forget(&id);
            return Err(Error::SessionClosed);
        }

        let outcome = match self.sampling_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    // A late answer now counts as an unknown id.
                    self.pending.forget(&id);
                    return Err(Error::SamplingTimeout);
                }
            },
            None => rx.await,
        };
        // A dropped sender means the session tore down without aborting us
        // explicitly; either way the exchange is over.
        let raw = outcome.map_err(|_| Error::SamplingInterrupted)??;
        Ok(serde_json::from_value(raw)?)
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (outbound, _rx) = mpsc::channel(1);
        let state = StateCell::new();
        state.set(SessionState::Ready);
        Self {
            outbound,
            pending: PendingRequests::new(),
            ids: IdGenerator::new(),
            state,
            sampling_timeout: None,
        }
    }
}

/// Represents a single, active client connection and manages its lifecycle.
pub struct ServerSession<T: Transport> {
    connection: ProtocolConnection<T>,
    server: Arc<Server>,
    state: StateCell,
    pending: PendingRequests,
    ids: IdGenerator,
}

impl<T: Transport + Send + 'static> ServerSession<T> {
    pub fn new(connection: ProtocolConnection<T>, server: Arc<Server>) -> Self {
        Self {
            connection,
            server,
            state: StateCell::new(),
            pending: PendingRequests::new(),
            ids: IdGenerator::new(),
        }
    }

    /// Runs the receive loop until the peer disconnects or a protocol error
    /// tears the connection down. Teardown rejects every pending sampling
    /// exchange, then waits for in-flight handler tasks and flushes their
    /// responses before releasing the transport, so a peer that half-closes
    /// after sending a call still receives its answer.
    pub async fn run(mut self) -> Result<()> {
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(64);

        let result = loop {
            tokio::select! {
                read = self.connection.recv_message::<Value>() => {
                    match read {
                        Ok(Some(frame)) => {
                            if let Err(e) = self.handle_frame(frame, &outbound_tx).await {
                                error!(error = %e, "tearing down session");
                                break Err(e);
                            }
                        }
                        Ok(None) => {
                            debug!("client closed the connection");
                            break Ok(());
                        }
                        Err(e) => {
                            break Err(Error::Protocol(format!("malformed frame: {}", e)));
                        }
                    }
                },
                Some(json) = outbound_rx.recv() => {
                    if let Err(e) = self.connection.send_raw(&json).await {
                        break Err(e);
                    }
                }
            }
        };

        self.state.set(SessionState::Closing);
        // Wake handlers suspended on a sampling exchange. `create_message`
        // re-checks the state after registering, so no entry can slip in
        // behind this sweep.
        self.pending.abort_all(|| Error::SamplingInterrupted);
        // Dropping our sender leaves only the clones held by in-flight
        // handler tasks; the channel yields None once the last one finishes.
        // Draining to that point flushes every handler's response before the
        // transport is released.
        drop(outbound_tx);
        while let Some(json) = outbound_rx.recv().await {
            let _ = self.connection.send_raw(&json).await;
        }
        let _ = self.connection.close().await;
        self.state.set(SessionState::Closed);
        result
    }

    async fn handle_frame(&mut self, frame: Value, outbound: &mpsc::Sender<String>) -> Result<()> {
        match classify(&frame) {
            // Responses flowing client→server are sampling resolutions.
            FrameKind::Response => self.pending.resolve_frame(frame),
            FrameKind::Notification => {
                let method = frame.get("method").and_then(Value::as_str).unwrap_or("");
                debug!(%method, "ignoring notification");
                Ok(())
            }
            FrameKind::Invalid => Err(Error::Protocol(
                "frame is neither a request nor a response".to_string(),
            )),
            FrameKind::Request => {
                let req: Request<Value> = serde_json::from_value(frame)
                    .map_err(|e| Error::Protocol(format!("malformed request: {}", e)))?;
                if self.state.get() == SessionState::Ready {
                    self.dispatch_request(req, outbound).await
                } else if req.method == METHOD_INITIALIZE {
                    self.handle_initialize(req).await
                } else {
                    Err(Error::Protocol(format!(
                        "received '{}' before the initialize handshake completed",
                        req.method
                    )))
                }
            }
        }
    }

    async fn handle_initialize(&mut self, req: Request<Value>) -> Result<()> {
        self.state.set(SessionState::Initializing);
        let params: InitializeRequestParams = serde_json::from_value(req.params)
            .map_err(|e| Error::Protocol(format!("malformed initialize params: {}", e)))?;
        info!(
            client = %params.client_info.name,
            version = %params.client_info.version,
            "initialize handshake"
        );
        let response = Response::new(
            req.id,
            InitializeResult {
                protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability {
                        list_changed: Some(false),
                    }),
                },
                server_info: Implementation {
                    name: self.server.name.clone(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
            },
        )?;
        self.connection.send_serializable(response).await?;
        // Only now may the client send anything else.
        self.state.set(SessionState::Ready);
        Ok(())
    }

    async fn dispatch_request(
        &mut self,
        req: Request<Value>,
        outbound: &mpsc::Sender<String>,
    ) -> Result<()> {
        match req.method.as_str() {
            METHOD_LIST_TOOLS => {
                let response = Response::new(
                    req.id,
                    ListToolsResult {
                        tools: self.server.tools(),
                    },
                )?;
                self.connection.send_serializable(response).await
            }
            METHOD_CALL_TOOL => {
                let params: CallToolParams = match serde_json::from_value(req.params) {
                    Ok(p) => p,
                    Err(e) => {
                        let response = ErrorResponse::new(
                            req.id,
                            INVALID_PARAMS,
                            format!("malformed tools/call params: {}", e),
                        );
                        return self.connection.send_serializable(response).await;
                    }
                };
                self.spawn_tool_call(req.id, params, outbound);
                Ok(())
            }
            METHOD_INITIALIZE => Err(Error::Protocol(
                "client sent 'initialize' twice".to_string(),
            )),
            unhandled => {
                warn!(method = %unhandled, "request for unknown method");
                let response = ErrorResponse::new(
                    req.id,
                    METHOD_NOT_FOUND,
                    format!("Method '{}' not found", unhandled),
                );
                self.connection.send_serializable(response).await
            }
        }
    }

    /// Runs one tool call on its own task. The receive loop must never block
    /// on a handler: a handler suspended on `create_message` needs the loop
    /// free to deliver the client's answer, and independent calls must be
    /// able to overtake it.
    fn spawn_tool_call(
        &self,
        id: crate::types::RequestId,
        params: CallToolParams,
        outbound: &mpsc::Sender<String>,
    ) {
        let server = Arc::clone(&self.server);
        let handle = SessionHandle {
            outbound: outbound.clone(),
            pending: self.pending.clone(),
            ids: self.ids.clone(),
            state: self.state.clone(),
            sampling_timeout: server.sampling_timeout,
        };
        let outbound = outbound.clone();

        tokio::spawn(async move {
            let result = server
                .run_tool(handle, &params.name, params.arguments)
                .await;
            let json = Response::new(id, result).and_then(|r| serde_json::to_string(&r));
            match json {
                Ok(json) => {
                    // Session gone before the response could be queued.
                    if outbound.send(json).await.is_err() {
                        debug!(tool = %params.name, "session closed before tool response was sent");
                    }
                }
                Err(e) => error!(tool = %params.name, error = %e, "failed to encode tool response"),
            }
        });
    }
}
