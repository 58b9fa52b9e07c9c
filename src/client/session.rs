//! Defines the internal `ClientSession` that manages the connection's
//! background task.

use crate::error::{Error, Result};
use crate::protocol::ProtocolConnection;
use crate::sampling::SamplingResolver;
use crate::session::{classify, FrameKind, PendingRequests, ResponseSender, SessionState, StateCell};
use crate::transport::Transport;
use crate::types::{
    CreateMessageParams, ErrorResponse, Request, Response, INTERNAL_ERROR, INVALID_PARAMS,
    METHOD_CREATE_MESSAGE, METHOD_NOT_FOUND,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Work items handed from the [`crate::client::Client`] to its session task.
pub(crate) enum Command {
    Request(Request<Value>, ResponseSender),
    Shutdown,
}

/// The background half of a client: owns the connection, correlates
/// responses, and answers server-initiated sampling requests.
pub struct ClientSession<T: Transport> {
    connection: ProtocolConnection<T>,
    pending: PendingRequests,
    state: StateCell,
    resolver: Option<Arc<dyn SamplingResolver>>,
    command_rx: mpsc::Receiver<Command>,
}

impl<T: Transport + Send + 'static> ClientSession<T> {
    pub(crate) fn new(
        connection: ProtocolConnection<T>,
        pending: PendingRequests,
        state: StateCell,
        resolver: Option<Arc<dyn SamplingResolver>>,
        command_rx: mpsc::Receiver<Command>,
    ) -> Self {
        Self {
            connection,
            pending,
            state,
            resolver,
            command_rx,
        }
    }

    pub(crate) async fn run(mut self) -> Result<()> {
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(32);

        let result = loop {
            tokio::select! {
                biased;

                command = self.command_rx.recv() => {
                    match command {
                        Some(Command::Request(request, responder)) => {
                            // Register before sending so a fast response
                            // cannot race the table.
                            self.pending.insert(request.id.clone(), responder);
                            if let Err(e) = self.connection.send_serializable(request).await {
                                break Err(e);
                            }
                        }
                        Some(Command::Shutdown) | None => break Ok(()),
                    }
                },
                Some(json) = outbound_rx.recv() => {
                    if let Err(e) = self.connection.send_raw(&json).await {
                        break Err(e);
                    }
                },
                read = self.connection.recv_message::<Value>() => {
                    match read {
                        Ok(Some(frame)) => {
                            if let Err(e) = self.handle_frame(frame, &outbound_tx) {
                                error!(error = %e, "tearing down session");
                                break Err(e);
                            }
                        }
                        Ok(None) => {
                            info!("connection closed by server");
                            break Ok(());
                        }
                        Err(e) => {
                            break Err(Error::Protocol(format!("malformed frame: {}", e)));
                        }
                    }
                },
            }
        };

        self.state.set(SessionState::Closing);
        self.pending.abort_all(|| Error::SessionClosed);
        // Flush sampling replies already produced by resolver tasks.
        outbound_rx.close();
        while let Some(json) = outbound_rx.recv().await {
            let _ = self.connection.send_raw(&json).await;
        }
        let _ = self.connection.close().await;
        self.state.set(SessionState::Closed);
        result
    }

    fn handle_frame(&self, frame: Value, outbound: &mpsc::Sender<String>) -> Result<()> {
        match classify(&frame) {
            FrameKind::Response => self.pending.resolve_frame(frame),
            FrameKind::Notification => {
                let method = frame.get("method").and_then(Value::as_str).unwrap_or("");
                debug!(%method, "ignoring notification");
                Ok(())
            }
            FrameKind::Invalid => Err(Error::Protocol(
                "frame is neither a request nor a response".to_string(),
            )),
            // Requests flowing server→client: the roles invert and we are
            // the responder, reusing the same envelope in the opposite
            // direction.
            FrameKind::Request => {
                let req: Request<Value> = serde_json::from_value(frame)
                    .map_err(|e| Error::Protocol(format!("malformed request: {}", e)))?;
                match req.method.as_str() {
                    METHOD_CREATE_MESSAGE => {
                        self.spawn_sampling(req, outbound);
                        Ok(())
                    }
                    other => {
                        warn!(method = %other, "server requested unsupported method");
                        let reply = ErrorResponse::new(
                            req.id,
                            METHOD_NOT_FOUND,
                            format!("Method '{}' not found", other),
                        );
                        let outbound = outbound.clone();
                        let json = serde_json::to_string(&reply)?;
                        tokio::spawn(async move {
                            let _ = outbound.send(json).await;
                        });
                        Ok(())
                    }
                }
            }
        }
    }

    /// Runs the sampling resolver on its own task. The resolver may block on
    /// human input for an arbitrarily long time; the receive loop must stay
    /// free to deliver responses for the client's own in-flight requests.
    fn spawn_sampling(&self, req: Request<Value>, outbound: &mpsc::Sender<String>) {
        let resolver = self.resolver.clone();
        let outbound = outbound.clone();

        tokio::spawn(async move {
            let reply: std::result::Result<String, serde_json::Error> = match resolver {
                // Never hang the server silently: without a resolver the
                // exchange fails fast with an error response.
                None => serde_json::to_string(&ErrorResponse::new(
                    req.id,
                    METHOD_NOT_FOUND,
                    "no sampling resolver registered",
                )),
                Some(resolver) => match serde_json::from_value::<CreateMessageParams>(req.params) {
                    Err(e) => serde_json::to_string(&ErrorResponse::new(
                        req.id,
                        INVALID_PARAMS,
                        format!("malformed sampling params: {}", e),
                    )),
                    Ok(params) => match resolver.resolve(params).await {
                        Ok(resolution) => Response::new(req.id, resolution)
                            .and_then(|r| serde_json::to_string(&r)),
                        Err(e) => serde_json::to_string(&ErrorResponse::new(
                            req.id,
                            INTERNAL_ERROR,
                            format!("sampling resolver failed: {}", e),
                        )),
                    },
                },
            };
            match reply {
                Ok(json) => {
                    if outbound.send(json).await.is_err() {
                        debug!("session closed before sampling reply was sent");
                    }
                }
                Err(e) => error!(error = %e, "failed to encode sampling reply"),
            }
        });
    }
}
