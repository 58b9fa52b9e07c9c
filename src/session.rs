//! Shared session machinery used by both peers of a connection.
//!
//! The protocol is symmetric: either side may act as requester or responder
//! on the same stream. This module holds the pieces both roles share: the
//! session lifecycle state machine, correlation-id allocation, the
//! pending-request table, and inbound frame classification. The role-specific
//! receive loops live in [`crate::server`] and [`crate::client`].

use crate::error::{Error, Result};
use crate::types::{JSONRPCResponse, RequestId};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

// --- Lifecycle ---

/// The lifecycle of one connected session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Transport established, no messages exchanged.
    Connecting = 0,
    /// `initialize` in flight; the responder accepts nothing else yet.
    Initializing = 1,
    /// Full duplex traffic allowed in both directions.
    Ready = 2,
    /// Teardown begun: pending requests are being cancelled, new requests
    /// fail locally without touching the transport.
    Closing = 3,
    /// Terminal; transport released.
    Closed = 4,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Connecting,
            1 => SessionState::Initializing,
            2 => SessionState::Ready,
            3 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// Shared, atomically updated view of a session's state, cloned into every
/// handle that needs to check liveness before issuing a request.
#[derive(Clone, Default)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(SessionState::Connecting as u8)))
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// True while requests may still be issued through this session.
    pub fn is_open(&self) -> bool {
        matches!(
            self.get(),
            SessionState::Connecting | SessionState::Initializing | SessionState::Ready
        )
    }
}

// --- Correlation ---

/// Allocates monotonically increasing request ids for one direction of a
/// connection. Each peer numbers its own outgoing requests; responses are
/// matched against the issuer's own table, so the two streams of ids never
/// collide.
#[derive(Clone)]
pub struct IdGenerator {
    next: Arc<AtomicI64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn next_id(&self) -> RequestId {
        RequestId::Num(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) type ResponseResult = Result<Value>;
pub(crate) type ResponseSender = oneshot::Sender<ResponseResult>;

/// The in-flight `id → completion slot` table for one direction of a
/// connection.
///
/// An entry must be registered *before* the request is written to the
/// transport, so a very fast response cannot race the table. Each entry is
/// resolved exactly once and removed; a response carrying an unknown id is a
/// protocol error.
#[derive(Clone, Default)]
pub struct PendingRequests {
    table: Arc<DashMap<RequestId, ResponseSender>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a completion slot for `id` and returns the receiver the
    /// issuing call awaits on.
    pub(crate) fn register(&self, id: RequestId) -> oneshot::Receiver<ResponseResult> {
        let (tx, rx) = oneshot::channel();
        self.table.insert(id, tx);
        rx
    }

    /// Registers an externally created completion slot for `id`, used when
    /// the issuing call already holds the receiving half.
    pub(crate) fn insert(&self, id: RequestId, sender: ResponseSender) {
        self.table.insert(id, sender);
    }

    /// Removes the slot for `id` without resolving it, e.g. after a timeout.
    /// Any answer arriving later is then treated as an unknown id.
    pub(crate) fn forget(&self, id: &RequestId) {
        self.table.remove(id);
    }

    /// Resolves the pending entry matching a raw response frame.
    ///
    /// Returns a connection-fatal [`Error::Protocol`] if the frame carries an
    /// id with no pending entry or cannot be parsed as a response.
    pub(crate) fn resolve_frame(&self, raw: Value) -> Result<()> {
        let id: RequestId = serde_json::from_value(
            raw.get("id")
                .cloned()
                .ok_or_else(|| Error::Protocol("response frame without an id".to_string()))?,
        )
        .map_err(|_| Error::Protocol("response frame with a malformed id".to_string()))?;

        let (_, sender) = self
            .table
            .remove(&id)
            .ok_or_else(|| Error::Protocol(format!("response with unknown id {:?}", id)))?;

        let outcome = match serde_json::from_value::<JSONRPCResponse<Value>>(raw) {
            Ok(JSONRPCResponse::Success(success)) => Ok(success.result),
            Ok(JSONRPCResponse::Error(err)) => Err(Error::JsonRpc(err.error)),
            Err(e) => {
                return Err(Error::Protocol(format!(
                    "unparseable response for id {:?}: {}",
                    id, e
                )))
            }
        };
        // The receiver may already be gone (caller timed out); that is fine.
        if sender.send(outcome).is_err() {
            debug!(?id, "response arrived after the caller stopped waiting");
        }
        Ok(())
    }

    /// Rejects every in-flight entry with an error produced by `make_err`.
    /// Used during teardown so no caller is ever left hanging.
    pub(crate) fn abort_all(&self, make_err: impl Fn() -> Error) {
        let ids: Vec<RequestId> = self.table.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, sender)) = self.table.remove(&id) {
                let _ = sender.send(Err(make_err()));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

// --- Frame classification ---

/// What an inbound frame is, decided purely from its envelope fields.
/// A request carries `method` and `id`; a notification carries `method`
/// without `id`; a response carries `id` without `method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Request,
    Notification,
    Response,
    Invalid,
}

pub fn classify(frame: &Value) -> FrameKind {
    let has_method = frame.get("method").map_or(false, Value::is_string);
    let has_id = frame.get("id").is_some();
    match (has_method, has_id) {
        (true, true) => FrameKind::Request,
        (true, false) => FrameKind::Notification,
        (false, true) => FrameKind::Response,
        (false, false) => FrameKind::Invalid,
    }
}
