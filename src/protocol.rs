//! Defines the protocol layer for handling message serialization and deserialization.
//!
//! This layer sits on top of the `Transport` and provides a strongly-typed
//! interface for sending and receiving frames. It is responsible for all
//! `serde_json` operations, keeping the session logic clean and focused on
//! correlation and dispatch.

use crate::error::Result;
use crate::transport::Transport;
use serde::{de::DeserializeOwned, Serialize};

/// A connection that handles JSON framing over a generic `Transport`.
pub struct ProtocolConnection<T: Transport> {
    transport: T,
}

impl<T: Transport> ProtocolConnection<T> {
    /// Creates a new `ProtocolConnection` that will use the given transport
    /// for communication.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Serializes a message struct into a JSON string and sends it.
    pub async fn send_serializable<M: Serialize + Send + Sync>(&mut self, msg: M) -> Result<()> {
        let json_string = serde_json::to_string(&msg)?;
        self.transport.send(&json_string).await
    }

    /// Sends a raw, already-serialized JSON string.
    pub async fn send_raw(&mut self, json_string: &str) -> Result<()> {
        self.transport.send(json_string).await
    }

    /// Receives one frame and deserializes it into a message struct.
    ///
    /// Returns `Ok(None)` when the peer has closed the stream. Blank
    /// keep-alive lines are skipped, never mistaken for end-of-stream. A
    /// frame that is not valid JSON for `M` is an error, never silently
    /// dropped.
    pub async fn recv_message<M: DeserializeOwned>(&mut self) -> Result<Option<M>> {
        loop {
            match self.transport.recv().await? {
                Some(json_string) => {
                    if json_string.trim().is_empty() {
                        continue;
                    }
                    return Ok(Some(serde_json::from_str::<M>(&json_string)?));
                }
                None => return Ok(None), // Connection was closed
            }
        }
    }

    /// Releases the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}
