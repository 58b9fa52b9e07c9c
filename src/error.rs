//! Defines the custom `Error` and `Result` types for the session library.

use crate::types::ErrorData;
use std::fmt;

/// The primary error type for the library.
///
/// This enum consolidates all possible failures that can occur within a
/// session, allowing users to programmatically handle different error
/// conditions. Tool-level failures (unknown tool, invalid arguments, a
/// handler returning an error) are *not* represented here: they travel as
/// ordinary [`crate::types::CallToolResult`] values with `is_error` set, so
/// a caller of `call_tool` only ever sees this type for connection-level or
/// session-level problems.
#[derive(Debug)]
pub enum Error {
    /// An error that occurred during I/O on the underlying transport
    /// (e.g., connection refused, broken pipe). Wraps a `std::io::Error`.
    Io(std::io::Error),

    /// An error that occurred during JSON serialization or deserialization.
    /// This indicates a malformed frame or a mismatch between the expected
    /// and received data structures.
    Serialization(serde_json::Error),

    /// The peer violated the protocol: a response carried a correlation id
    /// with no pending request, a frame was neither request nor response,
    /// or traffic arrived before the handshake completed. Connection-fatal.
    Protocol(String),

    /// A JSON-RPC error response was received from the peer. The request was
    /// well-formed, but the peer reported an error processing it.
    JsonRpc(ErrorData),

    /// A tool was registered under a name that is already taken. The first
    /// registration remains active.
    DuplicateToolName(String),

    /// A request was attempted after the session began closing, or the
    /// session's background task is gone. The transport was not touched.
    SessionClosed,

    /// The session closed while a sampling request was still waiting for the
    /// client's answer.
    SamplingInterrupted,

    /// A sampling request did not receive an answer within the configured
    /// deadline.
    SamplingTimeout,
}

/// A specialized `Result` type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

// --- Error Trait Implementation ---

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Serialization(e) => write!(f, "Serialization error: {}", e),
            Error::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            Error::JsonRpc(e) => write!(f, "JSON-RPC error (code {}): {}", e.code, e.message),
            Error::DuplicateToolName(name) => {
                write!(f, "A tool named '{}' is already registered", name)
            }
            Error::SessionClosed => write!(f, "Session is closed"),
            Error::SamplingInterrupted => {
                write!(f, "Session closed while a sampling request was pending")
            }
            Error::SamplingTimeout => write!(f, "Sampling request timed out"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

// --- From Implementations for Error Conversion ---

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err)
    }
}

impl From<ErrorData> for Error {
    fn from(err: ErrorData) -> Self {
        Error::JsonRpc(err)
    }
}

// The session's outbound channel closing means the background task is gone,
// which is indistinguishable from a closed session for the caller.
impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::SessionClosed
    }
}
