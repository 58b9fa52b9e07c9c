//! A bidirectional Model Context Protocol session library.
//!
//! One duplex stream carries two interleaved request/response roles: the
//! client calls tools the server registered, and the server asks the client
//! for input mid-handler through the sampling subprotocol. Both directions
//! reuse the same id-correlated envelope; see [`session`] for the shared
//! machinery and [`server`]/[`client`] for the role-specific loops.

pub mod client;
pub mod error;
pub mod protocol;
pub mod sampling;
pub mod schema;
pub mod server;
pub mod session;
pub mod transport;
pub mod types;

pub use client::Client;
pub use error::{Error, Result};
pub use protocol::ProtocolConnection;
pub use sampling::SamplingResolver;
pub use schema::{FieldKind, InputSchema};
pub use server::{Server, SessionHandle};
pub use types::*;
