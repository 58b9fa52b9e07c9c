//! Defines the public API for the server role.
//!
//! This module declares the sub-modules for the server implementation and
//! re-exports the primary, public-facing types like `Server` and
//! `SessionHandle`.

mod server;
pub mod session; // Made public for integration tests

pub use server::Server;
pub use session::{ServerSession, SessionHandle};
