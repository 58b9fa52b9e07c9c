//! Defines the public API for the client role.

mod client;
pub mod session; // Made public for integration tests

pub use client::Client;
pub use session::ClientSession;
