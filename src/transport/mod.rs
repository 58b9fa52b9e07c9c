// src/transport/mod.rs
pub mod child;
pub mod ndjson;
pub mod stdio;
pub mod r#trait; // Using r# to use the keyword `trait` as a module name

pub use child::ChildProcessTransport;
pub use ndjson::NdjsonTransport;
pub use r#trait::Transport;
pub use stdio::StdioTransport;
