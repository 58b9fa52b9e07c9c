//! The client-side capability for answering server-initiated sampling
//! requests.

use crate::error::Result;
use crate::types::{CreateMessageParams, CreateMessageResult};
use async_trait::async_trait;

/// Answers `sampling/createMessage` requests on behalf of a client.
///
/// A session holds at most one resolver, supplied at construction via
/// [`crate::client::Client::connect_with_resolver`]. Implementations may
/// take as long as they need (prompting a human, calling a model), because
/// the session invokes them on their own task, never on the frame-reading
/// path. A terminal implementation that reads stdin should
/// still wrap the blocking read in `tokio::task::spawn_blocking`.
#[async_trait]
pub trait SamplingResolver: Send + Sync {
    async fn resolve(&self, params: CreateMessageParams) -> Result<CreateMessageResult>;
}
