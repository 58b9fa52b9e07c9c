// src/transport/trait.rs
use crate::error::Result;
use async_trait::async_trait;

/// A framed duplex byte stream carrying one JSON document per frame.
///
/// `recv` yields frames until the peer closes the stream, at which point it
/// returns `Ok(None)`; it is not restartable after that. I/O failures and
/// malformed frames surface as errors so the session can tear the connection
/// down instead of silently dropping traffic.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&mut self, msg: &str) -> Result<()>;
    async fn recv(&mut self) -> Result<Option<String>>;

    /// Releases the underlying stream. The default is a no-op for transports
    /// whose resources are reclaimed on drop.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
