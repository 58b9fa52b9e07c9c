// src/transport/child.rs
use super::r#trait::Transport;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::warn;

/// Spawns a server process and exchanges newline-delimited JSON over its
/// stdin/stdout. This is the client side of a stdio-served connection.
///
/// The child's stderr is inherited so its own logging stays visible on the
/// terminal.
pub struct ChildProcessTransport {
    child: Child,
    // None once closed; dropping the handle sends EOF to the child.
    writer: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
}

impl ChildProcessTransport {
    /// Spawns `command args...` with piped stdin/stdout.
    pub fn spawn<I, S>(command: &str, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let writer = child
            .stdin
            .take()
            .ok_or_else(|| Error::Protocol("child process has no stdin pipe".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Protocol("child process has no stdout pipe".to_string()))?;

        Ok(Self {
            child,
            writer: Some(writer),
            reader: BufReader::new(stdout),
        })
    }
}

#[async_trait]
impl Transport for ChildProcessTransport {
    async fn send(&mut self, msg: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Error::SessionClosed)?;
        writer.write_all(msg.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) => Ok(None),
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                }
                if line.ends_with('\r') {
                    line.pop();
                }
                Ok(Some(line))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the stdin handle delivers EOF, which tells a well-behaved
        // server to exit; then reap it.
        drop(self.writer.take());
        if let Err(e) = self.child.wait().await {
            warn!("failed to reap child server process: {}", e);
        }
        Ok(())
    }
}
