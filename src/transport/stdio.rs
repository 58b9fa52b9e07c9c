// src/transport/stdio.rs
use super::r#trait::Transport;
use crate::error::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};

/// Newline-delimited JSON over this process's own stdin/stdout.
///
/// This is the server side of a stdio-served connection: the parent process
/// that spawned us holds the other end of the pipes. Anything the process
/// wants a human to see must go to stderr, since stdout carries frames.
pub struct StdioTransport {
    writer: Stdout,
    reader: BufReader<Stdin>,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self {
            writer: tokio::io::stdout(),
            reader: BufReader::new(tokio::io::stdin()),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&mut self, msg: &str) -> Result<()> {
        self.writer.write_all(msg.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
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
        self.writer.flush().await?;
        Ok(())
    }
}
