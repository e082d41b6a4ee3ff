//! Raw stream-socket backend.
//!
//! A connection-oriented local-domain byte stream. Writes carry the exact
//! encoded record with no length prefix, and each receive performs a single
//! read, so record boundaries survive only under the strict
//! one-send-per-recv lockstep discipline. Any future batching would need
//! explicit framing; use [`QueueTransport`](super::QueueTransport) for that.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use crate::error::{BridgeError, Result};
use crate::transport::{Role, Transport, setup, validate_addr};

#[derive(Debug)]
pub struct StreamTransport {
    role: Role,
    path: PathBuf,
    stream: UnixStream,
    cleaned: bool,
}

impl StreamTransport {
    /// Open one endpoint. The server binds, listens and accepts exactly one
    /// connection before returning; the client connects.
    pub async fn open(addr: &str, role: Role) -> Result<Self> {
        validate_addr(addr)?;
        let path = PathBuf::from(addr);

        let stream = match role {
            Role::Server => {
                if path.exists() {
                    std::fs::remove_file(&path).map_err(setup("unlink"))?;
                }
                let listener = UnixListener::bind(&path).map_err(setup("bind"))?;
                tracing::debug!(addr, "stream endpoint listening");
                let (stream, _) = listener.accept().await.map_err(setup("accept"))?;
                tracing::debug!(addr, "device connected");
                stream
            }
            Role::Client => {
                let stream = UnixStream::connect(&path).await.map_err(setup("connect"))?;
                tracing::debug!(addr, "connected to orchestrator");
                stream
            }
        };

        Ok(Self {
            role,
            path,
            stream,
            cleaned: false,
        })
    }

    fn unlink(&mut self) -> std::io::Result<()> {
        if self.role == Role::Server && !self.cleaned {
            self.cleaned = true;
            if self.path.exists() {
                tracing::debug!(path = %self.path.display(), "unlinking stream endpoint");
                std::fs::remove_file(&self.path)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for StreamTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        tracing::trace!(len = bytes.len(), "stream send");
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.stream.read(buf).await?;
        if n == 0 {
            return Err(BridgeError::Desync(
                "peer closed the stream mid-session".to_string(),
            ));
        }
        tracing::trace!(len = n, "stream recv");
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.stream.shutdown().await;
        self.unlink()?;
        Ok(())
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        if let Err(e) = self.unlink() {
            tracing::warn!(error = %e, "failed to unlink stream endpoint");
        }
    }
}
