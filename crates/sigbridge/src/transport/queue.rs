//! Request/reply messaging backend.
//!
//! Length-delimited frames over a local-domain stream, so every send is
//! delivered to the peer as exactly one message regardless of how the kernel
//! coalesces or splits the underlying bytes. The strict one-reply-per-request
//! alternation is the caller's contract: a second send without an intervening
//! receive simply blocks behind the peer.

use std::path::PathBuf;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::{BridgeError, Result};
use crate::transport::{Role, Transport, setup, validate_addr};

#[derive(Debug)]
pub struct QueueTransport {
    role: Role,
    path: PathBuf,
    framed: Framed<UnixStream, LengthDelimitedCodec>,
    cleaned: bool,
}

fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .new_codec()
}

impl QueueTransport {
    /// Open one endpoint. Role pairing matches the stream backend: the
    /// server binds and accepts exactly one peer, the client connects.
    pub async fn open(addr: &str, role: Role) -> Result<Self> {
        validate_addr(addr)?;
        let path = PathBuf::from(addr);

        let stream = match role {
            Role::Server => {
                if path.exists() {
                    std::fs::remove_file(&path).map_err(setup("unlink"))?;
                }
                let listener = UnixListener::bind(&path).map_err(setup("bind"))?;
                tracing::debug!(addr, "queue endpoint listening");
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
            framed: Framed::new(stream, frame_codec()),
            cleaned: false,
        })
    }

    fn unlink(&mut self) -> std::io::Result<()> {
        if self.role == Role::Server && !self.cleaned {
            self.cleaned = true;
            if self.path.exists() {
                tracing::debug!(path = %self.path.display(), "unlinking queue endpoint");
                std::fs::remove_file(&self.path)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for QueueTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.framed.send(Bytes::copy_from_slice(bytes)).await?;
        tracing::trace!(len = bytes.len(), "queue send");
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let frame = match self.framed.next().await {
            Some(frame) => frame?,
            None => {
                return Err(BridgeError::Desync(
                    "peer closed the channel mid-session".to_string(),
                ));
            }
        };
        if frame.len() > buf.len() {
            return Err(BridgeError::Desync(format!(
                "inbound message of {} bytes exceeds the {}-byte exchange buffer",
                frame.len(),
                buf.len()
            )));
        }
        buf[..frame.len()].copy_from_slice(&frame);
        tracing::trace!(len = frame.len(), "queue recv");
        Ok(frame.len())
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.framed.get_mut().shutdown().await;
        self.unlink()?;
        Ok(())
    }
}

impl Drop for QueueTransport {
    fn drop(&mut self) {
        if let Err(e) = self.unlink() {
            tracing::warn!(error = %e, "failed to unlink queue endpoint");
        }
    }
}
