//! Point-to-point session transports.
//!
//! One capability set, two interchangeable backends:
//! - [`StreamTransport`]: raw local-domain byte stream, no framing.
//! - [`QueueTransport`]: request/reply messaging with preserved boundaries.
//!
//! Endpoints are 1:1 and live for the whole session. The server role binds,
//! listens and accepts exactly one connection; the client role connects. Both
//! backends follow that pairing.

use async_trait::async_trait;

use crate::error::{BridgeError, Result};

pub mod queue;
pub mod stream;

pub use queue::QueueTransport;
pub use stream::StreamTransport;

/// Which side of the session this endpoint is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Binds and accepts one connection. The orchestrator side.
    Server,
    /// Connects to an already-bound peer. The device side.
    Client,
}

/// One open channel endpoint.
///
/// All calls are awaited to completion before the caller proceeds; the
/// lockstep protocol admits no pipelining. A stalled peer blocks the
/// observing side indefinitely, by design — process lifetime is owned by the
/// surrounding orchestration layer.
#[async_trait]
pub trait Transport: Send {
    /// Transmit one encoded record.
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive one record into `buf`, returning the byte count.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Tear the endpoint down; the server side also unlinks its address.
    async fn close(&mut self) -> Result<()>;
}

// sun_path is 108 bytes including the terminating NUL.
const MAX_ADDR_LEN: usize = 107;

pub(crate) fn validate_addr(addr: &str) -> Result<()> {
    if addr.is_empty() {
        return Err(BridgeError::InvalidAddress {
            addr: addr.to_string(),
            reason: "empty address",
        });
    }
    if addr.len() > MAX_ADDR_LEN {
        return Err(BridgeError::InvalidAddress {
            addr: addr.to_string(),
            reason: "longer than a local-domain socket path allows",
        });
    }
    Ok(())
}

pub(crate) fn setup(op: &'static str) -> impl FnOnce(std::io::Error) -> BridgeError {
    move |source| BridgeError::Setup { op, source }
}
