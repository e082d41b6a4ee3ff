//! Orchestrator-side session driver.

use crate::bridge::SignalBridge;
use crate::error::{BridgeError, Result};
use crate::ports::PortValue;
use crate::transport::Transport;

/// One orchestrator-side session with a single device process.
///
/// The orchestrator owns the liveness flag: every [`step`](Session::step)
/// sends alive = true, and [`shutdown`](Session::shutdown) sends the terminal
/// alive = false record without waiting for a reply. An orchestrator driving
/// many devices holds one `Session` per child; fan-out across them belongs to
/// the surrounding process-group layer, never to the bridge.
pub struct Session<T: Transport> {
    bridge: SignalBridge<T>,
    peer_pid: Option<u32>,
    steps: u64,
}

impl<T: Transport> Session<T> {
    pub fn new(bridge: SignalBridge<T>) -> Self {
        Self {
            bridge,
            peer_pid: None,
            steps: 0,
        }
    }

    /// Complete the one-shot identity exchange: block for the device's
    /// announcement record and return its process id.
    pub async fn await_handshake(&mut self) -> Result<u32> {
        self.bridge.recv().await?;
        let pid = self.bridge.peer_pid().ok_or_else(|| {
            BridgeError::Desync("handshake record carried no process id".to_string())
        })?;
        self.peer_pid = Some(pid);
        tracing::debug!(pid, "device announced");
        Ok(pid)
    }

    pub fn set<V: PortValue>(&mut self, port: &str, value: V) -> Result<()> {
        self.bridge.set(port, value)
    }

    pub fn get<V: PortValue>(&self, port: &str) -> Result<V> {
        self.bridge.get(port)
    }

    /// Drive one clock step: send the staged input vector, then block for
    /// the device's output vector.
    pub async fn step(&mut self) -> Result<()> {
        self.bridge.set_alive(true);
        self.bridge.send().await?;
        self.bridge.recv().await?;
        self.steps += 1;
        tracing::trace!(steps = self.steps, "step exchanged");
        Ok(())
    }

    /// End the session: send the terminal record and tear the endpoint down.
    /// The device exits on observing it and sends no reply.
    pub async fn shutdown(mut self) -> Result<()> {
        self.bridge.set_alive(false);
        self.bridge.send().await?;
        tracing::debug!(steps = self.steps, "session shut down");
        self.bridge.close().await
    }

    pub fn peer_pid(&self) -> Option<u32> {
        self.peer_pid
    }

    /// Clock steps completed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}
