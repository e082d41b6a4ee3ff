//! The signal bridge: one transport endpoint, one codec, one in-memory
//! record, exchanged exactly once per simulated clock step in each direction.

use std::sync::Arc;

use crate::codec::RecordCodec;
use crate::error::{BridgeError, Result};
use crate::ports::{PortTable, PortValue};
use crate::record::{SignalRecord, SignalValue};
use crate::transport::{QueueTransport, Role, StreamTransport, Transport};

/// Default exchange buffer capacity in bytes. Both sides must agree on the
/// capacity out of band, like the port table itself.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Session endpoint configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Local-domain address string; identical on both sides of a session.
    pub addr: String,
    pub role: Role,
    pub capacity: usize,
}

impl BridgeConfig {
    pub fn new(addr: impl Into<String>, role: Role) -> Self {
        Self {
            addr: addr.into(),
            role,
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Binds a transport and a codec to a port table and drives the per-step
/// exchange.
///
/// Owned by exactly one process side; no internal concurrency. The receive
/// buffer is allocated once and reused for every exchange.
pub struct SignalBridge<T: Transport> {
    transport: T,
    table: Arc<PortTable>,
    codec: RecordCodec,
    record: SignalRecord,
    buf: Vec<u8>,
    received: bool,
}

impl SignalBridge<StreamTransport> {
    /// Open a bridge over the raw stream-socket backend.
    pub async fn over_stream(config: &BridgeConfig, table: Arc<PortTable>) -> Result<Self> {
        let transport = StreamTransport::open(&config.addr, config.role).await?;
        Ok(Self::new(transport, table, config.capacity))
    }
}

impl SignalBridge<QueueTransport> {
    /// Open a bridge over the request/reply messaging backend.
    pub async fn over_queue(config: &BridgeConfig, table: Arc<PortTable>) -> Result<Self> {
        let transport = QueueTransport::open(&config.addr, config.role).await?;
        Ok(Self::new(transport, table, config.capacity))
    }
}

impl<T: Transport> SignalBridge<T> {
    pub fn new(transport: T, table: Arc<PortTable>, capacity: usize) -> Self {
        Self {
            transport,
            table,
            codec: RecordCodec::new(capacity),
            record: SignalRecord::new(),
            buf: vec![0u8; capacity],
            received: false,
        }
    }

    pub fn table(&self) -> &Arc<PortTable> {
        &self.table
    }

    /// Write a typed value for a named port into the in-memory record.
    pub fn set<V: PortValue>(&mut self, port: &str, value: V) -> Result<()> {
        let def = self.table.require(port)?;
        let v = value.into_signal(def)?;
        self.record.set_field(&def.name, v);
        Ok(())
    }

    /// Read the last-received value for a named port.
    pub fn get<V: PortValue>(&self, port: &str) -> Result<V> {
        let def = self.table.require(port)?;
        V::from_signal(self.value_of(def.name.as_str())?, def)
    }

    /// Untyped variants, used by the device loop to shuttle whole records.
    pub fn set_value(&mut self, port: &str, value: SignalValue) -> Result<()> {
        let def = self.table.require(port)?;
        def.check(value)?;
        self.record.set_field(&def.name, value);
        Ok(())
    }

    pub fn value(&self, port: &str) -> Result<SignalValue> {
        self.table.require(port)?;
        self.value_of(port)
    }

    fn value_of(&self, port: &str) -> Result<SignalValue> {
        match self.record.field(port) {
            Some(v) => Ok(v),
            None if !self.received => Err(BridgeError::NotYetReceived(port.to_string())),
            None => Err(BridgeError::Desync(format!(
                "port '{port}' missing from the received record"
            ))),
        }
    }

    /// Derive the boolean clock level from a cycle-counter port: low on even
    /// counts, high on odd.
    pub fn clock_pulse(&self, port: &str) -> Result<bool> {
        let cycles: u64 = self.get(port)?;
        Ok(cycles & 1 == 1)
    }

    /// Most recently received session-liveness flag.
    pub fn is_alive(&self) -> bool {
        self.record.is_alive()
    }

    /// Only the orchestrator writes this; it is the sole termination signal.
    pub fn set_alive(&mut self, alive: bool) {
        self.record.set_alive(alive);
    }

    /// Process id from the handshake record, if one has been received.
    pub fn peer_pid(&self) -> Option<u32> {
        self.record.pid()
    }

    /// One-shot identity exchange: stamp this process id and send. Uses the
    /// ordinary record machinery; there is no separate handshake format.
    pub async fn announce(&mut self, pid: u32) -> Result<()> {
        self.record.set_pid(pid);
        tracing::debug!(pid, "announcing to orchestrator");
        self.send().await
    }

    /// Encode the in-memory record and transmit it.
    pub async fn send(&mut self) -> Result<()> {
        let bytes = self.codec.encode(&self.record)?;
        self.transport.send(&bytes).await
    }

    /// Block until one complete record arrives, then replace the in-memory
    /// record (including the liveness flag) with it.
    pub async fn recv(&mut self) -> Result<()> {
        let n = self.transport.recv(&mut self.buf).await?;
        self.record = self.codec.decode(&self.buf[..n])?;
        self.received = true;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}
