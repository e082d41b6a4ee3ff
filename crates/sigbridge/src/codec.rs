//! Record wire codec.
//!
//! Serializes with serde_json; the capacity check lives here so an oversized
//! record is a configuration error at encode time, never a truncation
//! discovered on the wire.

use std::io;

use crate::error::{BridgeError, Result};
use crate::record::SignalRecord;

pub struct RecordCodec {
    capacity: usize,
}

impl RecordCodec {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Encode a record. Fails if the serialized form exceeds the exchange
    /// buffer capacity both sides agreed on.
    pub fn encode(&self, record: &SignalRecord) -> Result<Vec<u8>> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| BridgeError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        if bytes.len() > self.capacity {
            return Err(BridgeError::OversizedRecord {
                len: bytes.len(),
                capacity: self.capacity,
            });
        }
        Ok(bytes)
    }

    /// Decode a received buffer. A buffer that is not a complete well-formed
    /// record means the parties have desynchronized; it is never mapped to
    /// defaulted values.
    pub fn decode(&self, buf: &[u8]) -> Result<SignalRecord> {
        serde_json::from_slice(buf)
            .map_err(|e| BridgeError::Desync(format!("malformed record: {e}")))
    }
}
