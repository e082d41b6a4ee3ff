//! The signal record exchanged once per clock step.
//!
//! A record is a flat map from port name to scalar value plus two reserved
//! fields: the session-liveness flag and the handshake-only process id. Both
//! reserved names use a dunder form so they can never collide with a
//! generated port name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Wire name of the session-liveness flag. Owned by the orchestrator.
pub const ALIVE_FIELD: &str = "__alive__";

/// Wire name of the process id announced by the device during the handshake.
pub const PID_FIELD: &str = "__pid__";

/// A scalar signal value: a boolean level or a bounded-width unsigned integer.
///
/// Serialized untagged, so the wire form is a bare JSON boolean or number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Bool(bool),
    Uint(u64),
}

impl SignalValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Uint(_) => "uint",
        }
    }
}

impl From<bool> for SignalValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u64> for SignalValue {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

/// One step's worth of named signal values.
///
/// The liveness flag is mandatory on the wire: a buffer without it does not
/// decode, so a truncated or foreign message can never be mistaken for a
/// well-formed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    #[serde(rename = "__alive__")]
    alive: bool,

    #[serde(rename = "__pid__", default, skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,

    #[serde(flatten)]
    fields: BTreeMap<String, SignalValue>,
}

impl SignalRecord {
    pub fn new() -> Self {
        Self {
            alive: true,
            pid: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn set_pid(&mut self, pid: u32) {
        self.pid = Some(pid);
    }

    pub fn field(&self, name: &str) -> Option<SignalValue> {
        self.fields.get(name).copied()
    }

    pub fn set_field(&mut self, name: &str, value: SignalValue) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for SignalRecord {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_uses_reserved_names() {
        let mut rec = SignalRecord::new();
        rec.set_pid(4242);
        rec.set_field("reset", SignalValue::Bool(true));
        rec.set_field("data_out", SignalValue::Uint(9));

        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            value,
            json!({
                "__alive__": true,
                "__pid__": 4242,
                "reset": true,
                "data_out": 9,
            })
        );
    }

    #[test]
    fn pid_is_omitted_outside_the_handshake() {
        let rec = SignalRecord::new();
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value, json!({ "__alive__": true }));
    }

    #[test]
    fn values_decode_untagged() {
        let rec: SignalRecord =
            serde_json::from_value(json!({ "__alive__": false, "en": true, "count": 3 })).unwrap();
        assert!(!rec.is_alive());
        assert_eq!(rec.field("en"), Some(SignalValue::Bool(true)));
        assert_eq!(rec.field("count"), Some(SignalValue::Uint(3)));
    }

    #[test]
    fn missing_liveness_flag_is_not_a_record() {
        let result: Result<SignalRecord, _> = serde_json::from_value(json!({ "count": 3 }));
        assert!(result.is_err());
    }
}
