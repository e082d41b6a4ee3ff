use std::io;

use thiserror::Error;

/// Bridge error taxonomy.
///
/// Three fatal classes plus plain I/O:
/// - configuration (bad port table, bad address, oversized record),
/// - transport setup (the failing operation is named),
/// - protocol desync (malformed or out-of-order wire data).
///
/// None of these are recoverable: the lockstep discipline makes it impossible
/// to know which step was lost, so the session is torn down instead of
/// resynchronized.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("unknown port '{0}'")]
    UnknownPort(String),

    #[error("port '{port}' is declared {declared}, got {requested}")]
    KindMismatch {
        port: String,
        declared: &'static str,
        requested: &'static str,
    },

    #[error("value {value} does not fit in the {width}-bit port '{port}'")]
    ValueOutOfRange { port: String, width: u8, value: u64 },

    #[error("'{0}' is a reserved wire field name and cannot be used as a port")]
    ReservedName(String),

    #[error("duplicate port '{0}'")]
    DuplicatePort(String),

    #[error("invalid width {width} for port '{port}' (expected 1..=64)")]
    InvalidWidth { port: String, width: u8 },

    #[error("invalid endpoint address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: &'static str },

    #[error("encoded record is {len} bytes but the exchange buffer holds {capacity}")]
    OversizedRecord { len: usize, capacity: usize },

    #[error("transport setup failed during {op}: {source}")]
    Setup {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("protocol desync: {0}")]
    Desync(String),

    #[error("port '{0}' read before the first exchange completed")]
    NotYetReceived(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
