//! sigbridge: lockstep signal exchange between an external orchestrator and
//! cycle-accurate logic-simulation processes.
//!
//! Each simulated device runs in its own process and talks to the
//! orchestrator over exactly one point-to-point channel. Per clock step,
//! exactly one record of named signal values crosses in each direction; the
//! orchestrator drives, the device answers, and the orchestrator's
//! session-alive flag is the sole termination signal.
//!
//! # Architecture
//!
//! - **record / ports**: the named-value record and the out-of-band port
//!   table both sides must agree on.
//! - **codec**: record <-> flat byte buffer, with the capacity check.
//! - **transport**: one capability set, two backends (raw stream socket,
//!   framed request/reply queue).
//! - **bridge**: typed get/set, handshake, one exchange per step.
//! - **session / device**: the driving loops for each participant.

mod bridge;
mod codec;
mod device;
mod error;
mod ports;
mod record;
mod session;
pub mod transport;

pub use bridge::{BridgeConfig, DEFAULT_CAPACITY, SignalBridge};
pub use codec::RecordCodec;
pub use device::{Device, run_device};
pub use error::{BridgeError, Result};
pub use ports::{PortDef, PortDir, PortKind, PortTable, PortTableBuilder, PortValue};
pub use record::{ALIVE_FIELD, PID_FIELD, SignalRecord, SignalValue};
pub use session::Session;
pub use transport::{QueueTransport, Role, StreamTransport, Transport};
