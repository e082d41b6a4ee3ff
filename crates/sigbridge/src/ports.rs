//! The port table: the out-of-band contract shared by both session peers.
//!
//! Both processes must be built (or configured) against the same table; a
//! mismatch is a configuration error, never negotiated on the wire.

use std::collections::HashMap;

use crate::error::{BridgeError, Result};
use crate::record::{ALIVE_FIELD, PID_FIELD, SignalValue};

/// Declared type of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Bool,
    /// Unsigned integer of the given bit width (1..=64).
    Uint { width: u8 },
}

impl PortKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Uint { .. } => "uint",
        }
    }
}

/// Direction class of a port, seen from the device under test.
///
/// Clock ports carry the orchestrator's cycle counter as an unsigned integer;
/// the device side reads them back as a boolean level (see
/// [`SignalBridge::clock_pulse`](crate::SignalBridge::clock_pulse)).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDir {
    Clock,
    Input,
    Output,
}

#[derive(Debug, Clone)]
pub struct PortDef {
    pub name: String,
    pub kind: PortKind,
    pub dir: PortDir,
}

impl PortDef {
    /// Validate a value against the declared kind and width.
    pub fn check(&self, value: SignalValue) -> Result<()> {
        match (self.kind, value) {
            (PortKind::Bool, SignalValue::Bool(_)) => Ok(()),
            (PortKind::Uint { width }, SignalValue::Uint(v)) => {
                if width < 64 && v >> width != 0 {
                    Err(BridgeError::ValueOutOfRange {
                        port: self.name.clone(),
                        width,
                        value: v,
                    })
                } else {
                    Ok(())
                }
            }
            (kind, v) => Err(BridgeError::KindMismatch {
                port: self.name.clone(),
                declared: kind.name(),
                requested: v.kind_name(),
            }),
        }
    }
}

/// Fixed enumeration of the ports a session exchanges.
#[derive(Debug)]
pub struct PortTable {
    defs: Vec<PortDef>,
    index: HashMap<String, usize>,
}

impl PortTable {
    pub fn builder() -> PortTableBuilder {
        PortTableBuilder { defs: Vec::new() }
    }

    pub fn get(&self, name: &str) -> Option<&PortDef> {
        self.index.get(name).map(|&i| &self.defs[i])
    }

    pub fn require(&self, name: &str) -> Result<&PortDef> {
        self.get(name)
            .ok_or_else(|| BridgeError::UnknownPort(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortDef> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

pub struct PortTableBuilder {
    defs: Vec<PortDef>,
}

impl PortTableBuilder {
    /// Declare a clock port. Carried on the wire as a 64-bit cycle counter.
    pub fn clock(self, name: &str) -> Self {
        self.port(name, PortKind::Uint { width: 64 }, PortDir::Clock)
    }

    pub fn input(self, name: &str, kind: PortKind) -> Self {
        self.port(name, kind, PortDir::Input)
    }

    pub fn output(self, name: &str, kind: PortKind) -> Self {
        self.port(name, kind, PortDir::Output)
    }

    fn port(mut self, name: &str, kind: PortKind, dir: PortDir) -> Self {
        self.defs.push(PortDef {
            name: name.to_string(),
            kind,
            dir,
        });
        self
    }

    pub fn build(self) -> Result<PortTable> {
        let mut index = HashMap::with_capacity(self.defs.len());
        for (i, def) in self.defs.iter().enumerate() {
            if def.name == ALIVE_FIELD || def.name == PID_FIELD {
                return Err(BridgeError::ReservedName(def.name.clone()));
            }
            if let PortKind::Uint { width } = def.kind {
                if width == 0 || width > 64 {
                    return Err(BridgeError::InvalidWidth {
                        port: def.name.clone(),
                        width,
                    });
                }
            }
            if index.insert(def.name.clone(), i).is_some() {
                return Err(BridgeError::DuplicatePort(def.name.clone()));
            }
        }
        Ok(PortTable {
            defs: self.defs,
            index,
        })
    }
}

/// Conversion between native scalars and wire values, checked against a
/// port's declared kind and width.
pub trait PortValue: Sized {
    fn into_signal(self, def: &PortDef) -> Result<SignalValue>;
    fn from_signal(value: SignalValue, def: &PortDef) -> Result<Self>;
}

impl PortValue for bool {
    fn into_signal(self, def: &PortDef) -> Result<SignalValue> {
        let v = SignalValue::Bool(self);
        def.check(v)?;
        Ok(v)
    }

    fn from_signal(value: SignalValue, def: &PortDef) -> Result<Self> {
        match value {
            SignalValue::Bool(b) => Ok(b),
            _ => Err(BridgeError::KindMismatch {
                port: def.name.clone(),
                declared: def.kind.name(),
                requested: "bool",
            }),
        }
    }
}

impl PortValue for u64 {
    fn into_signal(self, def: &PortDef) -> Result<SignalValue> {
        let v = SignalValue::Uint(self);
        def.check(v)?;
        Ok(v)
    }

    fn from_signal(value: SignalValue, def: &PortDef) -> Result<Self> {
        match value {
            SignalValue::Uint(v) => Ok(v),
            _ => Err(BridgeError::KindMismatch {
                port: def.name.clone(),
                declared: def.kind.name(),
                requested: "uint",
            }),
        }
    }
}

macro_rules! narrow_port_value {
    ($($ty:ty),*) => {$(
        impl PortValue for $ty {
            fn into_signal(self, def: &PortDef) -> Result<SignalValue> {
                u64::from(self).into_signal(def)
            }

            fn from_signal(value: SignalValue, def: &PortDef) -> Result<Self> {
                let wide = u64::from_signal(value, def)?;
                <$ty>::try_from(wide).map_err(|_| BridgeError::ValueOutOfRange {
                    port: def.name.clone(),
                    width: <$ty>::BITS as u8,
                    value: wide,
                })
            }
        }
    )*};
}

narrow_port_value!(u8, u16, u32);
