//! Device-side orchestration loop.
//!
//! The logic-simulation kernel itself is an external collaborator; this
//! module only needs it to advance simulated time one unit at a time and to
//! expose its named ports.

use std::sync::Arc;

use crate::bridge::SignalBridge;
use crate::error::Result;
use crate::ports::PortDir;
use crate::record::SignalValue;
use crate::transport::Transport;

/// Boundary to the logic-simulation kernel.
pub trait Device {
    /// Advance simulated time by exactly one clock unit.
    fn step(&mut self);

    /// Apply one input (or clock-level) value to the named port.
    fn write_input(&mut self, port: &str, value: SignalValue) -> Result<()>;

    /// Read the current value of the named output port.
    fn read_output(&self, port: &str) -> Result<SignalValue>;
}

/// Run a device process to completion.
///
/// Announces `pid` to the orchestrator, then repeats the steady-state step:
/// receive the input vector, apply it, advance one clock unit, publish the
/// outputs. Exits without a further reply as soon as a received record
/// carries session-alive = false.
pub async fn run_device<T, D>(bridge: &mut SignalBridge<T>, device: &mut D, pid: u32) -> Result<()>
where
    T: Transport,
    D: Device,
{
    let table = Arc::clone(bridge.table());
    bridge.announce(pid).await?;

    let mut steps: u64 = 0;
    loop {
        bridge.recv().await?;
        if !bridge.is_alive() {
            break;
        }

        for def in table.iter() {
            match def.dir {
                PortDir::Clock => {
                    let level = SignalValue::Bool(bridge.clock_pulse(&def.name)?);
                    device.write_input(&def.name, level)?;
                }
                PortDir::Input => device.write_input(&def.name, bridge.value(&def.name)?)?,
                PortDir::Output => {}
            }
        }

        device.step();
        steps += 1;
        tracing::trace!(steps, "device advanced one clock unit");

        for def in table.iter() {
            if def.dir == PortDir::Output {
                bridge.set_value(&def.name, device.read_output(&def.name)?)?;
            }
        }
        bridge.send().await?;
    }

    tracing::debug!(pid, steps, "session ended by orchestrator");
    bridge.close().await
}
