//! # onewire-bus-sim
//! A virtual-time 1-Wire bus for running [embedded_onewire_slave] on a host.
//!
//! A [MasterScript] lays out what a standard-speed master does on the line.
//! [Harness] plays it against a slave, delivering pin-change and soft-timer
//! events the way a microcontroller's interrupts would, with the slave's
//! polling and busy-waits spending virtual time on the [SimBus]. After the
//! run, [Transcript] tells what the master read.
//!
//! ```
//! use embedded_onewire_slave::{DeviceId, FrameOutcome, RomCommand, TimingBuilder, ONEWIRE_READ_ROM_CMD};
//! use onewire_bus_sim::{Harness, MasterScript};
//!
//! let id = DeviceId::new(0x28, [1, 2, 3, 4, 5, 6]);
//! let mut script = MasterScript::new();
//! script.reset().write_byte(ONEWIRE_READ_ROM_CMD).read_bytes(8);
//!
//! let mut sim = Harness::new(TimingBuilder::new(16_000_000), script, id, || {}).unwrap();
//! sim.run();
//! assert_eq!(sim.slave().last_frame(), Some(FrameOutcome::Completed(RomCommand::Read)));
//! assert_eq!(sim.transcript().bytes(), id.as_bytes());
//! ```

mod bus;
mod harness;
mod master;

pub use bus::{SimBus, SimDelay, SimLine};
pub use harness::{Harness, SETTLE_NS, SimSlave};
pub use master::{
    LEAD_IN_NS, MasterScript, PRESENCE_SAMPLE_NS, PRESENCE_WINDOW_NS, READ_SAMPLE_NS, RESET_US,
    SHORT_LOW_NS, SLOT_NS, Transcript, WRITE_ZERO_LOW_NS,
};
