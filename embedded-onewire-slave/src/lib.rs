#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
//! # embedded-onewire-slave
//! A no-std implementation of the slave side of the 1-Wire protocol.
//!
//! The crate turns a microcontroller GPIO line into a 1-Wire device with a
//! 64-bit ROM. [OneWireSlave] is an interrupt-driven state machine: it detects
//! the master's RESET with a soft timer, answers with a PRESENCE pulse, and
//! then executes the ROM command of the frame (SEARCH, ALARM SEARCH, READ,
//! MATCH, SKIP) by busy-polling the line inside the pin-change interrupt.
//! When the device is selected, an application [FunctionHandler] runs and may
//! continue the frame with function commands through [SlotIo].
//!
//! Hardware is reached through three small traits: [OneWireLine] for the data
//! line, [SoftTimer] for the periodic timer, and [RomStore] for the ROM bytes.
//! [OpenDrainPin] adapts any `embedded-hal` open-drain GPIO, and [Countdown]
//! is a ready-made soft timer. [SharedSlave] holds a slave in a `static` so
//! interrupt handlers can reach it.
//!
//! Slot timing is derived once from the CPU clock and the soft timer period by
//! [TimingBuilder]; no wait in the engine is unbounded.

mod consts;
mod crc;
mod engine;
mod error;
mod id;
mod io;
mod pin;
mod rom;
mod shared;
mod state;
mod timer;
pub mod timing;
mod traits;

pub use consts::*;
pub use crc::{OneWireCrc, crc8};
pub use engine::OneWireSlave;
pub use error::OneWireSlaveError;
pub use id::DeviceId;
pub use io::SlotIo;
pub use pin::OpenDrainPin;
pub use shared::SharedSlave;
pub use state::{Flags, FrameOutcome, Stage};
pub use timer::Countdown;
pub use timing::{Timing, TimingBuilder};
pub use traits::{FunctionHandler, OneWireLine, RomStore, SoftTimer};

/// Result type for configuring a 1-Wire slave.
pub type OneWireSlaveResult<T> = Result<T, OneWireSlaveError>;
