//! ROM command constants understood by the slave.

/// Command to search for devices on the 1-Wire bus.
///
/// Each of the 64 ROM bits is answered with the bit and its complement,
/// after which the master writes the branch it selects.
pub const ONEWIRE_SEARCH_CMD: u8 = 0xf0;

/// Command to search for devices in alarm state on the 1-Wire bus.
///
/// Identical to [`ONEWIRE_SEARCH_CMD`], but only devices whose alarm
/// condition is raised take part.
pub const ONEWIRE_CONDITIONAL_SEARCH_CMD: u8 = 0xec;

/// Command to read the 64-bit ROM of the only device on the bus.
pub const ONEWIRE_READ_ROM_CMD: u8 = 0x33;

/// Command addressing the one device whose 64-bit ROM follows.
pub const ONEWIRE_MATCH_ROM_CMD: u8 = 0x55;

/// Command addressing every device on the bus without sending a ROM.
pub const ONEWIRE_SKIP_ROM_CMD: u8 = 0xcc;

/// ROM-level command received as the first byte of a frame.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomCommand {
    /// Bit-serial search for all devices.
    Search = ONEWIRE_SEARCH_CMD,
    /// Bit-serial search restricted to devices with the alarm flag raised.
    AlarmSearch = ONEWIRE_CONDITIONAL_SEARCH_CMD,
    /// Transmit the ROM (single device buses only).
    Read = ONEWIRE_READ_ROM_CMD,
    /// Address one device by its ROM.
    Match = ONEWIRE_MATCH_ROM_CMD,
    /// Address every device on the bus.
    Skip = ONEWIRE_SKIP_ROM_CMD,
}

impl TryFrom<u8> for RomCommand {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use RomCommand::*;
        match value {
            ONEWIRE_SEARCH_CMD => Ok(Search),
            ONEWIRE_CONDITIONAL_SEARCH_CMD => Ok(AlarmSearch),
            ONEWIRE_READ_ROM_CMD => Ok(Read),
            ONEWIRE_MATCH_ROM_CMD => Ok(Match),
            ONEWIRE_SKIP_ROM_CMD => Ok(Skip),
            other => Err(other),
        }
    }
}
