use embedded_hal::delay::DelayNs;
use log::trace;

use crate::{
    FrameOutcome, FunctionHandler, OneWireLine, OneWireSlave, RomCommand, RomStore, SoftTimer,
    error::SlotTimeout,
};

/// Whether the master kept this device selected until the end of a command.
enum Selection {
    Kept,
    Dropped,
}

impl<L, T, R, H, D> OneWireSlave<L, T, R, H, D>
where
    L: OneWireLine,
    T: SoftTimer,
    R: RomStore,
    H: FunctionHandler<L, D>,
    D: DelayNs,
{
    /// Read the ROM command of a frame whose first slot has just started, and
    /// execute it.
    pub(crate) fn read_and_handle_command(&mut self) -> FrameOutcome {
        self.io.flags.set_slot_started(true);

        let byte = self.io.read_byte();
        if self.io.is_error() {
            return FrameOutcome::Faulted(None);
        }

        let Ok(command) = RomCommand::try_from(byte) else {
            return FrameOutcome::Unsupported(byte);
        };
        trace!("onewire: rom command {:?}", command);

        let result = match command {
            RomCommand::AlarmSearch if !self.io.flags.alarm() => {
                return FrameOutcome::AlarmInactive;
            }
            RomCommand::Search | RomCommand::AlarmSearch => self.handle_search(),
            RomCommand::Read => self.handle_read(),
            RomCommand::Match => self.handle_match(),
            RomCommand::Skip => {
                self.handler.on_selected(&mut self.io);
                Ok(Selection::Kept)
            }
        };

        match result {
            Ok(Selection::Kept) => FrameOutcome::Completed(command),
            Ok(Selection::Dropped) => FrameOutcome::Deselected(command),
            Err(SlotTimeout) => FrameOutcome::Faulted(Some(command)),
        }
    }

    /// Take part in one pass of the search algorithm.
    ///
    /// For every ROM bit the master reads the bit and its complement, so it
    /// can see where devices disagree, then writes the branch it follows.
    /// Devices on the other branch stay silent until the next RESET.
    fn handle_search(&mut self) -> Result<Selection, SlotTimeout> {
        for index in 0..8 {
            let mut byte = self.rom.read_rom_byte(index);
            for _ in 0..8 {
                let bit = byte & 0x01 == 0x01;

                self.io.write_bit(bit);
                self.io.check()?;
                self.io.write_bit(!bit);
                self.io.check()?;

                let selected = self.io.read_bit();
                self.io.check()?;
                if selected != bit {
                    return Ok(Selection::Dropped);
                }

                byte >>= 1;
            }
        }
        Ok(Selection::Kept)
    }

    /// Transmit the ROM.
    fn handle_read(&mut self) -> Result<Selection, SlotTimeout> {
        let mut crc = 0;
        for index in 0..8 {
            let byte = self.rom.read_rom_byte(index);
            crc = self.io.write_byte_with_crc8(byte, crc);
            self.io.check()?;
        }
        // The stored bytes are sent as they are; a non-zero running CRC
        // means the provisioned ROM is corrupt, which only the master can act on.
        trace!("onewire: rom sent, running crc {:#04x}", crc);
        Ok(Selection::Kept)
    }

    /// Compare the ROM written by the master with ours and run the
    /// application handler on a full match.
    fn handle_match(&mut self) -> Result<Selection, SlotTimeout> {
        for index in 0..8 {
            let byte = self.io.read_byte();
            self.io.check()?;
            if byte != self.rom.read_rom_byte(index) {
                return Ok(Selection::Dropped);
            }
        }
        self.handler.on_selected(&mut self.io);
        Ok(Selection::Kept)
    }
}
