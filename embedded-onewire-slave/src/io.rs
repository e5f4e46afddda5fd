use embedded_hal::delay::DelayNs;

use crate::{Flags, OneWireLine, Timing, crc8, error::SlotTimeout};

/// Slot-level I/O on the data line.
///
/// Every wait is a polling loop with an iteration ceiling taken from
/// [`Timing`], so nothing here can hang with interrupts disabled: a missed
/// deadline raises the sticky error flag instead. While the flag is raised,
/// all bit and byte operations are no-ops that report failure.
pub struct SlotIo<L, D> {
    line: L,
    delay: D,
    timing: Timing,
    pub(crate) flags: Flags,
}

impl<L, D> SlotIo<L, D> {
    /// Timing this bus runs with.
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Current flags.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Return true if a slot deadline was missed in the current frame.
    pub fn is_error(&self) -> bool {
        self.flags.error()
    }

    /// Turn the error flag on.
    pub fn set_error_on(&mut self) {
        self.flags.set_error(true);
    }

    /// Turn the error flag off.
    pub fn set_error_off(&mut self) {
        self.flags.set_error(false);
    }

    pub(crate) fn check(&self) -> Result<(), SlotTimeout> {
        if self.flags.error() {
            Err(SlotTimeout)
        } else {
            Ok(())
        }
    }

    pub(crate) fn into_parts(self) -> (L, D) {
        (self.line, self.delay)
    }

    #[cfg(test)]
    pub(crate) fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }
}

impl<L: OneWireLine, D: DelayNs> SlotIo<L, D> {
    /// Takes over the line, leaving it released with a low idle output level.
    pub(crate) fn new(line: L, delay: D, timing: Timing) -> Self {
        let mut io = Self {
            line,
            delay,
            timing,
            flags: Flags::new(),
        };
        io.line.set_port(false);
        io.release();
        io
    }

    /// Sample the line.
    pub(crate) fn is_high(&mut self) -> bool {
        self.line.is_pin()
    }

    /// Set the line low.
    pub(crate) fn sink(&mut self) {
        self.line.set_ddr(true);
    }

    /// Release the line.
    pub(crate) fn release(&mut self) {
        self.line.set_ddr(false);
    }

    /// Busy delay of `us` microseconds.
    pub(crate) fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    /// Wait at most `loops` polling iterations for the line to go high.
    /// Turns the error flag on if it never did.
    pub(crate) fn wait_for_high(&mut self, loops: u32) {
        for _ in 0..loops {
            if self.line.is_pin() {
                return;
            }
        }
        self.flags.set_error(true);
    }

    /// Wait at most `loops` polling iterations for the line to go low.
    /// Turns the error flag on if it never did.
    pub(crate) fn wait_for_low(&mut self, loops: u32) {
        for _ in 0..loops {
            if !self.line.is_pin() {
                return;
            }
        }
        self.flags.set_error(true);
    }

    /// Read a bit written by the master.
    ///
    /// Returns `false` when the error flag is (or becomes) set.
    pub fn read_bit(&mut self) -> bool {
        if self.flags.error() {
            return false;
        }
        if self.flags.slot_started() {
            // The falling edge that started the frame was this slot's.
            self.flags.set_slot_started(false);
        } else {
            self.wait_for_low(self.timing.slot_signal_loops());
            if self.flags.error() {
                return false;
            }
        }

        self.delay_us(crate::timing::RX_SLOT_SAMPLING_OFFSET_US);

        if self.line.is_pin() {
            true
        } else {
            // A 0 is being written; the master must release before the slot ends.
            self.wait_for_high(self.timing.rx_release_loops());
            false
        }
    }

    /// Read a byte written by the master, least significant bit first.
    ///
    /// Stops at the first missed deadline and returns the bits received so far.
    pub fn read_byte(&mut self) -> u8 {
        let mut byte = 0;
        for i in 0..8 {
            let bit = self.read_bit();
            if self.flags.error() {
                break;
            }
            if bit {
                byte |= 1 << i;
            }
        }
        byte
    }

    /// Answer the master's next read slot with `bit`.
    pub fn write_bit(&mut self, bit: bool) {
        if self.flags.error() {
            return;
        }
        self.wait_for_low(self.timing.slot_signal_loops());
        if self.flags.error() {
            return;
        }

        if !bit {
            self.sink();
        }
        self.delay_us(crate::timing::TX_BIT_US);
        self.release();

        self.wait_for_high(self.timing.tx_release_loops());
    }

    /// Write a byte, least significant bit first. Stops at the first missed deadline.
    pub fn write_byte(&mut self, mut byte: u8) {
        for _ in 0..8 {
            self.write_bit(byte & 0x01 == 0x01);
            if self.flags.error() {
                break;
            }
            byte >>= 1;
        }
    }

    /// Write a byte and fold it into the running CRC `crc`.
    ///
    /// The CRC is returned unchanged if the byte could not be written.
    pub fn write_byte_with_crc8(&mut self, byte: u8, crc: u8) -> u8 {
        self.write_byte(byte);
        if self.flags.error() {
            return crc;
        }
        crc8(byte, crc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimingBuilder;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use std::collections::VecDeque;

    /// Line that replays scripted samples; the line reads high once the script runs out.
    #[derive(Default)]
    struct ScriptedLine {
        samples: VecDeque<bool>,
        reads: usize,
        ddr: Vec<bool>,
    }

    impl ScriptedLine {
        fn new(samples: &[bool]) -> Self {
            Self {
                samples: samples.iter().copied().collect(),
                ..Default::default()
            }
        }
    }

    impl OneWireLine for ScriptedLine {
        fn is_pin(&mut self) -> bool {
            self.reads += 1;
            self.samples.pop_front().unwrap_or(true)
        }

        fn set_ddr(&mut self, drive: bool) {
            self.ddr.push(drive);
        }

        fn set_port(&mut self, high: bool) {
            assert!(!high);
        }
    }

    fn io(samples: &[bool]) -> SlotIo<ScriptedLine, NoopDelay> {
        let timing = TimingBuilder::new(16_000_000).build().unwrap();
        let mut io = SlotIo::new(ScriptedLine::new(samples), NoopDelay::new(), timing);
        io.line.ddr.clear();
        io
    }

    #[test]
    fn init_releases_line() {
        let timing = TimingBuilder::new(16_000_000).build().unwrap();
        let io = SlotIo::new(ScriptedLine::default(), NoopDelay::new(), timing);
        assert_eq!(io.line.ddr, [false]);
        assert_eq!(io.flags(), Flags::new());
    }

    #[test]
    fn first_bit_skips_slot_start() {
        // sample high: a 1
        let mut io = io(&[true]);
        io.flags.set_slot_started(true);
        assert!(io.read_bit());
        assert!(!io.flags().slot_started());
        assert_eq!(io.line.reads, 1);
    }

    #[test]
    fn read_zero_waits_for_release() {
        // slot start, sampled low, two polls still low, then released
        let mut io = io(&[false, false, false, false, true]);
        assert!(!io.read_bit());
        assert!(!io.is_error());
        assert_eq!(io.line.reads, 5);
    }

    #[test]
    fn missing_slot_sets_error() {
        let mut io = io(&[]);
        assert!(!io.read_bit());
        assert!(io.is_error());
        assert_eq!(io.line.reads as u32, io.timing().slot_signal_loops());
    }

    #[test]
    fn stuck_low_after_zero_sets_error() {
        let timing = TimingBuilder::new(16_000_000).build().unwrap();
        let samples = std::vec![false; 2 + timing.rx_release_loops() as usize];
        let mut io = io(&samples);
        assert!(!io.read_bit());
        assert!(io.is_error());
    }

    #[test]
    fn error_is_sticky() {
        let mut io = io(&[false, true]);
        io.set_error_on();
        assert!(!io.read_bit());
        io.write_bit(false);
        assert_eq!(io.read_byte(), 0);
        assert_eq!(io.line.reads, 0);
        assert!(io.line.ddr.is_empty());
        assert_eq!(io.check(), Err(SlotTimeout));
        io.set_error_off();
        assert_eq!(io.check(), Ok(()));
    }

    #[test]
    fn read_byte_lsb_first() {
        // 0xa5 = 1010_0101, bit 0 first
        let mut samples = Vec::new();
        for i in 0..8 {
            let bit = (0xa5u8 >> i) & 1 == 1;
            samples.push(false); // slot start
            samples.push(bit); // sample
            if !bit {
                samples.push(true); // release
            }
        }
        let mut io = io(&samples);
        assert_eq!(io.read_byte(), 0xa5);
        assert!(!io.is_error());
    }

    #[test]
    fn read_byte_keeps_partial_bits() {
        // bits 0 and 1 are ones, then the master goes silent
        let mut io = io(&[false, true, false, true]);
        assert_eq!(io.read_byte(), 0b11);
        assert!(io.is_error());
    }

    #[test]
    fn write_bits_drive_zeros_only() {
        // each slot: start edge, then released after the hold
        let mut io = io(&[false, true, false, true]);
        io.write_bit(false);
        io.write_bit(true);
        assert!(!io.is_error());
        assert_eq!(io.line.ddr, [true, false, false]);
    }

    #[test]
    fn write_byte_with_crc_folds_only_on_success() {
        let samples: Vec<bool> = (0..8).flat_map(|_| [false, true]).collect();
        let mut io = io(&samples);
        assert_eq!(io.write_byte_with_crc8(0x28, 0), crc8(0x28, 0));
        assert!(!io.is_error());

        // nobody starts the next slot
        let crc = io.write_byte_with_crc8(0x01, 0x5e);
        assert!(io.is_error());
        assert_eq!(crc, 0x5e);
    }
}
