//! Open-loop, standard-speed bus master.
//!
//! The master's whole timeline is laid out before the run. It never reacts to
//! what it reads, so a search is scripted with the branch the master is to take.

use embedded_onewire_slave::{
    ONEWIRE_CONDITIONAL_SEARCH_CMD, ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SEARCH_CMD,
};

/// Idle time before the first action, off the soft-timer grid.
pub const LEAD_IN_NS: u64 = 101_000;
/// Default RESET low time.
pub const RESET_US: u64 = 480;
/// Time the master leaves for PRESENCE after releasing RESET.
pub const PRESENCE_WINDOW_NS: u64 = 480_000;
/// When the master samples for PRESENCE, from the end of RESET.
pub const PRESENCE_SAMPLE_NS: u64 = 70_000;
/// Length of one slot including recovery.
pub const SLOT_NS: u64 = 70_000;
/// Low time of a write-1 slot and of a read slot.
pub const SHORT_LOW_NS: u64 = 6_000;
/// Low time of a write-0 slot.
pub const WRITE_ZERO_LOW_NS: u64 = 60_000;
/// When the master samples a read slot, from its start.
pub const READ_SAMPLE_NS: u64 = 15_000;

/// What the master saw, once the bus has run past its script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// One entry per RESET: whether the line was low in the PRESENCE window.
    pub presence: Vec<bool>,
    /// Every bit the master read, in order.
    pub bits: Vec<bool>,
}

impl Transcript {
    /// Read bits packed into bytes, least significant bit first. A trailing
    /// partial byte is dropped.
    pub fn bytes(&self) -> Vec<u8> {
        self.bits
            .chunks_exact(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |byte, (i, &bit)| byte | ((bit as u8) << i))
            })
            .collect()
    }

    /// Read bits in pairs, as the master sees them during a search.
    pub fn bit_pairs(&self) -> Vec<(bool, bool)> {
        self.bits.chunks_exact(2).map(|p| (p[0], p[1])).collect()
    }
}

/// Timeline of what the master does on the bus.
#[derive(Debug, Clone)]
pub struct MasterScript {
    cursor_ns: u64,
    lows: Vec<(u64, u64)>,
    presence_samples: Vec<u64>,
    bit_samples: Vec<u64>,
}

impl Default for MasterScript {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterScript {
    /// Empty script; the first action starts at [`LEAD_IN_NS`].
    pub fn new() -> Self {
        Self {
            cursor_ns: LEAD_IN_NS,
            lows: Vec::new(),
            presence_samples: Vec::new(),
            bit_samples: Vec::new(),
        }
    }

    /// Time at which the next action would start.
    pub fn cursor_ns(&self) -> u64 {
        self.cursor_ns
    }

    /// Standard RESET, followed by the PRESENCE window.
    pub fn reset(&mut self) -> &mut Self {
        self.reset_us(RESET_US)
    }

    /// RESET held low for `low_us`, followed by the PRESENCE window.
    pub fn reset_us(&mut self, low_us: u64) -> &mut Self {
        let end = self.cursor_ns + low_us * 1_000;
        self.lows.push((self.cursor_ns, end));
        self.presence_samples.push(end + PRESENCE_SAMPLE_NS);
        self.cursor_ns = end + PRESENCE_WINDOW_NS;
        self
    }

    /// One write slot.
    pub fn write_bit(&mut self, bit: bool) -> &mut Self {
        let low = if bit { SHORT_LOW_NS } else { WRITE_ZERO_LOW_NS };
        self.lows.push((self.cursor_ns, self.cursor_ns + low));
        self.cursor_ns += SLOT_NS;
        self
    }

    /// Eight write slots, least significant bit first.
    pub fn write_byte(&mut self, byte: u8) -> &mut Self {
        for i in 0..8 {
            self.write_bit((byte >> i) & 0x01 == 0x01);
        }
        self
    }

    /// Write several bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        for &byte in bytes {
            self.write_byte(byte);
        }
        self
    }

    /// `n` read slots.
    pub fn read_bits(&mut self, n: usize) -> &mut Self {
        for _ in 0..n {
            self.lows.push((self.cursor_ns, self.cursor_ns + SHORT_LOW_NS));
            self.bit_samples.push(self.cursor_ns + READ_SAMPLE_NS);
            self.cursor_ns += SLOT_NS;
        }
        self
    }

    /// `n` bytes worth of read slots.
    pub fn read_bytes(&mut self, n: usize) -> &mut Self {
        self.read_bits(8 * n)
    }

    /// Leave the bus idle.
    pub fn idle_us(&mut self, us: u64) -> &mut Self {
        self.cursor_ns += us * 1_000;
        self
    }

    /// Hold the line low for `us`.
    pub fn hold_low(&mut self, us: u64) -> &mut Self {
        let end = self.cursor_ns + us * 1_000;
        self.lows.push((self.cursor_ns, end));
        self.cursor_ns = end;
        self
    }

    /// Hold the line low and never release it. Nothing can follow.
    pub fn hold_low_forever(&mut self) -> &mut Self {
        self.lows.push((self.cursor_ns, u64::MAX));
        self.cursor_ns = u64::MAX;
        self
    }

    /// Sink the line between two absolute times, on top of the rest of the
    /// script. Models another device shorting the bus.
    pub fn pull_low_at(&mut self, from_us: u64, until_us: u64) -> &mut Self {
        self.lows.push((from_us * 1_000, until_us * 1_000));
        self
    }

    /// SEARCH (or ALARM SEARCH with `alarm`) following `path`, least
    /// significant bit first: for every bit, two read slots then the branch.
    pub fn search(&mut self, alarm: bool, path: u64) -> &mut Self {
        let command = if alarm {
            ONEWIRE_CONDITIONAL_SEARCH_CMD
        } else {
            ONEWIRE_SEARCH_CMD
        };
        self.write_byte(command);
        for i in 0..64 {
            self.read_bits(2);
            self.write_bit((path >> i) & 0x01 == 0x01);
        }
        self
    }

    /// MATCH ROM addressing `rom`.
    pub fn match_rom(&mut self, rom: &[u8; 8]) -> &mut Self {
        self.write_byte(ONEWIRE_MATCH_ROM_CMD).write_bytes(rom)
    }

    pub(crate) fn lows(&self) -> Vec<(u64, u64)> {
        self.lows.clone()
    }

    pub(crate) fn presence_samples(&self) -> &[u64] {
        &self.presence_samples
    }

    pub(crate) fn bit_samples(&self) -> &[u64] {
        &self.bit_samples
    }
}
