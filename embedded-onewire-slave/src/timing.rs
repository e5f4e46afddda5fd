//! Standard-speed 1-Wire slave timing.
//!
//! The microsecond values below are the standard-speed bus timings and only
//! make sense together. [`TimingBuilder`] turns them into soft-timer ticks and
//! busy-wait iteration counts for one CPU clock and one soft-timer period.

use crate::{OneWireSlaveError, OneWireSlaveResult};

/// Nominal minimum RESET low time. The soft-timer tolerance is subtracted.
pub const RX_RESET_MIN_US: u32 = 480;
/// Nominal maximum RESET low time. The soft-timer tolerance is added.
pub const RX_RESET_MAX_US: u32 = 960;
/// Pause between the end of RESET and the start of PRESENCE.
pub const DELAY_BEFORE_PRESENCE_US: u32 = 15;
/// Nominal PRESENCE pulse width. The soft-timer tolerance is added.
pub const TX_PRESENCE_US: u32 = 120;
/// Longest time the line may stay low after PRESENCE is released.
pub const TX_PRESENCE_MAX_US: u32 = 240;
/// Master-written bits are sampled this long after the slot starts.
pub const RX_SLOT_SAMPLING_OFFSET_US: u32 = 30;
/// Time within which the master settles the line in a slot.
pub const RX_SLOT_MIN_US: u32 = 60;
/// Longest receive slot.
pub const RX_SLOT_MAX_US: u32 = 120;
/// Allowed error of the busy delays.
pub const DELAY_TOLERANCE_US: u32 = 4;
/// Longest wait for the next slot to start.
pub const RX_SLOT_SIGNAL_WAITING_US: u32 = 20_000;
/// Soft-timer period while waiting for the first slot after PRESENCE.
pub const FIRST_SIGNAL_RETRY_US: u32 = 100;
/// Longest transmit slot.
pub const TX_SLOT_MAX_US: u32 = 120;
/// Time the line is held low to transmit a 0.
pub const TX_BIT_US: u32 = 45;
/// Default CPU cycles spent in one iteration of a polling loop.
pub const DEFAULT_WAIT_LOOP_CYCLES: u32 = 6;
/// Default soft-timer period.
pub const DEFAULT_TICK_US: u16 = 16;

/// Timing of one bus, in soft-timer ticks, busy-wait iterations and
/// microseconds for the fixed delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    tick_us: u16,
    reset_min_ticks: u16,
    reset_window_ticks: u16,
    presence_ticks: u16,
    first_signal_retry_ticks: u16,
    first_signal_retries: u16,
    slot_signal_loops: u32,
    presence_release_loops: u32,
    rx_release_loops: u32,
    tx_release_loops: u32,
}

impl Timing {
    /// Soft-timer period in microseconds.
    pub const fn tick_us(&self) -> u16 {
        self.tick_us
    }

    /// Ticks the line must stay low before a RESET can be accepted.
    pub const fn reset_min_ticks(&self) -> u16 {
        self.reset_min_ticks
    }

    /// Ticks between the minimum and the maximum RESET time.
    pub const fn reset_window_ticks(&self) -> u16 {
        self.reset_window_ticks
    }

    /// PRESENCE pulse width in ticks.
    pub const fn presence_ticks(&self) -> u16 {
        self.presence_ticks
    }

    /// Soft-timer period while waiting for the first slot.
    pub const fn first_signal_retry_ticks(&self) -> u16 {
        self.first_signal_retry_ticks
    }

    /// Number of retry periods before giving up on the first slot.
    pub const fn first_signal_retries(&self) -> u16 {
        self.first_signal_retries
    }

    /// Polling iterations allowed for the next slot to start.
    pub const fn slot_signal_loops(&self) -> u32 {
        self.slot_signal_loops
    }

    /// Polling iterations allowed for the line to float high after PRESENCE.
    pub const fn presence_release_loops(&self) -> u32 {
        self.presence_release_loops
    }

    /// Polling iterations allowed for the master to release a slot after a 0 was sampled.
    pub const fn rx_release_loops(&self) -> u32 {
        self.rx_release_loops
    }

    /// Polling iterations allowed for the line to float high after transmitting a bit.
    pub const fn tx_release_loops(&self) -> u32 {
        self.tx_release_loops
    }
}

/// Builder for [`Timing`].
///
/// ```
/// use embedded_onewire_slave::TimingBuilder;
/// let timing = TimingBuilder::new(16_000_000).with_tick_us(16).build().unwrap();
/// assert_eq!(timing.reset_min_ticks(), 28);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TimingBuilder {
    cpu_hz: u32,
    tick_us: u16,
    wait_loop_cycles: u32,
}

impl TimingBuilder {
    /// Start from the CPU clock that runs the polling loops.
    pub const fn new(cpu_hz: u32) -> Self {
        Self {
            cpu_hz,
            tick_us: DEFAULT_TICK_US,
            wait_loop_cycles: DEFAULT_WAIT_LOOP_CYCLES,
        }
    }

    /// Sets the period of the soft timer that drives the engine.
    pub const fn with_tick_us(mut self, tick_us: u16) -> Self {
        self.tick_us = tick_us;
        self
    }

    /// Sets the CPU cycles one polling iteration takes.
    ///
    /// This is approximate and only guards against waits running too long.
    pub const fn with_wait_loop_cycles(mut self, cycles: u32) -> Self {
        self.wait_loop_cycles = cycles;
        self
    }

    /// Nanoseconds one polling iteration takes with this configuration.
    pub const fn poll_ns(&self) -> u64 {
        if self.cpu_hz == 0 {
            return 0;
        }
        self.wait_loop_cycles as u64 * 1_000_000_000 / self.cpu_hz as u64
    }

    const fn loops_for_us(&self, us: u32) -> u32 {
        let loops = self.cpu_hz as u64 * us as u64 / 1_000_000 / self.wait_loop_cycles as u64;
        if loops > u32::MAX as u64 {
            u32::MAX
        } else {
            loops as u32
        }
    }

    /// Converts the timing table for this configuration.
    pub const fn build(self) -> OneWireSlaveResult<Timing> {
        let t = self.tick_us as u32;
        if t == 0 {
            return Err(OneWireSlaveError::ZeroTickPeriod);
        }
        if t > FIRST_SIGNAL_RETRY_US {
            return Err(OneWireSlaveError::TickPeriodTooLong);
        }
        if self.wait_loop_cycles == 0 {
            return Err(OneWireSlaveError::ZeroLoopCycles);
        }
        let reset_min_us = RX_RESET_MIN_US - 2 * t;
        let reset_max_us = RX_RESET_MAX_US + 2 * t;
        let presence_us = TX_PRESENCE_US + 2 * t;
        let timing = Timing {
            tick_us: self.tick_us,
            reset_min_ticks: (reset_min_us / t) as u16,
            reset_window_ticks: ((reset_max_us - reset_min_us) / t) as u16,
            presence_ticks: (presence_us / t) as u16,
            first_signal_retry_ticks: (FIRST_SIGNAL_RETRY_US / t) as u16,
            first_signal_retries: (RX_SLOT_SIGNAL_WAITING_US / FIRST_SIGNAL_RETRY_US) as u16,
            slot_signal_loops: self.loops_for_us(RX_SLOT_SIGNAL_WAITING_US),
            presence_release_loops: self.loops_for_us(TX_PRESENCE_MAX_US),
            rx_release_loops: self.loops_for_us(
                RX_SLOT_MAX_US - RX_SLOT_SAMPLING_OFFSET_US + 2 * DELAY_TOLERANCE_US,
            ),
            tx_release_loops: self
                .loops_for_us(TX_SLOT_MAX_US - TX_BIT_US + 2 * DELAY_TOLERANCE_US),
        };
        // tx_release is the shortest of the bounded waits
        if timing.tx_release_loops == 0 {
            return Err(OneWireSlaveError::ClockTooSlow);
        }
        Ok(timing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixteen_mhz_sixteen_us_tick() {
        let timing = TimingBuilder::new(16_000_000).with_tick_us(16).build().unwrap();
        assert_eq!(timing.reset_min_ticks(), 28); // 448 us
        assert_eq!(timing.reset_window_ticks(), 34); // 992 - 448 us
        assert_eq!(timing.presence_ticks(), 9); // 152 us
        assert_eq!(timing.first_signal_retry_ticks(), 6);
        assert_eq!(timing.first_signal_retries(), 200);
        assert_eq!(timing.slot_signal_loops(), 53_333);
        assert_eq!(timing.presence_release_loops(), 640);
        assert_eq!(timing.rx_release_loops(), 261);
        assert_eq!(timing.tx_release_loops(), 221);
    }

    #[test]
    fn one_us_tick() {
        let timing = TimingBuilder::new(8_000_000)
            .with_tick_us(1)
            .with_wait_loop_cycles(4)
            .build()
            .unwrap();
        assert_eq!(timing.reset_min_ticks(), 478);
        assert_eq!(timing.reset_window_ticks(), 484);
        assert_eq!(timing.presence_ticks(), 122);
        assert_eq!(timing.first_signal_retry_ticks(), 100);
        assert_eq!(timing.slot_signal_loops(), 40_000);
    }

    #[test]
    fn poll_period() {
        assert_eq!(TimingBuilder::new(16_000_000).poll_ns(), 375);
        assert_eq!(TimingBuilder::new(16_000_000).with_wait_loop_cycles(16).poll_ns(), 1000);
    }

    #[test]
    fn invalid_configurations() {
        assert_eq!(
            TimingBuilder::new(16_000_000).with_tick_us(0).build(),
            Err(OneWireSlaveError::ZeroTickPeriod)
        );
        assert_eq!(
            TimingBuilder::new(16_000_000).with_tick_us(101).build(),
            Err(OneWireSlaveError::TickPeriodTooLong)
        );
        assert_eq!(
            TimingBuilder::new(16_000_000).with_wait_loop_cycles(0).build(),
            Err(OneWireSlaveError::ZeroLoopCycles)
        );
        assert_eq!(TimingBuilder::new(10_000).build(), Err(OneWireSlaveError::ClockTooSlow));
    }

    #[test]
    fn coarsest_tick() {
        let timing = TimingBuilder::new(1_000_000).with_tick_us(100).build().unwrap();
        assert_eq!(timing.first_signal_retry_ticks(), 1);
        assert_eq!(timing.reset_min_ticks(), 2);
        assert_eq!(timing.presence_ticks(), 3);
    }
}
