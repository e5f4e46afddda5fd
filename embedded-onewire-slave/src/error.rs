/// Configuration error type for the 1-Wire slave.
///
/// These are reported while a bus is being set up. Once the engine runs,
/// bus faults are only visible through the sticky error flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneWireSlaveError {
    /// The soft timer tick period is zero.
    ZeroTickPeriod,
    /// The soft timer tick is too coarse to express the 100 µs first-signal retry period.
    TickPeriodTooLong,
    /// A polling iteration was configured to take zero CPU cycles.
    ZeroLoopCycles,
    /// The CPU clock is too slow for at least one bounded wait to get a single iteration.
    ClockTooSlow,
    /// Computed CRC of the ROM is invalid.
    InvalidRomCrc,
}

/// A slot deadline was missed while the sticky error flag was raised.
///
/// Used internally so ROM command handlers can bail out with `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotTimeout;
