use crate::SoftTimer;

/// One-shot soft timer advanced by a periodic interrupt.
///
/// The periodic interrupt calls [`Countdown::tick`] once per period, or
/// [`OneWireSlave::on_tick`](crate::OneWireSlave::on_tick) when the engine
/// owns the countdown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u16,
}

impl Countdown {
    /// Disarmed countdown.
    pub const fn new() -> Self {
        Self { remaining: 0 }
    }

    /// Advance by one period. Returns true on the tick that reaches zero.
    pub fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.remaining == 0
    }

    /// Whether a countdown is pending.
    pub const fn is_armed(&self) -> bool {
        self.remaining != 0
    }

    /// Periods left until expiry.
    pub const fn remaining(&self) -> u16 {
        self.remaining
    }
}

impl SoftTimer for Countdown {
    fn set(&mut self, ticks: u16) {
        self.remaining = ticks;
    }

    fn cancel(&mut self) {
        self.remaining = 0;
    }
}
