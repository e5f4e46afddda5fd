use core::cell::RefCell;

use critical_section::Mutex;

/// A slave shared between interrupt handlers and the application.
///
/// Meant for a `static`: the application installs the slave once at start-up,
/// and the pin-change and timer handlers reach it through
/// [`SharedSlave::with`].
///
/// ```
/// # use embedded_onewire_slave::{Countdown, DeviceId, OneWireSlave, SharedSlave, TimingBuilder};
/// # use embedded_onewire_slave::OneWireLine;
/// # use embedded_hal::delay::DelayNs;
/// # struct Pin;
/// # impl OneWireLine for Pin {
/// #     fn is_pin(&mut self) -> bool { true }
/// #     fn set_ddr(&mut self, _drive: bool) {}
/// #     fn set_port(&mut self, _high: bool) {}
/// # }
/// # struct Delay;
/// # impl DelayNs for Delay { fn delay_ns(&mut self, _ns: u32) {} }
/// type Slave = OneWireSlave<Pin, Countdown, DeviceId, fn(), Delay>;
///
/// static BUS: SharedSlave<Slave> = SharedSlave::new();
///
/// fn pin_change_interrupt() {
///     BUS.with(|slave| slave.on_pin_change());
/// }
///
/// fn timer_interrupt() {
///     BUS.with(|slave| slave.on_tick());
/// }
///
/// let timing = TimingBuilder::new(16_000_000).build().unwrap();
/// let id = DeviceId::new(0x28, [1, 2, 3, 4, 5, 6]);
/// BUS.install(OneWireSlave::new(Pin, Countdown::new(), id, (|| {}) as fn(), Delay, timing));
/// pin_change_interrupt();
/// timer_interrupt();
/// BUS.with(|slave| slave.set_alarm_on());
/// ```
pub struct SharedSlave<S> {
    inner: Mutex<RefCell<Option<S>>>,
}

impl<S> SharedSlave<S> {
    /// Empty slot.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Place the slave, returning the previous one.
    pub fn install(&self, slave: S) -> Option<S> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(slave))
    }

    /// Take the slave out.
    pub fn take(&self) -> Option<S> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take())
    }

    /// Run `f` on the slave inside a critical section.
    ///
    /// Returns `None` if no slave is installed yet.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).as_mut().map(f))
    }
}

impl<S> Default for SharedSlave<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_until_installed() {
        let shared: SharedSlave<u32> = SharedSlave::new();
        assert_eq!(shared.with(|v| *v), None);
        assert_eq!(shared.install(7), None);
        let bumped = shared.with(|v| {
            *v += 1;
            *v
        });
        assert_eq!(bumped, Some(8));
        assert_eq!(shared.install(1), Some(8));
        assert_eq!(shared.take(), Some(1));
        assert_eq!(shared.take(), None);
    }

    #[test]
    fn usable_from_a_static() {
        static COUNTER: SharedSlave<u8> = SharedSlave::new();
        COUNTER.install(0);
        for _ in 0..3 {
            COUNTER.with(|v| *v += 1);
        }
        assert_eq!(COUNTER.take(), Some(3));
    }
}
