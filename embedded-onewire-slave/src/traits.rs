use crate::{DeviceId, SlotIo};

/// The data line shared with the bus master.
///
/// Implementations are expected to be plain register accesses: every method is
/// called with interrupts disabled, from inside busy-wait loops whose iteration
/// cost is part of the configured [`Timing`](crate::Timing).
pub trait OneWireLine {
    /// Current electrical level of the line, `true` when high.
    fn is_pin(&mut self) -> bool;

    /// Drive the line (`true`, sink it to the idle output level) or release it
    /// to the pull-up (`false`).
    fn set_ddr(&mut self, drive: bool);

    /// Output level used while the line is driven.
    ///
    /// Set once, to low, during initialization so the line floats high when
    /// released.
    fn set_port(&mut self, high: bool);
}

/// One-shot countdown backed by a periodic interrupt.
///
/// When the countdown reaches zero the owner of the timer calls
/// [`OneWireSlave::on_timer_expired`](crate::OneWireSlave::on_timer_expired).
pub trait SoftTimer {
    /// Arm the countdown for `ticks` soft-timer periods, replacing any pending one.
    fn set(&mut self, ticks: u16);

    /// Disarm the countdown.
    fn cancel(&mut self);
}

/// Read-only storage of the 8 ROM bytes (7 identifier bytes and the CRC).
pub trait RomStore {
    /// Read the ROM byte at `index` (0 = family code, 7 = CRC).
    fn read_rom_byte(&mut self, index: usize) -> u8;
}

/// Application code run once the device has been selected by SKIP ROM or a
/// successful MATCH ROM.
///
/// Any `FnMut()` closure is a handler. Handler types that continue the
/// transaction with function commands use the [`SlotIo`] they are given;
/// it is still inside the frame, so its error flag reports missed deadlines.
pub trait FunctionHandler<L, D> {
    /// Called with interrupts disabled; must not enable them.
    fn on_selected(&mut self, io: &mut SlotIo<L, D>);
}

impl<L, D, F: FnMut()> FunctionHandler<L, D> for F {
    fn on_selected(&mut self, _io: &mut SlotIo<L, D>) {
        self()
    }
}

impl RomStore for [u8; 8] {
    fn read_rom_byte(&mut self, index: usize) -> u8 {
        self[index]
    }
}

impl RomStore for DeviceId {
    fn read_rom_byte(&mut self, index: usize) -> u8 {
        self.as_bytes()[index]
    }
}

impl<T: RomStore + ?Sized> RomStore for &mut T {
    fn read_rom_byte(&mut self, index: usize) -> u8 {
        (**self).read_rom_byte(index)
    }
}

impl<T: OneWireLine + ?Sized> OneWireLine for &mut T {
    fn is_pin(&mut self) -> bool {
        (**self).is_pin()
    }

    fn set_ddr(&mut self, drive: bool) {
        (**self).set_ddr(drive)
    }

    fn set_port(&mut self, high: bool) {
        (**self).set_port(high)
    }
}

impl<T: SoftTimer + ?Sized> SoftTimer for &mut T {
    fn set(&mut self, ticks: u16) {
        (**self).set(ticks)
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }
}
