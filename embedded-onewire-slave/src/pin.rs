use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use crate::OneWireLine;

/// [`OneWireLine`] over an `embedded-hal` GPIO configured as open-drain
/// output with input enabled.
///
/// Writing the pin high releases the line to the pull-up; writing it low
/// sinks it. GPIO errors cannot be reported from inside a slot, so the first
/// one is logged and latched in [`OpenDrainPin::has_fault`], and the line
/// reads high (idle) from then on for failed reads.
pub struct OpenDrainPin<P> {
    pin: P,
    port_high: bool,
    fault: bool,
}

impl<P: InputPin + OutputPin> OpenDrainPin<P> {
    /// Wrap a pin. The line is not touched until the slave takes it over.
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            port_high: false,
            fault: false,
        }
    }

    /// Whether a GPIO operation ever failed.
    pub fn has_fault(&self) -> bool {
        self.fault
    }

    /// Release the wrapped pin.
    pub fn into_inner(self) -> P {
        self.pin
    }

    fn latch<E: core::fmt::Debug>(&mut self, err: E) {
        if !self.fault {
            warn!("onewire: gpio error {:?}", err);
        }
        self.fault = true;
    }
}

impl<P: InputPin + OutputPin> OneWireLine for OpenDrainPin<P> {
    fn is_pin(&mut self) -> bool {
        match self.pin.is_high() {
            Ok(high) => high,
            Err(e) => {
                self.latch(e);
                true
            }
        }
    }

    fn set_ddr(&mut self, drive: bool) {
        let res = if drive && !self.port_high {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        };
        if let Err(e) = res {
            self.latch(e);
        }
    }

    fn set_port(&mut self, high: bool) {
        self.port_high = high;
    }
}
