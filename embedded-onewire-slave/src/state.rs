use bitfield_struct::bitfield;

use crate::RomCommand;

/// Stage of the bus state machine.
///
/// Exactly one stage is live per bus line. It only changes in response to a
/// pin change or a soft-timer expiry.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for the line to go low.
    #[default]
    Idle,
    /// Line went low; waiting for the minimum RESET time to elapse.
    WaitingResetMin,
    /// Minimum RESET time elapsed with the line low; waiting for the release.
    WaitingResetMax,
    /// The slave is sinking the line to signal its presence.
    PresencePulseOn,
    /// PRESENCE is done; waiting for the master to start the first slot.
    WaitingFirstSignal,
}

/// Flags of the 1-Wire slave, packed the way they would sit in a register.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Flags {
    /// Consumes the edge produced by releasing the PRESENCE pulse.
    pub ignore_one_change: bool,
    /// Raised by the application; gates participation in ALARM SEARCH.
    pub alarm: bool,
    /// A slot deadline was missed in the current frame.
    pub error: bool,
    /// The falling edge of the frame's first slot has already been consumed.
    pub slot_started: bool,
    #[bits(4)]
    __: u8,
}

impl Flags {
    /// Clear every flag owned by the engine, keeping the application's alarm.
    pub(crate) fn clear_transient(&mut self) {
        *self = Flags::new().with_alarm(self.alarm());
    }
}

/// How the most recent command frame ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The command ran to completion; for MATCH and SKIP the application
    /// callback was invoked.
    Completed(RomCommand),
    /// The master selected another device (search branch or MATCH byte mismatch).
    Deselected(RomCommand),
    /// ALARM SEARCH was received while the alarm flag was cleared.
    AlarmInactive,
    /// The command byte is not a ROM command.
    Unsupported(u8),
    /// A slot deadline was missed, either while reading the command byte
    /// (`None`) or while executing the command.
    Faulted(Option<RomCommand>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_pack_into_low_nibble() {
        let flags = Flags::new()
            .with_ignore_one_change(true)
            .with_alarm(true)
            .with_error(true)
            .with_slot_started(true);
        assert_eq!(flags.into_bits(), 0x0f);
        assert_eq!(Flags::new().with_alarm(true).into_bits(), 0b0010);
    }

    #[test]
    fn clearing_transient_flags_keeps_alarm() {
        let mut flags = Flags::from_bits(0x0f);
        flags.clear_transient();
        assert_eq!(flags, Flags::new().with_alarm(true));

        let mut flags = Flags::new().with_error(true).with_slot_started(true);
        flags.clear_transient();
        assert_eq!(flags, Flags::new());
    }

    #[test]
    fn stage_defaults_to_idle() {
        assert_eq!(Stage::default(), Stage::Idle);
    }
}
