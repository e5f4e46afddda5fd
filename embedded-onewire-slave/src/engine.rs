use embedded_hal::delay::DelayNs;
use log::{debug, trace, warn};

use crate::{
    Countdown, Flags, FrameOutcome, FunctionHandler, OneWireLine, RomStore, SlotIo, SoftTimer,
    Stage, Timing,
};

/// A 1-Wire slave on one physical bus line.
///
/// The engine is driven by two events, both delivered with interrupts
/// disabled and never nested:
/// - [`on_pin_change`](Self::on_pin_change) from the line's edge interrupt,
/// - [`on_timer_expired`](Self::on_timer_expired) when the soft timer runs out
///   (or [`on_tick`](Self::on_tick) once per period when the engine owns a
///   [`Countdown`]).
///
/// Once a command frame starts, the ROM command and, if the device is
/// selected, the application handler run to completion inside the pin-change
/// event. Every path out of a frame, fault or not, returns to [`Stage::Idle`].
///
/// # Type parameters
/// * `L` - the data line, [`OneWireLine`].
/// * `T` - the soft timer, [`SoftTimer`].
/// * `R` - the ROM, [`RomStore`].
/// * `H` - the application handler, [`FunctionHandler`].
/// * `D` - busy delays, [`DelayNs`].
pub struct OneWireSlave<L, T, R, H, D> {
    pub(crate) io: SlotIo<L, D>,
    pub(crate) timer: T,
    pub(crate) rom: R,
    pub(crate) handler: H,
    stage: Stage,
    first_signal_allowed_iterations: u16,
    last_frame: Option<FrameOutcome>,
}

impl<L, T, R, H, D> OneWireSlave<L, T, R, H, D>
where
    L: OneWireLine,
    T: SoftTimer,
    R: RomStore,
    H: FunctionHandler<L, D>,
    D: DelayNs,
{
    /// Takes ownership of the bus resources and releases the line.
    ///
    /// Must be called before the pin-change and timer interrupts are enabled.
    pub fn new(line: L, timer: T, rom: R, handler: H, delay: D, timing: Timing) -> Self {
        let mut timer = timer;
        timer.cancel();
        Self {
            io: SlotIo::new(line, delay, timing),
            timer,
            rom,
            handler,
            stage: Stage::Idle,
            first_signal_allowed_iterations: 0,
            last_frame: None,
        }
    }

    /// Handle a level change of the data line.
    ///
    /// Must be called from the pin-change interrupt, with interrupts disabled.
    pub fn on_pin_change(&mut self) {
        // Sample first: the level is what this event is about.
        let high = self.io.is_high();
        let timing = *self.io.timing();

        match self.stage {
            Stage::Idle => {
                if !high {
                    // Either a RESET or just a slot on a frame addressed to
                    // someone else. Only a RESET stays low long enough.
                    self.timer.set(timing.reset_min_ticks());
                    self.set_stage(Stage::WaitingResetMin);
                }
            }
            Stage::WaitingResetMin => {
                // Released too soon.
                self.abort();
            }
            Stage::WaitingResetMax => {
                if high {
                    self.io.delay_us(crate::timing::DELAY_BEFORE_PRESENCE_US);
                    self.io.sink();
                    self.timer.set(timing.presence_ticks());
                    self.set_stage(Stage::PresencePulseOn);
                    debug!("onewire: reset detected, presence pulse on");
                } else {
                    // Missed an edge; not a RESET we can trust.
                    self.abort();
                }
            }
            Stage::PresencePulseOn => {
                // We are switching the line ourselves.
            }
            Stage::WaitingFirstSignal => {
                if self.io.flags.ignore_one_change() {
                    self.io.flags.set_ignore_one_change(false);
                    return;
                }
                self.timer.cancel();
                self.set_stage(Stage::Idle);

                let outcome = self.read_and_handle_command();
                self.io.flags.clear_transient();
                debug!("onewire: frame ended: {:?}", outcome);
                self.last_frame = Some(outcome);
            }
        }
    }

    /// Handle expiry of the soft timer.
    ///
    /// Must be called from the timer interrupt, with interrupts disabled.
    pub fn on_timer_expired(&mut self) {
        let timing = *self.io.timing();

        match self.stage {
            Stage::WaitingResetMin => {
                // Long enough for a RESET; make sure it is not a stuck line.
                self.timer.set(timing.reset_window_ticks());
                self.set_stage(Stage::WaitingResetMax);
            }
            Stage::PresencePulseOn => {
                self.io.release();
                // Every device on the bus has to release for the line to rise.
                self.io.wait_for_high(timing.presence_release_loops());
                if self.io.is_error() {
                    warn!("onewire: line stuck low after presence pulse, short circuit?");
                    self.abort();
                } else {
                    // Releasing the line is itself an edge.
                    self.io.flags.set_ignore_one_change(true);
                    self.first_signal_allowed_iterations = timing.first_signal_retries();
                    self.timer.set(timing.first_signal_retry_ticks());
                    self.set_stage(Stage::WaitingFirstSignal);
                }
            }
            Stage::WaitingFirstSignal => {
                if self.first_signal_allowed_iterations == 0 {
                    debug!("onewire: no slot after presence pulse");
                    self.abort();
                } else {
                    self.first_signal_allowed_iterations -= 1;
                    self.timer.set(timing.first_signal_retry_ticks());
                }
            }
            Stage::Idle | Stage::WaitingResetMax => {}
        }
    }

    /// Cancel whatever the engine is doing and go back to waiting for a RESET.
    ///
    /// Clears every flag except the alarm.
    pub fn abort(&mut self) {
        self.timer.cancel();
        self.io.flags.clear_transient();
        self.set_stage(Stage::Idle);
    }

    fn set_stage(&mut self, stage: Stage) {
        trace!("onewire: {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }
}

impl<L, R, H, D> OneWireSlave<L, Countdown, R, H, D>
where
    L: OneWireLine,
    R: RomStore,
    H: FunctionHandler<L, D>,
    D: DelayNs,
{
    /// Advance the soft timer by one period and handle its expiry.
    ///
    /// Called from the periodic timer interrupt, exactly once per period.
    pub fn on_tick(&mut self) {
        if self.timer.tick() {
            self.on_timer_expired();
        }
    }
}

impl<L, T, R, H, D> OneWireSlave<L, T, R, H, D> {
    /// Current stage of the state machine.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Current flags.
    pub fn flags(&self) -> Flags {
        self.io.flags
    }

    /// How the most recent command frame ended, if there was one.
    pub fn last_frame(&self) -> Option<FrameOutcome> {
        self.last_frame
    }

    /// Timing this bus runs with.
    pub fn timing(&self) -> &Timing {
        self.io.timing()
    }

    /// Raise the alarm condition, so the device answers ALARM SEARCH.
    pub fn set_alarm_on(&mut self) {
        self.io.flags.set_alarm(true);
    }

    /// Clear the alarm condition.
    pub fn set_alarm_off(&mut self) {
        self.io.flags.set_alarm(false);
    }

    /// Return true if the alarm condition is raised.
    pub fn is_alarm(&self) -> bool {
        self.io.flags.alarm()
    }

    /// Return true if a slot deadline was missed in the current frame.
    pub fn is_error(&self) -> bool {
        self.io.is_error()
    }

    /// Turn the error flag on.
    pub fn set_error_on(&mut self) {
        self.io.set_error_on();
    }

    /// Turn the error flag off.
    pub fn set_error_off(&mut self) {
        self.io.set_error_off();
    }

    /// Soft timer driving this bus.
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Application handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutable access to the application handler.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Release the bus resources: line, timer, ROM, handler and delay.
    pub fn free(self) -> (L, T, R, H, D) {
        let (line, delay) = self.io.into_parts();
        (line, self.timer, self.rom, self.handler, delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceId, TimingBuilder};
    use embedded_hal_mock::eh1::delay::NoopDelay;

    /// Line whose level is set by the test; the slave sinking it reads low.
    #[derive(Default)]
    struct Line {
        master_low: bool,
        driving: bool,
        sinks: usize,
    }

    impl OneWireLine for Line {
        fn is_pin(&mut self) -> bool {
            !(self.master_low || self.driving)
        }

        fn set_ddr(&mut self, drive: bool) {
            if drive && !self.driving {
                self.sinks += 1;
            }
            self.driving = drive;
        }

        fn set_port(&mut self, _high: bool) {}
    }

    type Slave = OneWireSlave<Line, Countdown, DeviceId, fn(), NoopDelay>;

    fn slave() -> Slave {
        let timing = TimingBuilder::new(16_000_000).with_tick_us(16).build().unwrap();
        OneWireSlave::new(
            Line::default(),
            Countdown::new(),
            DeviceId::new(0x28, [1, 2, 3, 4, 5, 6]),
            (|| {}) as fn(),
            NoopDelay::new(),
            timing,
        )
    }

    fn master_low(slave: &mut Slave, low: bool) {
        slave.io.line_mut().master_low = low;
        slave.on_pin_change();
    }

    fn ticks(slave: &mut Slave, n: u16) {
        for _ in 0..n {
            slave.on_tick();
        }
    }

    /// RESET long enough, then let the presence pulse run out.
    fn reset_and_presence(slave: &mut Slave) {
        master_low(slave, true);
        ticks(slave, 28);
        master_low(slave, false);
        assert_eq!(slave.stage(), Stage::PresencePulseOn);
        ticks(slave, 9);
        assert_eq!(slave.stage(), Stage::WaitingFirstSignal);
        // edge of our own release
        slave.on_pin_change();
    }

    #[test]
    fn short_low_is_not_reset() {
        let mut slave = slave();
        master_low(&mut slave, true);
        assert_eq!(slave.stage(), Stage::WaitingResetMin);
        ticks(&mut slave, 27);
        master_low(&mut slave, false);
        assert_eq!(slave.stage(), Stage::Idle);
        assert!(!slave.timer().is_armed());
        assert_eq!(slave.io.line_mut().sinks, 0);
    }

    #[test]
    fn reset_gets_presence() {
        let mut slave = slave();
        master_low(&mut slave, true);
        ticks(&mut slave, 28);
        assert_eq!(slave.stage(), Stage::WaitingResetMax);
        master_low(&mut slave, false);
        assert_eq!(slave.stage(), Stage::PresencePulseOn);
        assert!(slave.io.line_mut().driving);
        // our own sinking edge
        slave.on_pin_change();
        assert_eq!(slave.stage(), Stage::PresencePulseOn);
        ticks(&mut slave, 8);
        assert!(slave.io.line_mut().driving);
        ticks(&mut slave, 1);
        assert!(!slave.io.line_mut().driving);
        assert_eq!(slave.stage(), Stage::WaitingFirstSignal);
        assert!(slave.flags().ignore_one_change());
    }

    #[test]
    fn presence_lasts_presence_ticks() {
        let mut slave = slave();
        let presence = slave.io.timing().presence_ticks();
        assert_eq!(presence, 9);
        master_low(&mut slave, true);
        ticks(&mut slave, 28);
        master_low(&mut slave, false);
        assert_eq!(slave.io.line_mut().sinks, 1);
        ticks(&mut slave, presence - 1);
        assert!(slave.io.line_mut().driving);
        ticks(&mut slave, 1);
        assert!(!slave.io.line_mut().driving);
        assert_eq!(slave.io.line_mut().sinks, 1);
    }

    #[test]
    fn tick_pending_at_presence_start_counts() {
        // A tick that fell inside the delay before sinking is delivered right
        // after the pulse starts. It counts, so the pulse spans one period
        // less; the 2T margin of the presence width covers it.
        let mut slave = slave();
        master_low(&mut slave, true);
        ticks(&mut slave, 28);
        master_low(&mut slave, false);
        ticks(&mut slave, 1);
        assert!(slave.io.line_mut().driving);
        ticks(&mut slave, 7);
        assert!(slave.io.line_mut().driving);
        ticks(&mut slave, 1);
        assert!(!slave.io.line_mut().driving);
        assert_eq!(slave.stage(), Stage::WaitingFirstSignal);
    }

    #[test]
    fn reset_around_max_window() {
        // 28 ticks for the minimum, 34 more for the maximum; running past the
        // maximum changes nothing.
        for low_ticks in [61, 62, 63] {
            let mut slave = slave();
            master_low(&mut slave, true);
            ticks(&mut slave, low_ticks);
            assert_eq!(slave.stage(), Stage::WaitingResetMax, "{low_ticks} ticks");
            master_low(&mut slave, false);
            assert_eq!(slave.stage(), Stage::PresencePulseOn, "{low_ticks} ticks");
            assert_eq!(slave.io.line_mut().sinks, 1);
        }
    }

    #[test]
    fn over_long_reset_is_accepted() {
        let mut slave = slave();
        master_low(&mut slave, true);
        ticks(&mut slave, 28 + 34 + 100);
        assert_eq!(slave.stage(), Stage::WaitingResetMax);
        master_low(&mut slave, false);
        assert_eq!(slave.stage(), Stage::PresencePulseOn);
    }

    #[test]
    fn low_again_while_waiting_for_release() {
        let mut slave = slave();
        master_low(&mut slave, true);
        ticks(&mut slave, 28);
        // a second falling edge: we missed the rising one
        slave.on_pin_change();
        assert_eq!(slave.stage(), Stage::Idle);
        assert!(!slave.timer().is_armed());
    }

    #[test]
    fn short_circuit_after_presence() {
        let mut slave = slave();
        master_low(&mut slave, true);
        ticks(&mut slave, 28);
        master_low(&mut slave, false);
        // another device holds the line
        slave.io.line_mut().master_low = true;
        ticks(&mut slave, 9);
        assert_eq!(slave.stage(), Stage::Idle);
        assert!(!slave.is_error());
        assert_eq!(slave.flags(), Flags::new());
    }

    #[test]
    fn first_signal_gives_up() {
        let mut slave = slave();
        reset_and_presence(&mut slave);
        assert!(!slave.flags().ignore_one_change());
        // 200 re-arms of 6 ticks, then the final expiry
        ticks(&mut slave, 200 * 6);
        assert_eq!(slave.stage(), Stage::WaitingFirstSignal);
        ticks(&mut slave, 6);
        assert_eq!(slave.stage(), Stage::Idle);
        assert!(!slave.timer().is_armed());
        assert_eq!(slave.last_frame(), None);
    }

    #[test]
    fn missed_command_byte_faults_frame() {
        let mut slave = slave();
        reset_and_presence(&mut slave);
        // First slot starts and the line is released before sampling: bit 0 is 1.
        // Nothing else ever happens, so bit 1 times out.
        slave.io.line_mut().master_low = false;
        slave.on_pin_change();
        assert_eq!(slave.stage(), Stage::Idle);
        assert_eq!(slave.last_frame(), Some(FrameOutcome::Faulted(None)));
        assert_eq!(slave.flags(), Flags::new());
    }

    #[test]
    fn alarm_survives_aborts() {
        let mut slave = slave();
        slave.set_alarm_on();
        slave.set_error_on();
        slave.abort();
        assert!(slave.is_alarm());
        assert!(!slave.is_error());
        assert_eq!(slave.flags(), Flags::new().with_alarm(true));
        slave.set_alarm_off();
        assert!(!slave.is_alarm());
    }

    #[test]
    fn free_returns_parts() {
        let slave = slave();
        let (line, timer, rom, _handler, _delay) = slave.free();
        assert!(!line.driving);
        assert!(!timer.is_armed());
        assert_eq!(rom.family(), 0x28);
    }
}
