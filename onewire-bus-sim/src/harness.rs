use embedded_onewire_slave::{
    Countdown, FunctionHandler, OneWireSlave, OneWireSlaveResult, RomStore, TimingBuilder,
};
use log::{debug, trace};

use crate::{MasterScript, SimBus, SimDelay, SimLine, Transcript};

/// The slave as it runs on a [`SimBus`].
pub type SimSlave<R, H> = OneWireSlave<SimLine, Countdown, R, H, SimDelay>;

/// Margin run past the end of a script so the slave can settle.
pub const SETTLE_NS: u64 = 25_000_000;

#[derive(Debug, Clone, Copy)]
enum Event {
    PinChange,
    Tick,
}

/// Drives a slave against a scripted master the way the two interrupts of a
/// microcontroller would.
///
/// Between events the clock jumps to the next master edge or soft-timer tick.
/// Handlers run to completion and advance the clock themselves by polling the
/// line and busy-waiting. A line change during a handler latches one pending
/// pin change, delivered as soon as the handler returns. Ticks that fall inside
/// a handler collapse into one late tick. When both are due, the pin change
/// goes first.
pub struct Harness<R, H> {
    bus: SimBus,
    slave: SimSlave<R, H>,
    script: MasterScript,
    tick_ns: u64,
    next_tick_ns: u64,
    last_level: bool,
    pin_pending: bool,
    events: u64,
}

impl<R, H> Harness<R, H>
where
    R: RomStore,
    H: FunctionHandler<SimLine, SimDelay>,
{
    /// Set up a bus for `script` and a slave with `rom` and `handler`.
    pub fn new(
        builder: TimingBuilder,
        script: MasterScript,
        rom: R,
        handler: H,
    ) -> OneWireSlaveResult<Self> {
        let timing = builder.build()?;
        let bus = SimBus::new(script.lows(), builder.poll_ns());
        let slave = OneWireSlave::new(
            bus.line(),
            Countdown::new(),
            rom,
            handler,
            bus.delay(),
            timing,
        );
        let tick_ns = timing.tick_us() as u64 * 1_000;
        Ok(Self {
            last_level: bus.level(),
            bus,
            slave,
            script,
            tick_ns,
            next_tick_ns: tick_ns,
            pin_pending: false,
            events: 0,
        })
    }

    /// Run through the end of the script, plus [`SETTLE_NS`].
    ///
    /// A script ending in [`MasterScript::hold_low_forever`] has no end; run
    /// it with [`Harness::run_until`].
    pub fn run(&mut self) {
        let end = self.script.cursor_ns().saturating_add(SETTLE_NS);
        self.run_until(end);
    }

    /// Run until the clock reaches `end_ns`.
    pub fn run_until(&mut self, end_ns: u64) {
        while self.bus.now_ns() < end_ns {
            let now = self.bus.now_ns();
            if self.pin_pending || self.bus.level() != self.last_level {
                self.pin_pending = false;
                self.dispatch(Event::PinChange);
                continue;
            }
            if now >= self.next_tick_ns {
                self.next_tick_ns = (now / self.tick_ns + 1) * self.tick_ns;
                self.dispatch(Event::Tick);
                continue;
            }

            let next = self
                .bus
                .next_master_edge_after(now)
                .map_or(self.next_tick_ns, |edge| edge.min(self.next_tick_ns));
            if next >= end_ns {
                self.bus.advance_to(end_ns);
                break;
            }
            self.bus.advance_to(next);
        }
        debug!(
            "sim: ran to {} ns, {} events, {} polls, stage {:?}",
            self.bus.now_ns(),
            self.events,
            self.bus.polls(),
            self.slave.stage()
        );
    }

    fn dispatch(&mut self, event: Event) {
        let t0 = self.bus.now_ns();
        let level = self.bus.level();
        trace!("sim: {:?} at {} ns, line {}", event, t0, level);
        match event {
            Event::PinChange => self.slave.on_pin_change(),
            Event::Tick => self.slave.on_tick(),
        }
        self.events += 1;
        let t1 = self.bus.now_ns();
        self.pin_pending =
            (t1 > t0 && self.bus.changed_between(t0, t1, level)) || self.bus.level() != level;
        self.last_level = self.bus.level();
    }
}

impl<R, H> Harness<R, H> {
    /// The slave under test.
    pub fn slave(&self) -> &SimSlave<R, H> {
        &self.slave
    }

    /// Mutable access to the slave, e.g. to raise its alarm between runs.
    pub fn slave_mut(&mut self) -> &mut SimSlave<R, H> {
        &mut self.slave
    }

    /// The wire.
    pub fn bus(&self) -> &SimBus {
        &self.bus
    }

    /// What the master saw at each of its sample points.
    pub fn transcript(&self) -> Transcript {
        Transcript {
            presence: self
                .script
                .presence_samples()
                .iter()
                .map(|&t| !self.bus.level_at(t))
                .collect(),
            bits: self
                .script
                .bit_samples()
                .iter()
                .map(|&t| self.bus.level_at(t))
                .collect(),
        }
    }

    /// Pulses the slave drove, as `(start, length)` in nanoseconds.
    pub fn slave_pulses(&self) -> Vec<(u64, u64)> {
        self.bus
            .slave_low_intervals()
            .into_iter()
            .map(|(start, end)| (start, end.saturating_sub(start)))
            .collect()
    }
}
