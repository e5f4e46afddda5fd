use std::{cell::RefCell, rc::Rc};

use embedded_hal::delay::DelayNs;
use embedded_onewire_slave::OneWireLine;

/// Shared state of the simulated wire.
#[derive(Debug)]
struct Wire {
    now_ns: u64,
    poll_ns: u64,
    /// Sorted, non-overlapping `[start, end)` intervals where the master sinks the line.
    master_low: Vec<(u64, u64)>,
    /// Every change of the slave's drive, in time order.
    slave_drive: Vec<(u64, bool)>,
    slave_port_high: bool,
    polls: u64,
}

impl Wire {
    fn master_low_at(&self, t: u64) -> bool {
        let idx = self.master_low.partition_point(|&(start, _)| start <= t);
        idx > 0 && self.master_low[idx - 1].1 > t
    }

    fn slave_sinks_at(&self, t: u64) -> bool {
        let idx = self.slave_drive.partition_point(|&(at, _)| at <= t);
        idx > 0 && self.slave_drive[idx - 1].1
    }

    fn level_at(&self, t: u64) -> bool {
        !(self.master_low_at(t) || self.slave_sinks_at(t))
    }
}

/// Virtual-time 1-Wire bus shared by the simulated master and slave.
///
/// The level is high unless the master (scripted up front) or the slave sinks
/// it. Time only moves when the slave polls the line or busy-waits, or when
/// the [`Harness`](crate::Harness) advances it between events.
#[derive(Debug, Clone)]
pub struct SimBus {
    wire: Rc<RefCell<Wire>>,
}

impl SimBus {
    /// Bus with the master's low intervals, where one polling iteration of the
    /// slave costs `poll_ns`.
    pub fn new(mut master_low: Vec<(u64, u64)>, poll_ns: u64) -> Self {
        master_low.retain(|&(start, end)| end > start);
        master_low.sort_unstable();
        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(master_low.len());
        for (start, end) in master_low {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        Self {
            wire: Rc::new(RefCell::new(Wire {
                now_ns: 0,
                poll_ns: poll_ns.max(1),
                master_low: merged,
                slave_drive: Vec::new(),
                slave_port_high: false,
                polls: 0,
            })),
        }
    }

    /// Current virtual time.
    pub fn now_ns(&self) -> u64 {
        self.wire.borrow().now_ns
    }

    /// Move the clock forward to `t`. Never moves it back.
    pub fn advance_to(&self, t: u64) {
        let mut wire = self.wire.borrow_mut();
        wire.now_ns = wire.now_ns.max(t);
    }

    /// Move the clock forward by `ns`.
    pub fn advance_by(&self, ns: u64) {
        let mut wire = self.wire.borrow_mut();
        wire.now_ns = wire.now_ns.saturating_add(ns);
    }

    /// Level of the line now.
    pub fn level(&self) -> bool {
        let wire = self.wire.borrow();
        wire.level_at(wire.now_ns)
    }

    /// Level of the line at `t`, as far as the slave's drive history is known.
    pub fn level_at(&self, t: u64) -> bool {
        self.wire.borrow().level_at(t)
    }

    /// First master edge strictly after `t`.
    pub fn next_master_edge_after(&self, t: u64) -> Option<u64> {
        let wire = self.wire.borrow();
        let idx = wire.master_low.partition_point(|&(_, end)| end <= t);
        wire.master_low[idx..]
            .iter()
            .flat_map(|&(start, end)| [start, end])
            .find(|&edge| edge > t && edge != u64::MAX)
    }

    /// Whether the level differed from `level` at any point of `[t0, t1]`.
    ///
    /// That is what latches a pin-change interrupt while its handler is
    /// already running.
    pub fn changed_between(&self, t0: u64, t1: u64, level: bool) -> bool {
        let wire = self.wire.borrow();
        let master = wire
            .master_low
            .iter()
            .flat_map(|&(start, end)| [start, end])
            .filter(|&edge| (t0..=t1).contains(&edge));
        let slave = wire
            .slave_drive
            .iter()
            .map(|&(at, _)| at)
            .filter(|&at| (t0..=t1).contains(&at));
        master.chain(slave).any(|t| wire.level_at(t) != level)
    }

    /// Intervals during which the slave sank the line.
    pub fn slave_low_intervals(&self) -> Vec<(u64, u64)> {
        let wire = self.wire.borrow();
        let mut intervals = Vec::new();
        let mut since = None;
        for &(at, sinks) in &wire.slave_drive {
            match (since, sinks) {
                (None, true) => since = Some(at),
                (Some(start), false) => {
                    intervals.push((start, at));
                    since = None;
                }
                _ => {}
            }
        }
        if let Some(start) = since {
            intervals.push((start, u64::MAX));
        }
        intervals
    }

    /// Number of times the slave sampled the line.
    pub fn polls(&self) -> u64 {
        self.wire.borrow().polls
    }

    /// The slave's end of the wire.
    pub fn line(&self) -> SimLine {
        SimLine { bus: self.clone() }
    }

    /// Busy delays of the slave, spent on the bus clock.
    pub fn delay(&self) -> SimDelay {
        SimDelay { bus: self.clone() }
    }
}

/// The slave's pin on a [`SimBus`]. Each sample costs one polling iteration.
#[derive(Debug, Clone)]
pub struct SimLine {
    bus: SimBus,
}

impl OneWireLine for SimLine {
    fn is_pin(&mut self) -> bool {
        let mut wire = self.bus.wire.borrow_mut();
        let level = wire.level_at(wire.now_ns);
        wire.now_ns += wire.poll_ns;
        wire.polls += 1;
        level
    }

    fn set_ddr(&mut self, drive: bool) {
        let mut wire = self.bus.wire.borrow_mut();
        let sinks = drive && !wire.slave_port_high;
        let changed = wire.slave_drive.last().map_or(sinks, |&(_, last)| last != sinks);
        if changed {
            let now = wire.now_ns;
            wire.slave_drive.push((now, sinks));
        }
    }

    fn set_port(&mut self, high: bool) {
        self.bus.wire.borrow_mut().slave_port_high = high;
    }
}

/// Busy delay that advances the bus clock.
#[derive(Debug, Clone)]
pub struct SimDelay {
    bus: SimBus,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.bus.advance_by(ns as u64);
    }
}
