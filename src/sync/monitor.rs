use super::tick::TickOutcome;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub ticks: u64,
    pub sim_time_usec: u64,
    pub overruns: u64,
    pub asset_faults: u64,
    pub last_tick_usec: u64,
    pub max_tick_usec: u64,
}

/// Counters published by the tick thread and read from any other thread.
///
/// The tick thread is the only writer.
#[derive(Debug)]
pub struct TickMonitor {
    epoch: Instant,
    ticks: AtomicU64,
    sim_time_usec: AtomicU64,
    overruns: AtomicU64,
    asset_faults: AtomicU64,
    last_tick_usec: AtomicU64,
    max_tick_usec: AtomicU64,
    // Offset from `epoch` plus one; zero while idle.
    tick_started: AtomicU64,
}

impl TickMonitor {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            ticks: AtomicU64::new(0),
            sim_time_usec: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            asset_faults: AtomicU64::new(0),
            last_tick_usec: AtomicU64::new(0),
            max_tick_usec: AtomicU64::new(0),
            tick_started: AtomicU64::new(0),
        }
    }

    pub(crate) fn begin_tick(&self) {
        let offset = u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX - 1);
        self.tick_started.store(offset + 1, Ordering::Release);
    }

    pub(crate) fn end_tick(&self, outcome: &TickOutcome) {
        self.sim_time_usec.store(outcome.sim_time_usec, Ordering::Release);
        self.last_tick_usec.store(outcome.wall_clock_duration_usec, Ordering::Relaxed);
        self.max_tick_usec.fetch_max(outcome.wall_clock_duration_usec, Ordering::Relaxed);
        if outcome.overrun {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
        self.asset_faults.fetch_add(u64::from(outcome.faulted_assets), Ordering::Relaxed);
        self.ticks.fetch_add(1, Ordering::Release);
        self.tick_started.store(0, Ordering::Release);
    }

    pub fn sim_time_usec(&self) -> u64 {
        self.sim_time_usec.load(Ordering::Acquire)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// How long the current tick has been running, or `None` between ticks.
    pub fn in_flight_for(&self) -> Option<Duration> {
        match self.tick_started.load(Ordering::Acquire) {
            0 => None,
            started => {
                let started = Duration::from_micros(started - 1);
                Some(self.epoch.elapsed().saturating_sub(started))
            }
        }
    }

    pub fn snapshot(&self) -> SyncStats {
        SyncStats {
            ticks: self.ticks.load(Ordering::Acquire),
            sim_time_usec: self.sim_time_usec.load(Ordering::Acquire),
            overruns: self.overruns.load(Ordering::Relaxed),
            asset_faults: self.asset_faults.load(Ordering::Relaxed),
            last_tick_usec: self.last_tick_usec.load(Ordering::Relaxed),
            max_tick_usec: self.max_tick_usec.load(Ordering::Relaxed),
        }
    }
}

impl Default for TickMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(wall: u64, overrun: bool, faults: u32) -> TickOutcome {
        TickOutcome {
            tick_index: 0,
            sim_time_usec: 1000,
            wall_clock_duration_usec: wall,
            overrun,
            faulted_assets: faults,
        }
    }

    #[test]
    fn test_idle_monitor_has_no_tick_in_flight() {
        let monitor = TickMonitor::new();
        assert!(monitor.in_flight_for().is_none());
        assert_eq!(monitor.snapshot(), SyncStats::default());
    }

    #[test]
    fn test_tick_in_flight_between_begin_and_end() {
        let monitor = TickMonitor::new();
        monitor.begin_tick();
        assert!(monitor.in_flight_for().is_some());
        monitor.end_tick(&outcome(10, false, 0));
        assert!(monitor.in_flight_for().is_none());
    }

    #[test]
    fn test_counters_accumulate() {
        let monitor = TickMonitor::new();
        monitor.end_tick(&outcome(10, false, 0));
        monitor.end_tick(&outcome(30, true, 2));
        monitor.end_tick(&outcome(20, false, 1));

        let stats = monitor.snapshot();
        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.overruns, 1);
        assert_eq!(stats.asset_faults, 3);
        assert_eq!(stats.last_tick_usec, 20);
        assert_eq!(stats.max_tick_usec, 30);
    }
}
