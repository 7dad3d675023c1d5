//! Fixed-step tick loop.
//!
//! The loop owns the simulation clock and the registration record for one
//! run. It is moved onto the tick thread by [`SyncService`](super::SyncService)
//! and handed back when the thread exits, so the final clock and recent tick
//! history survive the run.

use super::monitor::TickMonitor;
use super::{RegistrationRecord, SharedRegistry, SyncEvent};
use heapless::HistoryBuffer;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub const TICK_HISTORY_LEN: usize = 64;

/// Elapsed simulated time in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationClock {
    elapsed_usec: u64,
}

impl SimulationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, delta_time_usec: u64) -> u64 {
        self.elapsed_usec += delta_time_usec;
        self.elapsed_usec
    }

    pub fn elapsed_usec(&self) -> u64 {
        self.elapsed_usec
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickOutcome {
    pub tick_index: u64,
    pub sim_time_usec: u64,
    pub wall_clock_duration_usec: u64,
    pub overrun: bool,
    pub faulted_assets: u32,
}

pub struct TickLoop {
    record: RegistrationRecord,
    assets: SharedRegistry,
    clock: SimulationClock,
    next_tick: u64,
    monitor: Arc<TickMonitor>,
    events: Option<broadcast::Sender<SyncEvent>>,
    history: HistoryBuffer<TickOutcome, TICK_HISTORY_LEN>,
}

impl TickLoop {
    pub fn new(record: RegistrationRecord, assets: SharedRegistry) -> Self {
        Self::with_monitor(record, assets, Arc::new(TickMonitor::new()), None)
    }

    pub(crate) fn with_monitor(
        record: RegistrationRecord,
        assets: SharedRegistry,
        monitor: Arc<TickMonitor>,
        events: Option<broadcast::Sender<SyncEvent>>,
    ) -> Self {
        Self {
            record,
            assets,
            clock: SimulationClock::new(),
            next_tick: 0,
            monitor,
            events,
            history: HistoryBuffer::new(),
        }
    }

    /// Execute one tick: advance the clock, step every asset in registration
    /// order, and compare the wall time spent against the delay budget.
    ///
    /// Asset faults are reported and skipped; the clock advances regardless.
    pub fn tick(&mut self) -> TickOutcome {
        let started = Instant::now();
        self.monitor.begin_tick();

        let delta = self.record.delta_time_usec;
        let tick_index = self.next_tick;
        self.next_tick += 1;
        let sim_time_usec = self.clock.advance(delta);

        let mut faults = Vec::new();
        {
            let mut assets = self.assets.lock().unwrap_or_else(PoisonError::into_inner);
            for asset in assets.iter_mut() {
                if let Err(e) = asset.step(delta) {
                    faults.push((asset.name().to_string(), e));
                }
            }
        }

        let wall_clock_duration_usec = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        let outcome = TickOutcome {
            tick_index,
            sim_time_usec,
            wall_clock_duration_usec,
            overrun: wall_clock_duration_usec > self.record.max_delay_usec,
            faulted_assets: u32::try_from(faults.len()).unwrap_or(u32::MAX),
        };
        self.monitor.end_tick(&outcome);

        for (asset, error) in faults {
            warn!("⚠️  Tick {} fault in asset '{}': {}", tick_index, asset, error);
            self.publish(SyncEvent::AssetFault {
                tick_index,
                asset,
                error: error.to_string(),
            });
        }

        if outcome.overrun {
            warn!(
                "⏱️  Tick {} overrun: {}us wall clock exceeds max delay {}us",
                tick_index, wall_clock_duration_usec, self.record.max_delay_usec
            );
            self.publish(SyncEvent::Overrun(outcome));
        } else {
            debug!("Tick {} done in {}us (sim {}us)", tick_index, wall_clock_duration_usec, sim_time_usec);
        }

        self.history.write(outcome);
        outcome
    }

    /// Run ticks back to back until `stop_flag` is set. The flag is only
    /// checked between ticks, so a tick in progress always completes.
    pub fn run(mut self, stop_flag: &AtomicBool) -> Self {
        info!(
            "▶️  Tick loop for '{}' running (delta {}us, max delay {}us)",
            self.record.name, self.record.delta_time_usec, self.record.max_delay_usec
        );

        while !stop_flag.load(Ordering::Acquire) {
            self.tick();
        }

        info!(
            "⏹️  Tick loop for '{}' stopped after {} ticks at sim time {}us",
            self.record.name,
            self.next_tick,
            self.clock.elapsed_usec()
        );
        self
    }

    pub fn clock(&self) -> SimulationClock {
        self.clock
    }

    pub fn ticks(&self) -> u64 {
        self.next_tick
    }

    pub fn record(&self) -> &RegistrationRecord {
        &self.record
    }

    pub fn monitor(&self) -> &Arc<TickMonitor> {
        &self.monitor
    }

    /// Most recent outcomes, oldest first.
    pub fn recent_outcomes(&self) -> Vec<TickOutcome> {
        self.history.oldest_ordered().copied().collect()
    }

    fn publish(&self, event: SyncEvent) {
        if let Some(events) = &self.events {
            // No subscribers is not an error.
            let _ = events.send(event);
        }
    }
}
