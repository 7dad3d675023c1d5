//! Asset registration and the fixed-step synchronization service.
//!
//! A [`SyncService`] holds at most one active registration. Its lifecycle is
//!
//! ```text
//! Unregistered --register--> Ready --start--> Running --stop--> Stopped
//!                              ^                                   |
//!                              +-------------register--------------+
//! ```
//!
//! While running, a dedicated thread executes ticks back to back. Each tick
//! advances the simulation clock by `delta_time_usec`, steps every asset in
//! registration order and reports an overrun when the wall time spent
//! exceeds `max_delay_usec`. Overruns and asset faults are reported, never
//! fatal.

pub mod monitor;
pub mod tick;

pub use monitor::{SyncStats, TickMonitor};
pub use tick::{SimulationClock, TickLoop, TickOutcome, TICK_HISTORY_LEN};

use crate::registry::SharedRegistry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info};

const DEFAULT_EVENT_BUFFER: usize = 256;
const TICK_THREAD_NAME: &str = "drone-sync-tick";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Unregistered,
    Ready,
    Running,
    Stopped,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Service '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("Service not ready (state {0:?})")]
    NotReady(ServiceState),
    #[error("Failed to spawn tick thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Tick thread panicked")]
    TickThreadPanicked,
}

/// Timing parameters of one registration. Fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub name: String,
    pub asset_config_path: PathBuf,
    pub delta_time_usec: u64,
    pub max_delay_usec: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncEvent {
    Overrun(TickOutcome),
    AssetFault {
        tick_index: u64,
        asset: String,
        error: String,
    },
}

/// What a finished run left behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub record: RegistrationRecord,
    pub clock: SimulationClock,
    pub stats: SyncStats,
    pub recent: Vec<TickOutcome>,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Capacity of the event broadcast channel. Slow subscribers lag.
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

pub struct SyncService {
    state: ServiceState,
    record: Option<RegistrationRecord>,
    assets: Option<SharedRegistry>,
    monitor: Arc<TickMonitor>,
    stop_flag: Arc<AtomicBool>,
    tick_thread: Option<JoinHandle<TickLoop>>,
    events: broadcast::Sender<SyncEvent>,
    last_run: Option<RunSummary>,
}

impl SyncService {
    pub fn new() -> Self {
        Self::with_config(&SyncConfig::default())
    }

    pub fn with_config(config: &SyncConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            state: ServiceState::Unregistered,
            record: None,
            assets: None,
            monitor: Arc::new(TickMonitor::new()),
            stop_flag: Arc::new(AtomicBool::new(false)),
            tick_thread: None,
            events,
            last_run: None,
        }
    }

    /// Register a named asset set with its timing parameters.
    ///
    /// Rejected without any state change when a parameter is invalid or a
    /// registration is already ready or running. Registering again after a
    /// stop replaces the old record and starts from a zeroed clock.
    pub fn register_service(
        &mut self,
        name: &str,
        asset_config_path: impl AsRef<Path>,
        delta_time_usec: i64,
        max_delay_usec: i64,
        assets: SharedRegistry,
    ) -> Result<(), SyncError> {
        if name.is_empty() {
            return Err(SyncError::InvalidParameter {
                name: "name",
                reason: "must not be empty".to_string(),
            });
        }
        let delta_time_usec = match u64::try_from(delta_time_usec) {
            Ok(delta) if delta > 0 => delta,
            _ => {
                return Err(SyncError::InvalidParameter {
                    name: "delta_time_usec",
                    reason: format!("must be > 0, got {delta_time_usec}"),
                })
            }
        };
        let max_delay_usec = u64::try_from(max_delay_usec).map_err(|_| SyncError::InvalidParameter {
            name: "max_delay_usec",
            reason: format!("must be >= 0, got {max_delay_usec}"),
        })?;

        if matches!(self.state, ServiceState::Ready | ServiceState::Running) {
            let active = self.record.as_ref().map_or_else(|| name.to_string(), |r| r.name.clone());
            return Err(SyncError::AlreadyRegistered(active));
        }

        let record = RegistrationRecord {
            name: name.to_string(),
            asset_config_path: asset_config_path.as_ref().to_path_buf(),
            delta_time_usec,
            max_delay_usec,
        };
        info!(
            "📝 Registered service '{}' (delta {}us, max delay {}us, config {})",
            record.name,
            delta_time_usec,
            max_delay_usec,
            record.asset_config_path.display()
        );

        self.record = Some(record);
        self.assets = Some(assets);
        self.monitor = Arc::new(TickMonitor::new());
        self.state = ServiceState::Ready;
        Ok(())
    }

    /// Launch the tick thread. Returns once the thread is spawned.
    pub fn start_service(&mut self) -> Result<(), SyncError> {
        match self.state {
            ServiceState::Running => return Ok(()),
            ServiceState::Ready => {}
            other => return Err(SyncError::NotReady(other)),
        }

        let (Some(record), Some(assets)) = (self.record.clone(), self.assets.clone()) else {
            return Err(SyncError::NotReady(self.state));
        };

        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_flag);
        let tick_loop = TickLoop::with_monitor(record, assets, Arc::clone(&self.monitor), Some(self.events.clone()));

        let handle = thread::Builder::new()
            .name(TICK_THREAD_NAME.into())
            .spawn(move || tick_loop.run(&thread_stop))
            .map_err(SyncError::Spawn)?;

        self.stop_flag = stop_flag;
        self.tick_thread = Some(handle);
        self.state = ServiceState::Running;
        info!("🚀 Service started");
        Ok(())
    }

    /// Ask the tick thread to stop and wait for it. The tick in progress is
    /// always allowed to finish.
    pub fn stop_service(&mut self) -> Result<(), SyncError> {
        match self.state {
            ServiceState::Unregistered | ServiceState::Stopped => Ok(()),
            ServiceState::Ready => {
                info!("Service stopped before it was started");
                self.state = ServiceState::Stopped;
                Ok(())
            }
            ServiceState::Running => {
                self.stop_flag.store(true, Ordering::Release);
                self.state = ServiceState::Stopped;

                let Some(handle) = self.tick_thread.take() else {
                    return Ok(());
                };
                let tick_loop = handle.join().map_err(|_| {
                    error!("❌ Tick thread panicked");
                    SyncError::TickThreadPanicked
                })?;

                let summary = RunSummary {
                    record: tick_loop.record().clone(),
                    clock: tick_loop.clock(),
                    stats: tick_loop.monitor().snapshot(),
                    recent: tick_loop.recent_outcomes(),
                };
                info!(
                    "🛑 Service '{}' stopped: {} ticks, sim time {}us, {} overrun(s), {} asset fault(s)",
                    summary.record.name,
                    summary.stats.ticks,
                    summary.clock.elapsed_usec(),
                    summary.stats.overruns,
                    summary.stats.asset_faults
                );
                self.last_run = Some(summary);
                Ok(())
            }
        }
    }

    /// Duration of the current tick if it has run longer than `threshold`.
    pub fn check_stall(&self, threshold: Duration) -> Option<Duration> {
        if self.state != ServiceState::Running {
            return None;
        }
        self.monitor.in_flight_for().filter(|elapsed| *elapsed > threshold)
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn registration(&self) -> Option<&RegistrationRecord> {
        self.record.as_ref()
    }

    pub fn assets(&self) -> Option<&SharedRegistry> {
        self.assets.as_ref()
    }

    pub fn sim_time_usec(&self) -> u64 {
        self.monitor.sim_time_usec()
    }

    pub fn stats(&self) -> SyncStats {
        self.monitor.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn last_run(&self) -> Option<&RunSummary> {
        self.last_run.as_ref()
    }
}

impl Default for SyncService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        if self.state == ServiceState::Running {
            let _ = self.stop_service();
        }
    }
}

static_assertions::assert_impl_all!(SyncService: Send);
static_assertions::assert_impl_all!(RegistrationRecord: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AssetRegistry;

    fn empty_assets() -> SharedRegistry {
        AssetRegistry::new().into_shared()
    }

    #[test]
    fn test_new_service_is_unregistered() {
        let service = SyncService::new();
        assert_eq!(service.state(), ServiceState::Unregistered);
        assert!(service.registration().is_none());
        assert_eq!(service.sim_time_usec(), 0);
    }

    #[test]
    fn test_negative_max_delay_rejected() {
        let mut service = SyncService::new();
        let err = service.register_service("drone", "a.json", 1000, -1, empty_assets()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidParameter { name: "max_delay_usec", .. }));
        assert_eq!(service.state(), ServiceState::Unregistered);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut service = SyncService::new();
        let err = service.register_service("", "a.json", 1000, 0, empty_assets()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidParameter { name: "name", .. }));
    }

    #[test]
    fn test_start_before_register_is_not_ready() {
        let mut service = SyncService::new();
        let err = service.start_service().unwrap_err();
        assert!(matches!(err, SyncError::NotReady(ServiceState::Unregistered)));
    }

    #[test]
    fn test_stop_from_ready_discards_registration() {
        let mut service = SyncService::new();
        service.register_service("drone", "a.json", 1000, 0, empty_assets()).unwrap();
        service.stop_service().unwrap();
        assert_eq!(service.state(), ServiceState::Stopped);
        assert!(service.last_run().is_none());
        assert!(matches!(service.start_service(), Err(SyncError::NotReady(ServiceState::Stopped))));
    }

    #[test]
    fn test_no_stall_reported_when_not_running() {
        let service = SyncService::new();
        assert!(service.check_stall(Duration::ZERO).is_none());
    }
}
