//! Process-level orchestration: register, start, wait for termination, stop.

use crate::config::{ConfigError, DroneConfigManager};
use crate::registry::{AssetRegistry, RegistryError};
use crate::sync::{SyncConfig, SyncError, SyncService};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

pub const SIGINT: i32 = 2;
pub const SIGTERM: i32 = 15;

pub const EXIT_OK: i32 = 0;
pub const EXIT_STARTUP_FAILURE: i32 = 1;

const DEFAULT_ASSET_NAME: &str = "drone";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_STALL_THRESHOLD_MS: u64 = 5000;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("Failed to register service: {0}")]
    Sync(#[from] SyncError),
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub asset_name: String,
    pub poll_interval: Duration,
    /// A tick running longer than this is reported as stalled.
    pub stall_threshold: Duration,
    pub sync: SyncConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            asset_name: DEFAULT_ASSET_NAME.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            stall_threshold: Duration::from_millis(DEFAULT_STALL_THRESHOLD_MS),
            sync: SyncConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunParams {
    pub delta_time_usec: i64,
    pub max_delay_usec: i64,
    pub asset_config_path: PathBuf,
}

/// Cloneable handle for asking a running driver to shut down. Safe to call
/// from signal listeners on any thread, any number of times.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    requests: Arc<AtomicU32>,
}

impl ShutdownHandle {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            requests: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Returns `true` only for the request that actually flipped the flag.
    pub fn request_shutdown(&self, signum: i32) -> bool {
        info!("📴 Received signal: {}. Stopping simulation.", signum);
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::Relaxed)
    }
}

pub struct ConductorDriver {
    config: DriverConfig,
    service: SyncService,
    shutdown: ShutdownHandle,
    shutdown_sequences: u32,
}

impl ConductorDriver {
    pub fn new(config: DriverConfig) -> Self {
        let service = SyncService::with_config(&config.sync);
        Self {
            config,
            service,
            shutdown: ShutdownHandle::new(),
            shutdown_sequences: 0,
        }
    }

    /// Load every drone config in `dir` and build the registry from them.
    pub fn prepare_assets(dir: &Path) -> Result<AssetRegistry, DriverError> {
        let manager = DroneConfigManager::load_dir(dir)?;
        let duplicates = AssetRegistry::duplicate_names(manager.configs());
        if let Some(name) = duplicates.into_iter().next() {
            return Err(RegistryError::DuplicateAsset(name).into());
        }
        Ok(AssetRegistry::build(manager.configs())?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn service(&self) -> &SyncService {
        &self.service
    }

    pub fn shutdown_sequences(&self) -> u32 {
        self.shutdown_sequences
    }

    /// Run until a shutdown is requested. Returns the process exit code:
    /// 0 after a clean shutdown, 1 when startup failed.
    pub fn run(&mut self, params: &RunParams, registry: AssetRegistry) -> i32 {
        if let Err(e) = self.start(params, registry) {
            error!("❌ Startup failed: {}", e);
            return EXIT_STARTUP_FAILURE;
        }

        info!("⏳ Service started. Waiting for simulation to end.");
        while self.shutdown.is_running() {
            thread::sleep(self.config.poll_interval);
            if let Some(elapsed) = self.service.check_stall(self.config.stall_threshold) {
                warn!("🐌 Tick in progress for {:?}, exceeds stall threshold {:?}", elapsed, self.config.stall_threshold);
            }
        }

        match self.shutdown_sequence() {
            Ok(()) => EXIT_OK,
            Err(e) => {
                error!("❌ Shutdown failed: {}", e);
                EXIT_STARTUP_FAILURE
            }
        }
    }

    fn start(&mut self, params: &RunParams, registry: AssetRegistry) -> Result<(), DriverError> {
        if !params.asset_config_path.is_file() {
            return Err(ConfigError::FileNotFound(params.asset_config_path.clone()).into());
        }

        info!("asset_name: {}", self.config.asset_name);
        self.service.register_service(
            &self.config.asset_name,
            &params.asset_config_path,
            params.delta_time_usec,
            params.max_delay_usec,
            registry.into_shared(),
        )?;
        self.service.start_service()?;
        Ok(())
    }

    fn shutdown_sequence(&mut self) -> Result<(), SyncError> {
        if self.shutdown_sequences > 0 {
            return Ok(());
        }
        self.shutdown_sequences += 1;
        info!("🛑 Shutting down after {} termination request(s)", self.shutdown.requests());
        self.service.stop_service()
    }
}

static_assertions::assert_impl_all!(ShutdownHandle: Send, Sync);
