//! # Drone Sync
//!
//! A fixed-step simulation service for one or more drones. Each drone is an
//! aircraft dynamics model flown by its own controller; a dedicated tick
//! thread advances simulated time in fixed increments and reports every tick
//! whose wall-clock cost exceeds the configured budget.
//!
//! ## Quick Start
//!
//! ```rust
//! use drone_sync::{AssetRegistry, DroneConfig, SyncService};
//!
//! let mut config = DroneConfig::new("drone0");
//! config.set_controller_param_text("TARGET_Z 2.0\n");
//! let registry = AssetRegistry::build(&[config]).unwrap();
//!
//! let mut service = SyncService::new();
//! service
//!     .register_service("drone", "asset.json", 1000, 5000, registry.into_shared())
//!     .unwrap();
//! service.start_service().unwrap();
//! service.stop_service().unwrap();
//!
//! let run = service.last_run().unwrap();
//! assert_eq!(run.clock.elapsed_usec(), run.stats.ticks * 1000);
//! ```
//!
//! ## Architecture
//!
//! - [`config`] - Drone configuration files and controller parameters
//! - [`asset`] - Aircraft dynamics, flight controllers and the asset contract
//! - [`registry`] - Ownership of every asset in stepping order
//! - [`sync`] - Registration, the tick loop and overrun detection
//! - [`driver`] - Process lifetime and termination handling

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

pub mod asset;
pub mod config;
pub mod driver;
pub mod registry;
pub mod sync;

// Re-export main public types for convenience
pub use asset::{DroneAsset, SimulationAsset};
pub use config::{DroneConfig, DroneConfigManager};
pub use driver::{ConductorDriver, DriverConfig, RunParams, ShutdownHandle};
pub use registry::{AssetRegistry, SharedRegistry};
pub use sync::{ServiceState, SyncService, TickOutcome};

static_assertions::assert_impl_all!(AssetRegistry: Send);
