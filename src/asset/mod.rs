pub mod aircraft;
pub mod controller;
pub mod drone;

pub use aircraft::{AirCraft, AircraftState, ThrustCommand};
pub use controller::{ControllerParams, FlightController, PositionController};
pub use drone::DroneAsset;

use thiserror::Error;

pub const USEC_PER_SEC: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssetError {
    #[error("Dynamics diverged for '{asset}': {detail}")]
    Dynamics { asset: String, detail: String },
    #[error("Controller fault for '{asset}': {detail}")]
    Controller { asset: String, detail: String },
}

/// One simulated entity advanced exactly once per tick.
///
/// A failed step must leave the asset in its last good state so the next
/// tick can resume from it.
pub trait SimulationAsset: Send {
    fn name(&self) -> &str;
    fn step(&mut self, delta_time_usec: u64) -> Result<(), AssetError>;
}

pub fn usec_to_secs(delta_time_usec: u64) -> f64 {
    delta_time_usec as f64 / USEC_PER_SEC
}
