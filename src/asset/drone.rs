use super::aircraft::{AirCraft, AircraftState};
use super::controller::{ControllerParams, FlightController, PositionController};
use super::{usec_to_secs, AssetError, SimulationAsset};
use crate::config::{ConfigError, DroneConfig};

/// An aircraft bound to the controller that flies it.
pub struct DroneAsset {
    name: String,
    aircraft: AirCraft,
    controller: Box<dyn FlightController>,
    steps: u64,
}

impl DroneAsset {
    pub fn new(name: impl Into<String>, aircraft: AirCraft, controller: Box<dyn FlightController>) -> Self {
        Self {
            name: name.into(),
            aircraft,
            controller,
            steps: 0,
        }
    }

    /// Build from a config whose controller parameter text has already been
    /// injected.
    pub fn from_config(config: &DroneConfig) -> Result<Self, ConfigError> {
        let text = config
            .controller_param_text()
            .ok_or_else(|| ConfigError::MissingField {
                asset: config.name.clone(),
                field: "controller parameter text",
            })?;
        let params = ControllerParams::parse(text)?;

        Ok(Self::new(
            config.name.clone(),
            AirCraft::new(config.dynamics()),
            Box::new(PositionController::new(params)),
        ))
    }

    pub fn state(&self) -> &AircraftState {
        self.aircraft.state()
    }

    pub fn aircraft(&self) -> &AirCraft {
        &self.aircraft
    }

    pub fn controller_name(&self) -> &str {
        self.controller.name()
    }

    /// Number of steps that completed successfully.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl std::fmt::Debug for DroneAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DroneAsset")
            .field("name", &self.name)
            .field("controller", &self.controller.name())
            .field("state", self.aircraft.state())
            .field("steps", &self.steps)
            .finish()
    }
}

impl SimulationAsset for DroneAsset {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, delta_time_usec: u64) -> Result<(), AssetError> {
        let dt_s = usec_to_secs(delta_time_usec);
        let current = *self.aircraft.state();

        let command = self.controller.control(&current, self.aircraft.mass_kg(), dt_s);
        if command.force_n.iter().any(|f| !f.is_finite()) {
            return Err(AssetError::Controller {
                asset: self.name.clone(),
                detail: format!("non-finite thrust command {:?}", command.force_n),
            });
        }

        let next = self.aircraft.integrate(&command, dt_s);
        if !next.is_finite() {
            return Err(AssetError::Dynamics {
                asset: self.name.clone(),
                detail: format!("non-finite state after {delta_time_usec}us step"),
            });
        }

        self.aircraft.commit(next);
        self.steps += 1;
        Ok(())
    }
}
