use crate::config::DynamicsConfig;
use serde::{Deserialize, Serialize};

pub const GRAVITY_MPS2: f64 = 9.81;
const GROUND_LEVEL_M: f64 = 0.0;
const MIN_MASS_KG: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AircraftState {
    pub position_m: [f64; 3],
    pub velocity_mps: [f64; 3],
    pub on_ground: bool,
}

impl AircraftState {
    pub fn is_finite(&self) -> bool {
        self.position_m.iter().chain(self.velocity_mps.iter()).all(|v| v.is_finite())
    }
}

/// World-frame force command in newtons, z up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ThrustCommand {
    pub force_n: [f64; 3],
}

/// Point-mass body with linear air friction and a ground plane at z = 0.
#[derive(Debug, Clone)]
pub struct AirCraft {
    state: AircraftState,
    mass_kg: f64,
    air_friction: f64,
}

impl AirCraft {
    pub fn new(config: &DynamicsConfig) -> Self {
        let position_m = config.position_meter;
        Self {
            state: AircraftState {
                position_m,
                velocity_mps: [0.0; 3],
                on_ground: position_m[2] <= GROUND_LEVEL_M,
            },
            mass_kg: config.mass_kg.max(MIN_MASS_KG),
            air_friction: config.air_friction_coefficient.max(0.0),
        }
    }

    pub fn state(&self) -> &AircraftState {
        &self.state
    }

    pub fn mass_kg(&self) -> f64 {
        self.mass_kg
    }

    /// Integrate one step with semi-implicit Euler and return the candidate
    /// state. The aircraft itself is untouched until [`AirCraft::commit`].
    pub fn integrate(&self, command: &ThrustCommand, dt_s: f64) -> AircraftState {
        let mut next = self.state;

        for axis in 0..3 {
            let drag = -self.air_friction * next.velocity_mps[axis];
            let mut accel = (command.force_n[axis] + drag) / self.mass_kg;
            if axis == 2 {
                accel -= GRAVITY_MPS2;
            }
            next.velocity_mps[axis] += accel * dt_s;
            next.position_m[axis] += next.velocity_mps[axis] * dt_s;
        }

        if next.position_m[2] <= GROUND_LEVEL_M {
            next.position_m[2] = GROUND_LEVEL_M;
            if next.velocity_mps[2] < 0.0 {
                next.velocity_mps[2] = 0.0;
            }
            next.on_ground = true;
        } else {
            next.on_ground = false;
        }

        next
    }

    pub fn commit(&mut self, state: AircraftState) {
        debug_assert!(state.is_finite(), "committing non-finite aircraft state");
        self.state = state;
    }
}
