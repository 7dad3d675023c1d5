use super::aircraft::{AircraftState, ThrustCommand, GRAVITY_MPS2};
use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Gains and setpoints for [`PositionController`].
///
/// Parsed from `NAME value` lines; `#` starts a comment. Unknown names are
/// rejected so typos do not silently fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerParams {
    pub alt_kp: f64,
    pub alt_ki: f64,
    pub alt_kd: f64,
    pub pos_kp: f64,
    pub pos_kd: f64,
    pub target_m: [f64; 3],
    pub max_thrust_n: f64,
    pub integral_limit: f64,
}

impl Default for ControllerParams {
    fn default() -> Self {
        Self {
            alt_kp: 4.0,
            alt_ki: 0.5,
            alt_kd: 3.0,
            pos_kp: 1.0,
            pos_kd: 1.5,
            target_m: [0.0, 0.0, 1.0],
            max_thrust_n: 20.0,
            integral_limit: 2.0,
        }
    }
}

impl ControllerParams {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut params = Self::default();

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let mut parts = line.split_whitespace();
            let (Some(name), Some(raw), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(ConfigError::InvalidParameter {
                    name: line.to_string(),
                    reason: "expected 'NAME value'".to_string(),
                });
            };

            let value: f64 = raw.parse().map_err(|_| ConfigError::InvalidParameter {
                name: name.to_string(),
                reason: format!("'{raw}' is not a number"),
            })?;
            if !value.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    name: name.to_string(),
                    reason: "value must be finite".to_string(),
                });
            }

            match name {
                "ALT_KP" => params.alt_kp = value,
                "ALT_KI" => params.alt_ki = value,
                "ALT_KD" => params.alt_kd = value,
                "POS_KP" => params.pos_kp = value,
                "POS_KD" => params.pos_kd = value,
                "TARGET_X" => params.target_m[0] = value,
                "TARGET_Y" => params.target_m[1] = value,
                "TARGET_Z" => params.target_m[2] = value,
                "MAX_THRUST" => params.max_thrust_n = value,
                "INTEGRAL_LIMIT" => params.integral_limit = value,
                _ => {
                    return Err(ConfigError::InvalidParameter {
                        name: name.to_string(),
                        reason: "unknown controller parameter".to_string(),
                    })
                }
            }
        }

        if params.max_thrust_n <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "MAX_THRUST".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(params)
    }
}

/// Flight controller contract: turn the current state into an actuator
/// command for the next `dt_s` seconds.
pub trait FlightController: Send {
    fn control(&mut self, state: &AircraftState, mass_kg: f64, dt_s: f64) -> ThrustCommand;

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "unnamed"
    }
}

/// PID altitude hold with PD horizontal position hold.
#[derive(Debug, Clone)]
pub struct PositionController {
    params: ControllerParams,
    alt_integral: f64,
}

impl PositionController {
    pub fn new(params: ControllerParams) -> Self {
        Self {
            params,
            alt_integral: 0.0,
        }
    }

    pub fn params(&self) -> &ControllerParams {
        &self.params
    }
}

impl FlightController for PositionController {
    fn control(&mut self, state: &AircraftState, mass_kg: f64, dt_s: f64) -> ThrustCommand {
        let p = &self.params;

        let alt_error = p.target_m[2] - state.position_m[2];
        self.alt_integral = (self.alt_integral + alt_error * dt_s)
            .clamp(-p.integral_limit, p.integral_limit);
        let alt_accel = p.alt_kp * alt_error + p.alt_ki * self.alt_integral
            - p.alt_kd * state.velocity_mps[2];

        let mut force_n = [0.0; 3];
        for axis in 0..2 {
            let error = p.target_m[axis] - state.position_m[axis];
            force_n[axis] = mass_kg * (p.pos_kp * error - p.pos_kd * state.velocity_mps[axis]);
        }
        // Rotors only push up.
        force_n[2] = (mass_kg * (GRAVITY_MPS2 + alt_accel)).max(0.0);

        let magnitude = force_n.iter().map(|f| f * f).sum::<f64>().sqrt();
        if magnitude > p.max_thrust_n {
            let scale = p.max_thrust_n / magnitude;
            for f in &mut force_n {
                *f *= scale;
            }
        }

        ThrustCommand { force_n }
    }

    fn reset(&mut self) {
        self.alt_integral = 0.0;
    }

    fn name(&self) -> &str {
        "position-pid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overrides_defaults() {
        let text = "# altitude loop\nALT_KP 2.5\nTARGET_Z 10   # meters\n\nMAX_THRUST 15\n";
        let params = ControllerParams::parse(text).unwrap();
        assert_eq!(params.alt_kp, 2.5);
        assert_eq!(params.target_m[2], 10.0);
        assert_eq!(params.max_thrust_n, 15.0);
        assert_eq!(params.pos_kp, ControllerParams::default().pos_kp);
    }

    #[test]
    fn test_parse_rejects_unknown_name() {
        let err = ControllerParams::parse("ALT_KQ 1.0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { ref name, .. } if name == "ALT_KQ"));
    }

    #[test]
    fn test_parse_rejects_bad_value() {
        assert!(ControllerParams::parse("ALT_KP fast").is_err());
        assert!(ControllerParams::parse("ALT_KP 1 2").is_err());
        assert!(ControllerParams::parse("MAX_THRUST -1").is_err());
    }

    #[test]
    fn test_thrust_is_limited() {
        let params = ControllerParams {
            target_m: [100.0, 100.0, 100.0],
            max_thrust_n: 5.0,
            ..ControllerParams::default()
        };
        let mut controller = PositionController::new(params);
        let cmd = controller.control(&AircraftState::default(), 1.0, 0.01);
        let magnitude = cmd.force_n.iter().map(|f| f * f).sum::<f64>().sqrt();
        assert!(magnitude <= 5.0 + 1e-9);
    }

    #[test]
    fn test_hover_at_target_matches_gravity() {
        let params = ControllerParams {
            target_m: [0.0, 0.0, 2.0],
            ..ControllerParams::default()
        };
        let mut controller = PositionController::new(params);
        let state = AircraftState {
            position_m: [0.0, 0.0, 2.0],
            ..AircraftState::default()
        };
        let cmd = controller.control(&state, 0.5, 0.01);
        assert!((cmd.force_n[2] - 0.5 * GRAVITY_MPS2).abs() < 1e-9);
        assert_eq!(cmd.force_n[0], 0.0);
    }
}
