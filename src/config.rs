//! Drone configuration loading.
//!
//! A configuration directory holds one `drone_config_<index>.json` file per
//! drone. Each file names a controller parameter file whose text is read and
//! injected back into the config before the controller is built.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const DRONE_CONFIG_PREFIX: &str = "drone_config_";
pub const DRONE_CONFIG_SUFFIX: &str = ".json";

const DEFAULT_MASS_KG: f64 = 0.71;
const DEFAULT_AIR_FRICTION: f64 = 0.05;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to open config file: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Missing required field '{field}' in config for '{asset}'")]
    MissingField { asset: String, field: &'static str },
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicsConfig {
    #[serde(rename = "mass_kg", default = "default_mass")]
    pub mass_kg: f64,
    #[serde(default = "default_air_friction")]
    pub air_friction_coefficient: f64,
    #[serde(rename = "position_meter", default)]
    pub position_meter: [f64; 3],
}

fn default_mass() -> f64 {
    DEFAULT_MASS_KG
}

fn default_air_friction() -> f64 {
    DEFAULT_AIR_FRICTION
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            mass_kg: DEFAULT_MASS_KG,
            air_friction_coefficient: DEFAULT_AIR_FRICTION,
            position_meter: [0.0; 3],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentsConfig {
    #[serde(default)]
    pub drone_dynamics: DynamicsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    pub param_file_path: Option<String>,
    /// Parameter file contents, filled in after the file is read.
    #[serde(skip)]
    pub param_text: Option<String>,
}

/// One drone's configuration as read from `drone_config_<index>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroneConfig {
    pub name: String,
    #[serde(default)]
    pub components: ComponentsConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
}

impl DroneConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: ComponentsConfig::default(),
            controller: ControllerConfig::default(),
        }
    }

    pub fn from_text(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn controller_param_file_path(&self) -> Option<&str> {
        self.controller.param_file_path.as_deref()
    }

    pub fn set_controller_param_text(&mut self, text: impl Into<String>) {
        self.controller.param_text = Some(text.into());
    }

    pub fn controller_param_text(&self) -> Option<&str> {
        self.controller.param_text.as_deref()
    }

    pub fn dynamics(&self) -> &DynamicsConfig {
        &self.components.drone_dynamics
    }
}

/// Loads and holds every drone configuration found in a directory.
#[derive(Debug, Default)]
pub struct DroneConfigManager {
    configs: Vec<DroneConfig>,
}

impl DroneConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_file_path(dir: &Path, index: usize) -> PathBuf {
        dir.join(format!("{DRONE_CONFIG_PREFIX}{index}{DRONE_CONFIG_SUFFIX}"))
    }

    /// Load `drone_config_0.json`, `drone_config_1.json`, ... until the next
    /// index is missing. Index 0 is required. Each controller parameter file
    /// is read and attached to its config.
    pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        let mut index = 0;

        loop {
            let path = Self::config_file_path(dir, index);
            if !path.is_file() {
                if index == 0 {
                    return Err(ConfigError::FileNotFound(path));
                }
                break;
            }

            let text = read_file(&path)?;
            manager.load_config_from_text(&text, &path)?;
            index += 1;
        }

        for config in &mut manager.configs {
            let param_path = resolve_param_path(dir, config)?;
            let text = read_file(&param_path)?;
            debug!("Loaded controller params for {} from {}", config.name, param_path.display());
            config.set_controller_param_text(text);
        }

        info!("Loaded {} drone config(s) from {}", manager.configs.len(), dir.display());
        Ok(manager)
    }

    pub fn load_config_from_text(&mut self, text: &str, origin: &Path) -> Result<(), ConfigError> {
        let config = DroneConfig::from_text(text, origin)?;
        self.configs.push(config);
        Ok(())
    }

    pub fn push(&mut self, config: DroneConfig) {
        self.configs.push(config);
    }

    pub fn get_config(&self, index: usize) -> Option<&DroneConfig> {
        self.configs.get(index)
    }

    pub fn get_config_mut(&mut self, index: usize) -> Option<&mut DroneConfig> {
        self.configs.get_mut(index)
    }

    pub fn configs(&self) -> &[DroneConfig] {
        &self.configs
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn into_configs(self) -> Vec<DroneConfig> {
        self.configs
    }
}

fn resolve_param_path(dir: &Path, config: &DroneConfig) -> Result<PathBuf, ConfigError> {
    let raw = config
        .controller_param_file_path()
        .ok_or_else(|| ConfigError::MissingField {
            asset: config.name.clone(),
            field: "controller.paramFilePath",
        })?;
    let path = Path::new(raw);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(dir.join(path))
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
