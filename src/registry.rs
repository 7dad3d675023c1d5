//! Owner of every simulation asset for a run.

use crate::asset::{DroneAsset, SimulationAsset};
use crate::config::{ConfigError, DroneConfig};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Duplicate asset name: {0}")]
    DuplicateAsset(String),
    #[error("Asset index {index} out of range (registry holds {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Registry handle shared between the caller and the tick thread.
pub type SharedRegistry = Arc<Mutex<AssetRegistry>>;

/// Assets in registration order. The order is the stepping order.
#[derive(Default)]
pub struct AssetRegistry {
    assets: Vec<Box<dyn SimulationAsset>>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one drone per config. Every config must already carry its
    /// controller parameter text.
    pub fn build(configs: &[DroneConfig]) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for config in configs {
            let drone = DroneAsset::from_config(config)?;
            registry.add(Box::new(drone))?;
        }
        info!("Asset registry built with {} asset(s)", registry.len());
        Ok(registry)
    }

    pub fn from_assets(assets: Vec<Box<dyn SimulationAsset>>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for asset in assets {
            registry.add(asset)?;
        }
        Ok(registry)
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    pub fn add(&mut self, asset: Box<dyn SimulationAsset>) -> Result<(), RegistryError> {
        if self.assets.iter().any(|a| a.name() == asset.name()) {
            return Err(RegistryError::DuplicateAsset(asset.name().to_string()));
        }
        self.assets.push(asset);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<&dyn SimulationAsset, RegistryError> {
        self.assets
            .get(index)
            .map(|asset| &**asset)
            .ok_or(RegistryError::IndexOutOfRange { index, len: self.assets.len() })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut (dyn SimulationAsset + 'static), RegistryError> {
        let len = self.assets.len();
        self.assets
            .get_mut(index)
            .map(|asset| &mut **asset)
            .ok_or(RegistryError::IndexOutOfRange { index, len })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn SimulationAsset>> {
        self.assets.iter_mut()
    }

    pub fn names(&self) -> Vec<&str> {
        self.assets.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Names that appear more than once, for configs validated before build.
    pub fn duplicate_names(configs: &[DroneConfig]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for config in configs {
            if !seen.insert(config.name.as_str()) && !dups.contains(&config.name) {
                dups.push(config.name.clone());
            }
        }
        dups
    }
}

impl std::fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetRegistry").field("assets", &self.names()).finish()
    }
}
