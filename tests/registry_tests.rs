use drone_sync::config::{ConfigError, DroneConfigManager};
use drone_sync::driver::{ConductorDriver, DriverError};
use drone_sync::registry::{AssetRegistry, RegistryError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_drone(dir: &Path, index: usize, name: &str, param_path: &str) {
    let text = format!(
        r#"{{
            "name": "{name}",
            "components": {{ "droneDynamics": {{ "mass_kg": 0.5, "position_meter": [{index}.0, 0.0, 0.0] }} }},
            "controller": {{ "paramFilePath": "{param_path}" }}
        }}"#
    );
    fs::write(DroneConfigManager::config_file_path(dir, index), text).unwrap();
}

fn write_params(dir: &Path, file: &str) {
    fs::write(dir.join(file), "ALT_KP 3.0\nTARGET_Z 2.0\n").unwrap();
}

#[test]
fn test_load_dir_reads_indexed_configs() {
    let dir = TempDir::new().unwrap();
    write_params(dir.path(), "param.txt");
    write_drone(dir.path(), 0, "drone0", "param.txt");
    write_drone(dir.path(), 1, "drone1", "param.txt");
    // Gap at index 2: index 3 is never read.
    write_drone(dir.path(), 3, "drone3", "param.txt");

    let manager = DroneConfigManager::load_dir(dir.path()).unwrap();
    assert_eq!(manager.len(), 2);
    assert_eq!(manager.get_config(1).unwrap().name, "drone1");
    assert_eq!(
        manager.get_config(0).unwrap().controller_param_text(),
        Some("ALT_KP 3.0\nTARGET_Z 2.0\n")
    );
}

#[test]
fn test_absolute_param_path_is_used_as_is() {
    let dir = TempDir::new().unwrap();
    let params_dir = TempDir::new().unwrap();
    write_params(params_dir.path(), "abs.txt");
    let abs = params_dir.path().join("abs.txt");
    write_drone(dir.path(), 0, "drone0", abs.to_str().unwrap());

    let manager = DroneConfigManager::load_dir(dir.path()).unwrap();
    assert!(manager.get_config(0).unwrap().controller_param_text().is_some());
}

#[test]
fn test_missing_first_config_is_file_not_found() {
    let dir = TempDir::new().unwrap();
    let err = DroneConfigManager::load_dir(dir.path()).unwrap_err();
    match err {
        ConfigError::FileNotFound(path) => assert!(path.ends_with("drone_config_0.json")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_controller_file_is_file_not_found() {
    let dir = TempDir::new().unwrap();
    write_drone(dir.path(), 0, "drone0", "missing.txt");
    let err = DroneConfigManager::load_dir(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound(ref p) if p.ends_with("missing.txt")));
    assert!(err.to_string().contains("Unable to open config file"));
}

#[test]
fn test_missing_param_path_field() {
    let dir = TempDir::new().unwrap();
    fs::write(
        DroneConfigManager::config_file_path(dir.path(), 0),
        r#"{"name": "drone0"}"#,
    )
    .unwrap();
    let err = DroneConfigManager::load_dir(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { .. }));
}

#[test]
fn test_prepare_assets_builds_registry() {
    let dir = TempDir::new().unwrap();
    write_params(dir.path(), "param.txt");
    write_drone(dir.path(), 0, "drone0", "param.txt");
    write_drone(dir.path(), 1, "drone1", "param.txt");

    let registry = ConductorDriver::prepare_assets(dir.path()).unwrap();
    assert_eq!(registry.names(), vec!["drone0", "drone1"]);
    assert!(matches!(registry.get(2), Err(RegistryError::IndexOutOfRange { index: 2, len: 2 })));
}

#[test]
fn test_prepare_assets_rejects_duplicates() {
    let dir = TempDir::new().unwrap();
    write_params(dir.path(), "param.txt");
    write_drone(dir.path(), 0, "twin", "param.txt");
    write_drone(dir.path(), 1, "twin", "param.txt");

    let err = ConductorDriver::prepare_assets(dir.path()).unwrap_err();
    assert!(matches!(err, DriverError::Registry(RegistryError::DuplicateAsset(ref n)) if n == "twin"));
}

#[test]
fn test_bad_controller_params_fail_build() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("param.txt"), "ALT_KP not-a-number\n").unwrap();
    write_drone(dir.path(), 0, "drone0", "param.txt");

    let manager = DroneConfigManager::load_dir(dir.path()).unwrap();
    let err = AssetRegistry::build(manager.configs()).unwrap_err();
    assert!(matches!(err, RegistryError::Config(ConfigError::InvalidParameter { .. })));
}
