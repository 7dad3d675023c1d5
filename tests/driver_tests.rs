use drone_sync::driver::*;
use drone_sync::registry::AssetRegistry;
use drone_sync::sync::ServiceState;
use drone_sync::DroneConfig;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn fast_config() -> DriverConfig {
    DriverConfig {
        poll_interval: Duration::from_millis(10),
        ..DriverConfig::default()
    }
}

fn one_drone() -> AssetRegistry {
    let mut config = DroneConfig::new("drone0");
    config.set_controller_param_text("TARGET_Z 1.5\n");
    AssetRegistry::build(&[config]).unwrap()
}

fn asset_descriptor(dir: &TempDir) -> RunParams {
    let path = dir.path().join("asset.json");
    fs::write(&path, "{}").unwrap();
    RunParams {
        delta_time_usec: 1000,
        max_delay_usec: 5000,
        asset_config_path: path,
    }
}

#[test]
fn test_concurrent_termination_runs_one_shutdown() {
    let dir = TempDir::new().unwrap();
    let params = asset_descriptor(&dir);
    let mut driver = ConductorDriver::new(fast_config());
    let shutdown = driver.shutdown_handle();

    let barrier = Arc::new(Barrier::new(2));
    let senders: Vec<_> = [SIGINT, SIGTERM]
        .into_iter()
        .map(|signum| {
            let shutdown = shutdown.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                barrier.wait();
                shutdown.request_shutdown(signum)
            })
        })
        .collect();

    let code = driver.run(&params, one_drone());
    let flipped: Vec<bool> = senders.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(code, EXIT_OK);
    assert_eq!(flipped.iter().filter(|f| **f).count(), 1);
    assert_eq!(shutdown.requests(), 2);
    assert_eq!(driver.shutdown_sequences(), 1);
    assert_eq!(driver.service().state(), ServiceState::Stopped);

    let run = driver.service().last_run().unwrap();
    assert_eq!(run.record.name, "drone");
    assert_eq!(run.clock.elapsed_usec(), run.stats.ticks * 1000);
}

#[test]
fn test_shutdown_before_start_still_exits_cleanly() {
    let dir = TempDir::new().unwrap();
    let params = asset_descriptor(&dir);
    let mut driver = ConductorDriver::new(fast_config());
    driver.shutdown_handle().request_shutdown(SIGTERM);

    assert_eq!(driver.run(&params, one_drone()), EXIT_OK);
    assert_eq!(driver.shutdown_sequences(), 1);
    assert_eq!(driver.service().state(), ServiceState::Stopped);
}

#[test]
fn test_invalid_delta_is_startup_failure() {
    let dir = TempDir::new().unwrap();
    let params = RunParams {
        delta_time_usec: 0,
        ..asset_descriptor(&dir)
    };
    let mut driver = ConductorDriver::new(fast_config());

    assert_eq!(driver.run(&params, one_drone()), EXIT_STARTUP_FAILURE);
    assert_eq!(driver.service().state(), ServiceState::Unregistered);
    assert_eq!(driver.shutdown_sequences(), 0);
}

#[test]
fn test_custom_asset_name_is_registered() {
    let dir = TempDir::new().unwrap();
    let params = asset_descriptor(&dir);
    let mut driver = ConductorDriver::new(DriverConfig {
        asset_name: "swarm".to_string(),
        ..fast_config()
    });
    driver.shutdown_handle().request_shutdown(SIGINT);

    assert_eq!(driver.run(&params, one_drone()), EXIT_OK);
    assert_eq!(driver.service().registration().unwrap().name, "swarm");
}
