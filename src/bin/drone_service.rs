use clap::{App, AppSettings, Arg};
use colored::Colorize;
use drone_sync::driver::{EXIT_STARTUP_FAILURE, SIGINT, SIGTERM};
use drone_sync::{ConductorDriver, DriverConfig, RunParams, ShutdownHandle};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

fn validate_i64(v: String) -> Result<(), String> {
    v.parse::<i64>()
        .map(|_| ())
        .map_err(|_| format!("'{v}' is not an integer"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = match App::new("drone-service")
        .version("0.1.0")
        .about("🚁 Fixed-step drone simulation service")
        .setting(AppSettings::ArgRequiredElseHelp)
        .arg(
            Arg::with_name("delta_time_usec")
                .help("Simulated time advanced per tick, in microseconds (> 0)")
                .required(true)
                .index(1)
                .validator(validate_i64),
        )
        .arg(
            Arg::with_name("max_delay_usec")
                .help("Maximum wall-clock time per tick, in microseconds (>= 0)")
                .required(true)
                .index(2)
                .validator(validate_i64),
        )
        .arg(
            Arg::with_name("drone_config_dir_path")
                .help("Directory holding drone_config_<index>.json files")
                .required(true)
                .index(3),
        )
        .arg(
            Arg::with_name("asset_config_path")
                .help("Simulation asset descriptor")
                .required(true)
                .index(4),
        )
        .get_matches_safe()
    {
        Ok(matches) => matches,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_STARTUP_FAILURE as u8);
        }
    };

    tracing_subscriber::fmt::init();

    // Validated above.
    let delta_time_usec = matches.value_of("delta_time_usec").and_then(|v| v.parse().ok()).unwrap_or(0);
    let max_delay_usec = matches.value_of("max_delay_usec").and_then(|v| v.parse().ok()).unwrap_or(-1);
    let config_dir = PathBuf::from(matches.value_of("drone_config_dir_path").unwrap_or_default());
    let asset_config_path = PathBuf::from(matches.value_of("asset_config_path").unwrap_or_default());

    println!("🚁 Drone Simulation Service");
    println!("===========================");

    let registry = match ConductorDriver::prepare_assets(&config_dir) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::from(EXIT_STARTUP_FAILURE as u8);
        }
    };
    println!("   Assets: {} ✓", registry.names().join(", "));

    let mut driver = ConductorDriver::new(DriverConfig::default());
    let shutdown = driver.shutdown_handle();
    tokio::spawn(async move {
        if let Err(e) = listen_for_signals(shutdown).await {
            error!("Failed to install signal handlers: {}", e);
        }
    });

    let params = RunParams {
        delta_time_usec,
        max_delay_usec,
        asset_config_path,
    };
    let code = match tokio::task::spawn_blocking(move || driver.run(&params, registry)).await {
        Ok(code) => code,
        Err(e) => {
            error!("Driver task failed: {}", e);
            EXIT_STARTUP_FAILURE
        }
    };

    if code == 0 {
        println!("{}", "🛑 Drone simulation stopped".green());
    } else {
        eprintln!("{}", "❌ Drone simulation failed to start".red().bold());
    }
    ExitCode::from(code as u8)
}

#[cfg(unix)]
async fn listen_for_signals(shutdown: ShutdownHandle) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    info!("Signal handlers installed (SIGINT, SIGTERM)");

    loop {
        tokio::select! {
            Some(()) = interrupt.recv() => { shutdown.request_shutdown(SIGINT); }
            Some(()) = terminate.recv() => { shutdown.request_shutdown(SIGTERM); }
            else => break,
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn listen_for_signals(shutdown: ShutdownHandle) -> std::io::Result<()> {
    loop {
        tokio::signal::ctrl_c().await?;
        shutdown.request_shutdown(SIGINT);
    }
}
