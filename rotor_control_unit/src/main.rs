//! # Rotor Control Unit
//!
//! Alt/az pointing rig controller.
//!
//! Loads the rig TOML, assembles drivers and object source, then runs the
//! control context on the main thread until Ctrl-C. In rotctl mode the
//! service context (rotctld listener) runs on a second thread.

use clap::Parser;
use rotor_common::config::{ConfigError, LogLevel};
use rotor_common::consts::DEFAULT_CONFIG_PATH;
use rotor_control_unit::config::{LoadedConfig, load_config};
use rotor_control_unit::cycle::{CycleRunner, rt_setup};
use rotor_control_unit::hub::TrackingHub;
use rotor_control_unit::rig::{build_parts, rotctl_session};
use rotor_control_unit::service::ServiceContext;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Rotor Control Unit: alt/az servo pointing
#[derive(Parser, Debug)]
#[command(name = "rotor_control_unit")]
#[command(version)]
#[command(about = "Points an alt/az servo rig at Stellarium or rotctld targets")]
struct Args {
    /// Path to the rig configuration TOML.
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Use the simulated servo driver and an in-memory slot store.
    #[arg(long)]
    simulate: bool,

    /// CPU core to pin the control thread to (`rt` feature).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (`rt` feature).
    #[arg(long, default_value_t = 50)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let loaded = load_config(&args.config, args.simulate);
    let level = loaded
        .as_ref()
        .map(|l| l.rig.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, level);

    info!("Rotor Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = loaded
        .map_err(|e: ConfigError| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|loaded| run(&args, loaded))
    {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Rotor Control Unit shutdown complete");
}

fn run(args: &Args, loaded: LoadedConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rig = &loaded.rig;
    info!(
        service = %rig.shared.service_name,
        source = ?rig.mode.source,
        driver = %rig.driver.name,
        simulate = loaded.simulate,
        "Config OK"
    );

    let hub = TrackingHub::shared();
    let parts = build_parts(&loaded, &hub)?;
    let session = rotctl_session(rig)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let service_period = Duration::from_millis(rig.timing.service_period_ms);
    let service = match session {
        Some(session) => {
            let hub = hub.clone();
            let running = running.clone();
            Some(
                thread::Builder::new()
                    .name("service".to_string())
                    .spawn(move || ServiceContext::new(hub, session).run(running, service_period))?,
            )
        }
        None => None,
    };

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    let mut runner = CycleRunner::new(rig, hub, parts);
    runner.startup(0);
    runner.run(&running);

    running.store(false, Ordering::SeqCst);
    if let Some(service) = service {
        service
            .join()
            .map_err(|_| "service thread panicked".to_string())?;
    }
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_directive()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
