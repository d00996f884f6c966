//! Configuration loading for the control unit.
//!
//! Parses the rig TOML through [`ConfigLoader`] and runs
//! [`RigConfig::validate`]. `--simulate` replaces the hardware sections
//! with in-process stand-ins.

use rotor_common::config::{ConfigError, ConfigLoader, RigConfig};
use std::path::Path;
use tracing::info;

/// Driver name used when simulating.
pub const SIMULATION_DRIVER: &str = "simulation";

/// Validated configuration plus the runtime mode.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub rig: RigConfig,
    /// Simulated driver, in-memory slot store and log-only LED.
    pub simulate: bool,
}

/// Load and validate the rig configuration from a TOML file.
pub fn load_config(path: &Path, simulate: bool) -> Result<LoadedConfig, ConfigError> {
    let rig = RigConfig::load(path)?;
    info!(path = %path.display(), "Configuration loaded");
    finish(rig, simulate)
}

/// Load config from a TOML string (for testing).
pub fn load_config_from_str(toml: &str, simulate: bool) -> Result<LoadedConfig, ConfigError> {
    finish(RigConfig::from_toml(toml)?, simulate)
}

fn finish(mut rig: RigConfig, simulate: bool) -> Result<LoadedConfig, ConfigError> {
    rig.validate()?;
    if simulate {
        rig.driver.name = SIMULATION_DRIVER.to_string();
        rig.driver.pwm_chip = None;
        rig.indicator.led = None;
    }
    Ok(LoadedConfig { rig, simulate })
}
