//! Configuration loading traits and types.
//!
//! This module provides the TOML loader shared by the rotor binaries and the
//! `RigConfig` document describing one alt/az rig.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rotor_common::config::{ConfigLoader, RigConfig, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = RigConfig::load(Path::new("config.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::consts::{
    DEFAULT_SLOT_FILE, ERROR_CLEAR_MS, MAX_US_PER_SECOND, REFRESH_PERIOD_MS, ROTCTL_PORT,
    SERVICE_PERIOD_MS, SLOT_STORE_CAPACITY, STELLARIUM_PORT, STELLARIUM_TIMEOUT_MS,
    TICK_INTERVAL_MS,
};
use crate::hal::driver::{ChannelConfig, DriverSettings};
use crate::tracking::SourceMode;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across rotor applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "rotor-roof-01"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: "rotor".to_string(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Rig Configuration ──────────────────────────────────────────────

/// `[mode]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeConfig {
    /// Object source feeding the arbiter.
    #[serde(default)]
    pub source: SourceMode,
}

/// `[timing]` section. All values in milliseconds except the slew rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TimingConfig {
    /// Axis tick interval [ms].
    pub tick_interval_ms: u64,
    /// Maximum slew rate [µs of pulse per second].
    pub max_us_per_second: i32,
    /// Arbiter refresh period [ms].
    pub refresh_period_ms: u64,
    /// Service context cadence [ms].
    pub service_period_ms: u64,
    /// Error log reset delay [ms].
    pub error_clear_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_INTERVAL_MS,
            max_us_per_second: MAX_US_PER_SECOND,
            refresh_period_ms: REFRESH_PERIOD_MS,
            service_period_ms: SERVICE_PERIOD_MS,
            error_clear_ms: ERROR_CLEAR_MS,
        }
    }
}

impl TimingConfig {
    /// Pulse change applied per tick [µs].
    pub fn step_per_tick(&self) -> i32 {
        let step = (self.max_us_per_second as i64 * self.tick_interval_ms as i64) / 1000;
        step.clamp(1, i32::MAX as i64) as i32
    }
}

/// `[stellarium]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StellariumConfig {
    /// Host running Stellarium with the remote control plugin.
    pub host: String,
    /// Remote control plugin port.
    pub port: u16,
    /// Per-request timeout [ms].
    pub timeout_ms: u64,
}

impl Default for StellariumConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: STELLARIUM_PORT,
            timeout_ms: STELLARIUM_TIMEOUT_MS,
        }
    }
}

impl StellariumConfig {
    /// Object info endpoint URL.
    pub fn object_info_url(&self) -> String {
        format!(
            "http://{}:{}/api/objects/info?format=json",
            self.host, self.port
        )
    }
}

/// `[rotctl]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RotctlConfig {
    /// Listen address.
    pub bind: String,
    /// Listen port.
    pub port: u16,
}

impl Default for RotctlConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: ROTCTL_PORT,
        }
    }
}

impl RotctlConfig {
    /// `bind:port` string for `TcpListener::bind`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StorageConfig {
    /// Slot image file.
    pub path: String,
    /// Image size [bytes].
    pub capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_SLOT_FILE.to_string(),
            capacity: SLOT_STORE_CAPACITY,
        }
    }
}

/// `[driver]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DriverConfig {
    /// Registered driver name (`simulation`, `sysfs_pwm`).
    pub name: String,
    /// sysfs PWM chip directory.
    pub pwm_chip: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: "simulation".to_string(),
            pwm_chip: None,
        }
    }
}

impl DriverConfig {
    pub fn settings(&self) -> DriverSettings {
        DriverSettings {
            pwm_chip: self.pwm_chip.clone(),
        }
    }
}

/// `[indicator]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndicatorConfig {
    /// sysfs LED name under `/sys/class/leds`; absent → log-only LED.
    #[serde(default)]
    pub led: Option<String>,
}

/// One `[axes.*]` section.
///
/// Ranges are checked by the axis controller at init, not here: a bad axis
/// leaves that axis disarmed while the rest of the rig keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisConfig {
    /// Output channel / pin.
    pub channel: u8,
    /// Pulse width at the low end of travel [µs].
    pub min_pulse: i32,
    /// Pulse width at the high end of travel [µs].
    pub max_pulse: i32,
    /// Angular span of `min_pulse..max_pulse` [deg].
    pub degrees: i32,
    /// Mounting direction, `1` or `-1`.
    #[serde(default = "default_direction")]
    pub direction: i32,
    /// Mechanical offset applied to every angle [deg].
    #[serde(default)]
    pub offset: f64,
}

fn default_direction() -> i32 {
    1
}

impl AxisConfig {
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            channel: self.channel,
            min_pulse: self.min_pulse,
            max_pulse: self.max_pulse,
        }
    }
}

/// `[axes]` section. A missing `[axes.*]` table keeps that axis's defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AxesConfig {
    pub altitude: AxisConfig,
    pub azimuth: AxisConfig,
}

impl Default for AxesConfig {
    fn default() -> Self {
        Self {
            altitude: AxisConfig {
                channel: 18,
                min_pulse: 500,
                max_pulse: 2500,
                degrees: 180,
                direction: 1,
                offset: 0.0,
            },
            azimuth: AxisConfig {
                channel: 19,
                min_pulse: 500,
                max_pulse: 2500,
                degrees: 270,
                direction: 1,
                offset: 0.0,
            },
        }
    }
}

/// Complete rig configuration document.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "rotor"
///
/// [mode]
/// source = "rotctl"
///
/// [axes.altitude]
/// channel = 18
/// min_pulse = 500
/// max_pulse = 2500
/// degrees = 180
///
/// [axes.azimuth]
/// channel = 19
/// min_pulse = 500
/// max_pulse = 2500
/// degrees = 270
/// direction = -1
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RigConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub mode: ModeConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub stellarium: StellariumConfig,
    #[serde(default)]
    pub rotctl: RotctlConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub indicator: IndicatorConfig,
    #[serde(default)]
    pub axes: AxesConfig,
}

impl RigConfig {
    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for zero periods, a refresh
    /// period shorter than the tick interval, a slot image too small for both
    /// axes, or an empty Stellarium host.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        let t = &self.timing;
        for (name, value) in [
            ("tick_interval_ms", t.tick_interval_ms),
            ("refresh_period_ms", t.refresh_period_ms),
            ("service_period_ms", t.service_period_ms),
            ("error_clear_ms", t.error_clear_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "timing.{name} must be > 0"
                )));
            }
        }
        if t.max_us_per_second <= 0 {
            return Err(ConfigError::ValidationError(
                "timing.max_us_per_second must be > 0".to_string(),
            ));
        }
        if t.refresh_period_ms < t.tick_interval_ms {
            return Err(ConfigError::ValidationError(format!(
                "timing.refresh_period_ms ({}) < tick_interval_ms ({})",
                t.refresh_period_ms, t.tick_interval_ms
            )));
        }

        let min_capacity = 2 * crate::consts::SLOT_WIDTH;
        if self.storage.capacity < min_capacity {
            return Err(ConfigError::ValidationError(format!(
                "storage.capacity {} < {min_capacity}",
                self.storage.capacity
            )));
        }

        if self.stellarium.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "stellarium.host cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
