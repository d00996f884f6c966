//! System-wide constants for the rotor workspace.
//!
//! Single source of truth for hardware-safe limits, timing defaults and the
//! persistent slot layout. Imported by all crates.

/// Lowest accepted value for an axis `min_pulse` [µs].
pub const MIN_PULSE_LOWER: i32 = 300;
/// Highest accepted value for an axis `min_pulse` [µs].
pub const MIN_PULSE_UPPER: i32 = 1000;
/// Lowest accepted value for an axis `max_pulse` [µs].
pub const MAX_PULSE_LOWER: i32 = 1500;
/// Highest accepted value for an axis `max_pulse` [µs].
pub const MAX_PULSE_UPPER: i32 = 3500;

/// Smallest angular span a pulse range may represent [deg].
pub const DEGREE_SPAN_MIN: i32 = 100;
/// Largest angular span a pulse range may represent [deg].
pub const DEGREE_SPAN_MAX: i32 = 360;

/// Offset limit (absolute) accepted at init [deg].
pub const OFFSET_LIMIT_DEG: f64 = 360.0;

/// Valid range for an explicit calibration reference angle [deg].
pub const CALIBRATION_ANGLE_MIN: f64 = 0.0;
pub const CALIBRATION_ANGLE_MAX: f64 = 360.0;

/// Axis tick interval [ms] (~50 Hz servo update).
pub const TICK_INTERVAL_MS: u64 = 20;

/// Maximum servo slew rate [µs of pulse width per second].
pub const MAX_US_PER_SECOND: i32 = 300;

/// Arbiter refresh period [ms].
pub const REFRESH_PERIOD_MS: u64 = 1000;

/// Service context cadence [ms].
pub const SERVICE_PERIOD_MS: u64 = 10;

/// Rolling error log reset delay after the last append [ms].
pub const ERROR_CLEAR_MS: u64 = 5000;

/// Maximum number of lines retained by the rolling error log.
pub const ERROR_LOG_MAX_LINES: usize = 32;

/// Size of the persistent slot image [bytes].
pub const SLOT_STORE_CAPACITY: usize = 32;

/// Width of one persisted slot value [bytes].
pub const SLOT_WIDTH: usize = 4;

/// Slot address of the altitude axis pulse.
pub const ALTITUDE_SLOT: u16 = 0;

/// Slot address of the azimuth axis pulse.
pub const AZIMUTH_SLOT: u16 = 4;

/// Well-known rotctld TCP port.
pub const ROTCTL_PORT: u16 = 4533;

/// Stellarium remote control plugin HTTP port.
pub const STELLARIUM_PORT: u16 = 8090;

/// Stellarium request timeout [ms].
pub const STELLARIUM_TIMEOUT_MS: u64 = 500;

/// Servo PWM frame period [ns] (50 Hz).
pub const SERVO_PERIOD_NS: u64 = 20_000_000;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rotor/config.toml";

/// Default slot image file.
pub const DEFAULT_SLOT_FILE: &str = "/var/lib/rotor/slots.bin";
