//! Prelude module for common re-exports.
//!
//! ```rust
//! use rotor_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, RigConfig, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{ALTITUDE_SLOT, AZIMUTH_SLOT, TICK_INTERVAL_MS};

// ─── HAL ────────────────────────────────────────────────────────────
pub use crate::hal::driver::{ActuatorDriver, ChannelConfig, HalError, SlotStore, StatusLed};

// ─── Tracking ───────────────────────────────────────────────────────
pub use crate::tracking::{
    CalibrationCommand, PointingTarget, ReferenceHemisphere, SourceMode, TrackingSnapshot,
};

/// Default axis tick interval as Duration.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(TICK_INTERVAL_MS);
