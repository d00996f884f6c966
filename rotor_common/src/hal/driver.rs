//! HAL driver traits and error types.
//!
//! This module defines:
//! - `ActuatorDriver` trait - Servo channel that accepts pulse widths
//! - `SlotStore` trait - Durable slot → i32 storage with explicit commit
//! - `StatusLed` trait - Single on/off indicator output
//! - `HalError` enum - Error types for HAL operations
//! - `DriverFactory` type alias - Factory function type

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for HAL operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Actuator attach failed
    #[error("Attach failed: {0}")]
    AttachFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Hardware communication error
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Slot store error
    #[error("State persistence error: {0}")]
    PersistenceError(String),
}

/// Factory function type for creating actuator driver instances.
pub type DriverFactory = fn(&DriverSettings) -> Box<dyn ActuatorDriver>;

/// Driver-wide settings passed to factories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSettings {
    /// sysfs PWM chip directory (e.g. `/sys/class/pwm/pwmchip0`).
    pub pwm_chip: Option<String>,
}

/// One servo output channel and its hardware-safe pulse bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Output channel / pin number.
    pub channel: u8,
    /// Lowest pulse width the channel may emit [µs].
    pub min_pulse: i32,
    /// Highest pulse width the channel may emit [µs].
    pub max_pulse: i32,
}

impl ChannelConfig {
    /// Clamp a pulse width to the channel bounds.
    #[inline]
    pub fn clamp(&self, pulse: i32) -> i32 {
        pulse.clamp(self.min_pulse, self.max_pulse.max(self.min_pulse))
    }
}

/// Trait defining one servo output.
///
/// # Lifecycle
///
/// 1. `attach()` - Called once by `AxisController::init`
/// 2. `write_pulse()` - Called from the control context on every move step
/// 3. `detach()` - Called when the controller is dropped
///
/// Only the control context ever calls into a driver.
pub trait ActuatorDriver: Send {
    /// Returns the driver's unique identifier (e.g., "simulation", "sysfs_pwm").
    fn name(&self) -> &'static str;

    /// Claim the output channel and configure its pulse bounds.
    ///
    /// # Errors
    /// Return `HalError::AttachFailed` if the channel cannot be claimed.
    fn attach(&mut self, channel: &ChannelConfig) -> Result<(), HalError>;

    /// Emit a pulse width [µs], silently clamped to the attached bounds.
    ///
    /// Writes before `attach()` are ignored.
    fn write_pulse(&mut self, pulse_us: i32);

    /// Release the output channel.
    fn detach(&mut self);

    /// True between a successful `attach()` and `detach()`.
    fn is_attached(&self) -> bool;
}

impl<T: ActuatorDriver + ?Sized> ActuatorDriver for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn attach(&mut self, channel: &ChannelConfig) -> Result<(), HalError> {
        (**self).attach(channel)
    }

    fn write_pulse(&mut self, pulse_us: i32) {
        (**self).write_pulse(pulse_us)
    }

    fn detach(&mut self) {
        (**self).detach()
    }

    fn is_attached(&self) -> bool {
        (**self).is_attached()
    }
}

/// Durable slot storage (EEPROM-like byte image of 32-bit values).
///
/// Slots are byte addresses; a value occupies [`crate::consts::SLOT_WIDTH`]
/// bytes starting at its address.
pub trait SlotStore: Send {
    /// Size of the addressable image [bytes].
    fn capacity(&self) -> usize;

    /// True when a 32-bit value fits at `slot`.
    fn contains(&self, slot: u16) -> bool {
        slot as usize + crate::consts::SLOT_WIDTH <= self.capacity()
    }

    /// Read the value at `slot`; 0 when never written or out of range.
    fn read_i32(&self, slot: u16) -> i32;

    /// Write and commit the value at `slot`.
    ///
    /// Returns `false` when the commit did not reach durable storage.
    /// Callers log the failure; it is never escalated.
    fn write_i32(&mut self, slot: u16, value: i32) -> bool;
}

/// Single status LED output.
pub trait StatusLed: Send {
    /// Drive the LED on or off.
    fn set(&mut self, on: bool);
}
