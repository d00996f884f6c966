//! Control unit error types.
//!
//! - [`AxisError`] - axis controller failures, classified by [`ErrorKind`]
//! - [`SourceError`] - object source failures, rendered into the snapshot

use rotor_common::hal::driver::HalError;
use thiserror::Error;

/// Error class of an axis failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal at init; the axis stays disarmed.
    Configuration,
    /// Request clamped to a bound; the axis stays armed.
    Range,
    /// Operation attempted before a successful init.
    NotArmed,
}

/// Axis controller error.
#[derive(Debug, Clone, Error)]
pub enum AxisError {
    #[error("Axis has already been initialized")]
    AlreadyArmed,

    #[error("Slot address {slot} out of range (store holds {capacity} bytes)")]
    SlotOutOfRange { slot: u16, capacity: usize },

    #[error("Min/max out of range (min {min}, max {max})")]
    PulseBoundsOutOfRange { min: i32, max: i32 },

    #[error("Direction can only be 1 or -1 (got {0})")]
    InvalidDirection(i32),

    #[error("Degree span out of range (got {0})")]
    DegreeSpanOutOfRange(i32),

    #[error("Offset out of range (got {0})")]
    OffsetOutOfRange(f64),

    #[error("Actuator attach failed: {0}")]
    ActuatorAttach(#[source] HalError),

    #[error("Axis not initialized")]
    NotArmed,

    #[error("Target {requested} smaller than minimum {min}")]
    BelowMinimum { requested: i64, min: i32 },

    #[error("Target {requested} greater than maximum {max}")]
    AboveMaximum { requested: i64, max: i32 },

    #[error("Angle {0:.2} out of range")]
    OutOfRange(f64),

    #[error("Invalid calibration angle {0}")]
    InvalidCalibrationAngle(f64),

    #[error("Target pulse {0} out of range")]
    TargetOutOfBounds(i32),
}

impl AxisError {
    /// Classify the error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyArmed
            | Self::SlotOutOfRange { .. }
            | Self::PulseBoundsOutOfRange { .. }
            | Self::InvalidDirection(_)
            | Self::DegreeSpanOutOfRange(_)
            | Self::OffsetOutOfRange(_)
            | Self::ActuatorAttach(_) => ErrorKind::Configuration,
            Self::BelowMinimum { .. }
            | Self::AboveMaximum { .. }
            | Self::OutOfRange(_)
            | Self::InvalidCalibrationAngle(_)
            | Self::TargetOutOfBounds(_) => ErrorKind::Range,
            Self::NotArmed => ErrorKind::NotArmed,
        }
    }
}

/// Object source failure. The display text is what users see in the
/// snapshot's `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("No connected client")]
    NoConnectedClient,

    #[error("No response")]
    NoResponse,

    #[error("No object selected")]
    NoObjectSelected,

    #[error("Missing expected keys")]
    MissingKeys,

    #[error("No rotor client target")]
    NoProtocolTarget,
}
