//! Per-axis motion controller.
//!
//! Converts target angles into servo pulse widths through an affine
//! calibration, slews toward the target at a bounded rate and persists every
//! step so a restart resumes from the last commanded pulse.
//!
//! ```text
//! pulse = a · degrees + b
//!     a = (max_pulse − min_pulse) / degree_span · direction
//!     b = calibration_pulse − a · offset_deg
//! ```

use rotor_common::config::{AxisConfig, TimingConfig};
use rotor_common::consts::{
    CALIBRATION_ANGLE_MAX, CALIBRATION_ANGLE_MIN, DEGREE_SPAN_MAX, DEGREE_SPAN_MIN,
    MAX_PULSE_LOWER, MAX_PULSE_UPPER, MIN_PULSE_LOWER, MIN_PULSE_UPPER, OFFSET_LIMIT_DEG,
};
use rotor_common::hal::driver::{ActuatorDriver, ChannelConfig, SlotStore};
use tracing::{debug, error, info, warn};

use crate::error::AxisError;

// ─── Parameters ─────────────────────────────────────────────────────

/// Init parameters of one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisParams {
    /// Output channel and pulse bounds [µs].
    pub channel: ChannelConfig,
    /// Angular span covered by `min_pulse..max_pulse` [deg].
    pub degree_span: i32,
    /// `1` or `-1`.
    pub direction: i32,
    /// Angle assigned to the calibration pulse [deg].
    pub offset_deg: f64,
    /// Slot holding the persisted current pulse.
    pub slot: u16,
}

impl AxisParams {
    pub fn from_config(axis: &AxisConfig, slot: u16) -> Self {
        Self {
            channel: axis.channel_config(),
            degree_span: axis.degrees,
            direction: axis.direction,
            offset_deg: axis.offset,
            slot,
        }
    }
}

/// Tick cadence and slew step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisTiming {
    /// Minimum time between two steps [ms].
    pub interval_ms: u64,
    /// Pulse change per step [µs].
    pub step_us: i32,
}

impl Default for AxisTiming {
    fn default() -> Self {
        Self::from_config(&TimingConfig::default())
    }
}

impl AxisTiming {
    pub fn from_config(timing: &TimingConfig) -> Self {
        Self {
            interval_ms: timing.tick_interval_ms.max(1),
            step_us: timing.step_per_tick(),
        }
    }
}

// ─── Calibration ────────────────────────────────────────────────────

/// Affine degrees ↔ pulse mapping of one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCalibration {
    /// Pulse at the low end of travel [µs].
    pub min_pulse: i32,
    /// Pulse at the high end of travel [µs].
    pub max_pulse: i32,
    /// Degrees represented by the full pulse range.
    pub degree_span: i32,
    /// Mounting direction (`1` / `-1`).
    pub direction: i32,
    /// Angle assigned to `calibration_pulse` [deg].
    pub offset_deg: f64,
    /// Pulse recorded at the last calibration; 0 until the first one.
    pub calibration_pulse: i32,
}

impl Default for AxisCalibration {
    fn default() -> Self {
        Self {
            min_pulse: 0,
            max_pulse: 0,
            degree_span: DEGREE_SPAN_MAX,
            direction: 1,
            offset_deg: 0.0,
            calibration_pulse: 0,
        }
    }
}

impl AxisCalibration {
    /// Slope `a` [µs/deg].
    pub fn slope(&self) -> f64 {
        (self.max_pulse - self.min_pulse) as f64 / self.degree_span as f64
            * self.direction as f64
    }

    /// Intercept `b` [µs].
    pub fn intercept(&self) -> f64 {
        self.calibration_pulse as f64 - self.slope() * self.offset_deg
    }

    /// Unrounded pulse for an angle.
    pub fn pulse_for(&self, degrees: f64) -> f64 {
        self.slope() * degrees + self.intercept()
    }

    /// Angle for a pulse; 0 when the mapping is degenerate.
    pub fn degrees_for(&self, pulse: i32) -> f64 {
        let a = self.slope();
        if a == 0.0 || !a.is_finite() {
            return 0.0;
        }
        (pulse as f64 - self.intercept()) / a
    }

    fn clamp(&self, pulse: i32) -> i32 {
        pulse.clamp(self.min_pulse, self.max_pulse)
    }
}

// ─── Controller ─────────────────────────────────────────────────────

/// Bounded, rate-limited, calibratable, persistent servo axis.
///
/// Created disarmed; [`AxisController::init`] validates the parameters and
/// arms it. Every operation other than `init` fails with
/// [`AxisError::NotArmed`] until then.
pub struct AxisController<A: ActuatorDriver = Box<dyn ActuatorDriver>> {
    name: &'static str,
    actuator: A,
    timing: AxisTiming,
    calibration: AxisCalibration,
    current_pulse: i32,
    target_pulse: i32,
    slot: u16,
    armed: bool,
    last_update_ms: u64,
    last_error: String,
}

impl<A: ActuatorDriver> AxisController<A> {
    pub fn new(name: &'static str, actuator: A) -> Self {
        Self::with_timing(name, actuator, AxisTiming::default())
    }

    pub fn with_timing(name: &'static str, actuator: A, timing: AxisTiming) -> Self {
        Self {
            name,
            actuator,
            timing,
            calibration: AxisCalibration::default(),
            current_pulse: 0,
            target_pulse: 0,
            slot: 0,
            armed: false,
            last_update_ms: 0,
            last_error: String::new(),
        }
    }

    /// Validate parameters, restore the persisted pulse and arm the axis.
    ///
    /// A persisted pulse outside the bounds is clamped with a warning (kept
    /// in [`last_error`](Self::last_error)). The current pulse is left one
    /// unit below the target so the first tick moves and persists.
    ///
    /// # Errors
    /// Any [`ErrorKind::Configuration`](crate::error::ErrorKind) error; the
    /// axis stays disarmed.
    pub fn init(&mut self, params: &AxisParams, store: &dyn SlotStore) -> Result<(), AxisError> {
        self.last_error.clear();
        if self.armed {
            return self.fail(AxisError::AlreadyArmed);
        }

        if !store.contains(params.slot) {
            return self.fail(AxisError::SlotOutOfRange {
                slot: params.slot,
                capacity: store.capacity(),
            });
        }
        self.slot = params.slot;

        let stored = store.read_i32(params.slot);
        info!(axis = self.name, slot = params.slot, pulse = stored, "Pulse restored");
        self.target_pulse = stored;
        self.current_pulse = stored;

        let ch = &params.channel;
        self.calibration = AxisCalibration {
            min_pulse: ch.min_pulse,
            max_pulse: ch.max_pulse,
            degree_span: params.degree_span,
            direction: params.direction,
            offset_deg: params.offset_deg,
            calibration_pulse: self.calibration.calibration_pulse,
        };

        if self.target_pulse < ch.min_pulse {
            self.target_pulse = ch.min_pulse;
            self.current_pulse = ch.min_pulse;
            self.last_error = format!("Stored pulse {stored} smaller than minimum {}", ch.min_pulse);
            warn!(axis = self.name, "{}", self.last_error);
        }
        if self.target_pulse > ch.max_pulse {
            self.target_pulse = ch.max_pulse;
            self.current_pulse = ch.max_pulse;
            self.last_error = format!("Stored pulse {stored} greater than maximum {}", ch.max_pulse);
            warn!(axis = self.name, "{}", self.last_error);
        }

        if !(MIN_PULSE_LOWER..=MIN_PULSE_UPPER).contains(&ch.min_pulse)
            || !(MAX_PULSE_LOWER..=MAX_PULSE_UPPER).contains(&ch.max_pulse)
        {
            return self.fail(AxisError::PulseBoundsOutOfRange {
                min: ch.min_pulse,
                max: ch.max_pulse,
            });
        }
        if params.direction != 1 && params.direction != -1 {
            return self.fail(AxisError::InvalidDirection(params.direction));
        }
        if !(DEGREE_SPAN_MIN..=DEGREE_SPAN_MAX).contains(&params.degree_span) {
            return self.fail(AxisError::DegreeSpanOutOfRange(params.degree_span));
        }
        if !(-OFFSET_LIMIT_DEG..=OFFSET_LIMIT_DEG).contains(&params.offset_deg) {
            return self.fail(AxisError::OffsetOutOfRange(params.offset_deg));
        }

        self.current_pulse = self.current_pulse.saturating_sub(1);

        if let Err(e) = self.actuator.attach(ch) {
            return self.fail(AxisError::ActuatorAttach(e));
        }
        self.actuator.write_pulse(self.current_pulse);
        self.armed = true;

        info!(
            axis = self.name,
            driver = self.actuator.name(),
            channel = ch.channel,
            min = ch.min_pulse,
            max = ch.max_pulse,
            current = self.current_pulse,
            "Axis initialized"
        );
        Ok(())
    }

    /// Jog the target by `steps` µs in the mounting direction.
    ///
    /// # Errors
    /// Range error when the result leaves the bounds; the target is then
    /// clamped to the violated bound.
    pub fn move_relative(&mut self, steps: i32) -> Result<(), AxisError> {
        self.last_error.clear();
        self.ensure_armed()?;
        let requested =
            self.target_pulse as i64 + steps as i64 * self.calibration.direction as i64;
        self.set_target_checked(requested)
    }

    /// Set the target pulse directly. Same clamp-and-fail contract as
    /// [`move_relative`](Self::move_relative).
    pub fn move_absolute_pulse(&mut self, pulse: i32) -> Result<(), AxisError> {
        self.last_error.clear();
        self.ensure_armed()?;
        self.set_target_checked(pulse as i64)
    }

    /// Aim at an angle.
    ///
    /// # Errors
    /// [`AxisError::OutOfRange`] when the rounded pulse leaves the bounds;
    /// the target is still moved to the clamped pulse.
    pub fn move_to_degrees(&mut self, degrees: f64) -> Result<(), AxisError> {
        self.last_error.clear();
        self.ensure_armed()?;

        let y = self.calibration.pulse_for(degrees).round();
        if y.is_nan() {
            return self.fail(AxisError::OutOfRange(degrees));
        }
        let cal = self.calibration;
        if y < cal.min_pulse as f64 {
            self.target_pulse = cal.min_pulse;
            return self.fail(AxisError::OutOfRange(degrees));
        }
        if y > cal.max_pulse as f64 {
            self.target_pulse = cal.max_pulse;
            return self.fail(AxisError::OutOfRange(degrees));
        }
        self.target_pulse = y as i32;
        Ok(())
    }

    /// Accept the current target as the angular reference.
    ///
    /// With `Some(angle)` the offset becomes `angle` (must lie in 0..=360).
    pub fn calibrate(&mut self, reference_deg: Option<f64>) -> Result<(), AxisError> {
        self.last_error.clear();
        self.ensure_armed()?;
        if let Some(angle) = reference_deg {
            if !(CALIBRATION_ANGLE_MIN..=CALIBRATION_ANGLE_MAX).contains(&angle) {
                return self.fail(AxisError::InvalidCalibrationAngle(angle));
            }
            self.calibration.offset_deg = angle;
        }
        self.calibration.calibration_pulse = self.target_pulse;
        debug!(
            axis = self.name,
            pulse = self.target_pulse,
            offset = self.calibration.offset_deg,
            "Calibrated"
        );
        Ok(())
    }

    /// Shift the calibration and the target together by `delta` µs.
    ///
    /// The target is clamped silently. Only fails when disarmed.
    pub fn recalibrate(&mut self, delta: i32) -> Result<(), AxisError> {
        self.last_error.clear();
        self.ensure_armed()?;
        let adjust = delta.saturating_mul(self.calibration.direction);
        self.calibration.calibration_pulse =
            self.calibration.calibration_pulse.saturating_add(adjust);
        self.target_pulse = self
            .calibration
            .clamp(self.target_pulse.saturating_add(adjust));
        Ok(())
    }

    /// Advance one slew step toward the target when the interval elapsed.
    ///
    /// Returns `true` when a pulse was written. A failed slot commit is
    /// logged and otherwise ignored.
    pub fn tick(&mut self, now_ms: u64, store: &mut dyn SlotStore) -> Result<bool, AxisError> {
        self.last_error.clear();
        self.ensure_armed()?;

        let cal = self.calibration;
        if self.target_pulse < cal.min_pulse || self.target_pulse > cal.max_pulse {
            return self.fail(AxisError::TargetOutOfBounds(self.target_pulse));
        }

        if now_ms.saturating_sub(self.last_update_ms) < self.timing.interval_ms {
            return Ok(false);
        }
        self.last_update_ms = now_ms;

        let step = self.timing.step_us;
        let next = if self.current_pulse < self.target_pulse {
            self.current_pulse.saturating_add(step).min(self.target_pulse)
        } else if self.current_pulse > self.target_pulse {
            self.current_pulse.saturating_sub(step).max(self.target_pulse)
        } else {
            return Ok(false);
        };

        self.current_pulse = next;
        self.actuator.write_pulse(next);
        if store.write_i32(self.slot, next) {
            debug!(axis = self.name, pulse = next, slot = self.slot, "Step persisted");
        } else {
            warn!(axis = self.name, pulse = next, slot = self.slot, "Persisting step failed");
        }
        Ok(true)
    }

    /// Angle of the current pulse [deg].
    pub fn degrees(&self) -> f64 {
        self.calibration.degrees_for(self.current_pulse)
    }

    /// Angle of the target pulse [deg].
    pub fn target_degrees(&self) -> f64 {
        self.calibration.degrees_for(self.target_pulse)
    }

    pub fn current_pulse(&self) -> i32 {
        self.current_pulse
    }

    pub fn target_pulse(&self) -> i32 {
        self.target_pulse
    }

    pub fn calibration(&self) -> &AxisCalibration {
        &self.calibration
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Message of the last failure or init warning; empty after success.
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    fn ensure_armed(&mut self) -> Result<(), AxisError> {
        if self.armed {
            Ok(())
        } else {
            self.fail(AxisError::NotArmed)
        }
    }

    fn set_target_checked(&mut self, requested: i64) -> Result<(), AxisError> {
        let cal = self.calibration;
        if requested < cal.min_pulse as i64 {
            self.target_pulse = cal.min_pulse;
            return self.fail(AxisError::BelowMinimum {
                requested,
                min: cal.min_pulse,
            });
        }
        if requested > cal.max_pulse as i64 {
            self.target_pulse = cal.max_pulse;
            return self.fail(AxisError::AboveMaximum {
                requested,
                max: cal.max_pulse,
            });
        }
        self.target_pulse = requested as i32;
        Ok(())
    }

    fn fail<T>(&mut self, err: AxisError) -> Result<T, AxisError> {
        self.last_error = err.to_string();
        match err.kind() {
            crate::error::ErrorKind::Configuration => error!(axis = self.name, "{err}"),
            _ => debug!(axis = self.name, "{err}"),
        }
        Err(err)
    }
}

impl<A: ActuatorDriver> Drop for AxisController<A> {
    fn drop(&mut self) {
        if self.armed {
            self.actuator.detach();
        }
    }
}

/// The rig's two axes.
pub struct Axes<A: ActuatorDriver = Box<dyn ActuatorDriver>> {
    pub altitude: AxisController<A>,
    pub azimuth: AxisController<A>,
}

impl<A: ActuatorDriver> Axes<A> {
    pub fn new(altitude: A, azimuth: A, timing: AxisTiming) -> Self {
        Self {
            altitude: AxisController::with_timing("altitude", altitude, timing),
            azimuth: AxisController::with_timing("azimuth", azimuth, timing),
        }
    }

    pub fn all_armed(&self) -> bool {
        self.altitude.is_armed() && self.azimuth.is_armed()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
