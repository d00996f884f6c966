//! Tracking data model shared by the control and service contexts.
//!
//! - [`TrackingSnapshot`] - one internally consistent copy of the tracking state
//! - [`PointingTarget`] - an azimuth/altitude pair
//! - [`CalibrationCommand`] - manual jog / origin confirmation request
//! - [`SourceMode`] - which object source feeds the arbiter

use serde::{Deserialize, Serialize};

// ─── Source Mode ────────────────────────────────────────────────────

/// Object source selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Poll the Stellarium remote control API for the selected object.
    #[default]
    Stellarium,
    /// Accept targets from a rotctld-protocol client (e.g. SatDump).
    Rotctl,
}

impl SourceMode {
    /// True for the push-poll astronomy source.
    pub const fn is_automatic(self) -> bool {
        matches!(self, Self::Stellarium)
    }
}

// ─── Pointing Target ────────────────────────────────────────────────

/// Azimuth/altitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointingTarget {
    /// Azimuth [deg].
    pub azimuth_deg: f64,
    /// Altitude [deg].
    pub altitude_deg: f64,
}

impl PointingTarget {
    pub const fn new(azimuth_deg: f64, altitude_deg: f64) -> Self {
        Self {
            azimuth_deg,
            altitude_deg,
        }
    }

    /// Above the horizon (altitude ≥ 0).
    pub fn is_visible(&self) -> bool {
        self.altitude_deg >= 0.0
    }
}

// ─── Tracking Snapshot ──────────────────────────────────────────────

/// Full tracking state, replaced wholesale on every refresh.
///
/// Readers always receive a copy; no field is ever mutated in place
/// outside the hub's critical section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackingSnapshot {
    /// Target altitude [deg].
    pub altitude_deg: f64,
    /// Target azimuth [deg].
    pub azimuth_deg: f64,
    /// Display name of the target object.
    pub name: String,
    /// Target is above the horizon.
    pub visible: bool,
    /// Source returned usable data.
    pub valid: bool,
    /// Automatic tracking is engaged.
    pub tracking: bool,
    /// Human-visible error text (newline-joined).
    pub error: String,
    /// Snapshot originates from the automatic (Stellarium) source.
    pub source_is_automatic: bool,
    /// Altitude the rig currently points at [deg].
    pub current_altitude_deg: f64,
    /// Azimuth the rig currently points at [deg].
    pub current_azimuth_deg: f64,
}

impl TrackingSnapshot {
    /// Invalid snapshot carrying only a source error.
    pub fn invalid(error: impl Into<String>, source_is_automatic: bool) -> Self {
        Self {
            error: error.into(),
            source_is_automatic,
            ..Self::default()
        }
    }

    /// Valid snapshot for a target.
    pub fn with_target(
        target: PointingTarget,
        name: impl Into<String>,
        visible: bool,
        source_is_automatic: bool,
    ) -> Self {
        Self {
            altitude_deg: target.altitude_deg,
            azimuth_deg: target.azimuth_deg,
            name: name.into(),
            visible,
            valid: true,
            source_is_automatic,
            ..Self::default()
        }
    }

    /// Current pointing of the rig as a target pair.
    pub fn current_position(&self) -> PointingTarget {
        PointingTarget::new(self.current_azimuth_deg, self.current_altitude_deg)
    }
}

// ─── Calibration Commands ───────────────────────────────────────────

/// Which way the rig faced when the origin was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceHemisphere {
    /// Rig faced north: azimuth reference 0°.
    #[default]
    North,
    /// Rig faced south: azimuth reference 180°.
    South,
}

impl ReferenceHemisphere {
    /// Azimuth assigned to the calibration pulse [deg].
    pub const fn azimuth_reference_deg(self) -> f64 {
        match self {
            Self::North => 0.0,
            Self::South => 180.0,
        }
    }

    /// Web UI `north` flag: 0 → north, anything else → south.
    pub const fn from_flag(flag: u8) -> Self {
        if flag == 0 { Self::North } else { Self::South }
    }
}

/// Manual calibration request from the request-servicing context.
///
/// Jog magnitudes are in pulse-width steps [µs].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CalibrationCommand {
    /// Nothing to do.
    #[default]
    None,
    /// Accept the current targets as the angular reference.
    ConfirmOrigin { reference: ReferenceHemisphere },
    /// Azimuth jog counter-clockwise.
    JogLeft { steps: i32 },
    /// Azimuth jog clockwise.
    JogRight { steps: i32 },
    /// Altitude jog up.
    JogUp { steps: i32 },
    /// Altitude jog down.
    JogDown { steps: i32 },
}

impl CalibrationCommand {
    /// Default jog magnitude when the request carries none.
    pub const DEFAULT_STEPS: i32 = 1;

    /// Build a command from the web UI query vocabulary.
    ///
    /// `dir` is one of `up`, `down`, `left`, `right`; any other value
    /// (including an empty one) confirms the origin.
    pub fn from_request(dir: &str, speed: Option<i32>, north: Option<u8>) -> Self {
        let steps = speed.unwrap_or(Self::DEFAULT_STEPS);
        match dir {
            "up" => Self::JogUp { steps },
            "down" => Self::JogDown { steps },
            "left" => Self::JogLeft { steps },
            "right" => Self::JogRight { steps },
            _ => Self::ConfirmOrigin {
                reference: ReferenceHemisphere::from_flag(north.unwrap_or(0)),
            },
        }
    }

    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}
