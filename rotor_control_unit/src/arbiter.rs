//! Target mode arbiter.
//!
//! Once per refresh period: fetch the target from the configured source,
//! decide whether the rig tracks it, aim both axes and publish the result
//! through the hub.

use rotor_common::hal::driver::ActuatorDriver;
use rotor_common::tracking::TrackingSnapshot;
use tracing::{debug, info};

use crate::axis::{AxisController, Axes};
use crate::error_log::ErrorLog;
use crate::hub::TrackingHub;
use crate::indicator::{IndicatorState, StatusIndicator};
use crate::source::ObjectSource;

/// Logged (and recorded) when a refresh yields no usable target.
pub const INVALID_DATA_MESSAGE: &str = "Invalid data. Stop tracking.";

/// Object details are logged on every n-th valid refresh.
const OBJECT_LOG_EVERY: u64 = 5;

#[derive(Debug, Default)]
pub struct Arbiter {
    refreshes: u64,
    valid_refreshes: u64,
}

impl Arbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// Run one refresh and return the snapshot written to the hub.
    pub fn refresh<A: ActuatorDriver>(
        &mut self,
        hub: &TrackingHub,
        source: &mut dyn ObjectSource,
        axes: &mut Axes<A>,
        log: &mut ErrorLog,
        indicator: &mut StatusIndicator,
        now_ms: u64,
    ) -> TrackingSnapshot {
        self.refreshes += 1;
        log_axis("altitude", &axes.altitude);
        log_axis("azimuth", &axes.azimuth);

        let token = hub.tracking_token();
        let mut snap = source.fetch();
        snap.tracking = token.tracking;

        if !snap.error.is_empty() {
            log.append(&snap.error, now_ms);
        }

        if snap.valid {
            self.valid_refreshes += 1;
            let pattern = if axes.all_armed() {
                IndicatorState::Off
            } else {
                IndicatorState::FastBlink
            };
            indicator.set_state(pattern, now_ms);

            if self.valid_refreshes % OBJECT_LOG_EVERY == 0 {
                info!(
                    object = %snap.name,
                    altitude = snap.altitude_deg,
                    azimuth = snap.azimuth_deg,
                    visible = snap.visible,
                    "Object"
                );
            }

            if snap.tracking {
                if let Err(e) = axes.altitude.move_to_degrees(snap.altitude_deg) {
                    log.append(&e.to_string(), now_ms);
                    snap.tracking = false;
                }
                if let Err(e) = axes.azimuth.move_to_degrees(snap.azimuth_deg) {
                    log.append(&e.to_string(), now_ms);
                    snap.tracking = false;
                }
            }
        } else {
            snap.tracking = false;
            log.append(INVALID_DATA_MESSAGE, now_ms);
            indicator.set_state(IndicatorState::ErrorBlink, now_ms);
        }

        if !snap.visible {
            snap.tracking = false;
        }

        snap.current_altitude_deg = axes.altitude.degrees();
        snap.current_azimuth_deg = axes.azimuth.degrees();
        if snap.error.is_empty() {
            snap.error = log.text();
        }

        snap.tracking = hub.commit_refresh(snap.clone(), token);
        debug!(valid = snap.valid, tracking = snap.tracking, "Refresh committed");
        snap
    }
}

fn log_axis<A: ActuatorDriver>(label: &str, axis: &AxisController<A>) {
    info!(
        axis = label,
        target_deg = axis.target_degrees(),
        target_pulse = axis.target_pulse(),
        "Axis target"
    );
}
