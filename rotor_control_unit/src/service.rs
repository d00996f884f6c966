//! Service context: short fixed-cadence request servicing.
//!
//! Polls the rotor-protocol session and forwards received targets to the
//! hub. A received target switches tracking on, so a rotctld client steers
//! the rig without a separate toggle. Never blocks longer than one service
//! period.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::hub::SharedHub;
use crate::rotctl::{PollOutcome, RotctlSession};

pub struct ServiceContext {
    hub: SharedHub,
    session: RotctlSession,
}

impl ServiceContext {
    pub fn new(hub: SharedHub, session: RotctlSession) -> Self {
        Self { hub, session }
    }

    pub fn session(&self) -> &RotctlSession {
        &self.session
    }

    /// One service slice.
    pub fn step(&mut self) -> PollOutcome {
        let current = self.hub.read().current_position();
        match self.session.poll(current) {
            Ok(PollOutcome::Target(target)) => {
                self.hub.post_protocol_target(target);
                if self.hub.engage_tracking() {
                    info!(
                        azimuth = target.azimuth_deg,
                        altitude = target.altitude_deg,
                        "Rotor client target, tracking on"
                    );
                }
                PollOutcome::Target(target)
            }
            Ok(PollOutcome::NoUpdate) => PollOutcome::NoUpdate,
            Err(e) => {
                warn!("Rotor protocol listener error: {e}");
                PollOutcome::NoUpdate
            }
        }
    }

    /// Run slices every `period` until `running` is cleared.
    pub fn run(&mut self, running: Arc<AtomicBool>, period: Duration) {
        info!(period_ms = period.as_millis() as u64, "Service context started");
        let mut slices: u64 = 0;
        while running.load(Ordering::Relaxed) {
            let start = Instant::now();
            self.step();
            slices += 1;
            if let Some(remaining) = period.checked_sub(start.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
        debug!(slices, "Service context stopped");
    }
}
