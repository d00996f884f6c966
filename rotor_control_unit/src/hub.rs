//! Tracking snapshot hub.
//!
//! The only state shared between the control context and the service
//! context. Holds the live [`TrackingSnapshot`] plus two mailboxes: one
//! pending [`CalibrationCommand`] and the latest rotor-protocol target.
//! Every critical section is a copy in or out; no I/O happens under the lock.

use parking_lot::Mutex;
use rotor_common::tracking::{CalibrationCommand, PointingTarget, TrackingSnapshot};
use std::sync::Arc;
use tracing::debug;

/// Narrow interface offered to the request-servicing side (web UI handlers).
pub trait RigControl: Send + Sync {
    /// Consistent copy of the current snapshot.
    fn snapshot(&self) -> TrackingSnapshot;

    /// Flip automatic tracking; returns the new state.
    fn toggle_tracking(&self) -> bool;

    /// Queue a calibration command for the control context.
    fn submit_calibration(&self, command: CalibrationCommand);
}

/// Tracking flag observed at the start of a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingToken {
    pub tracking: bool,
    seq: u64,
}

#[derive(Debug, Default)]
struct HubState {
    snapshot: TrackingSnapshot,
    pending_calibration: CalibrationCommand,
    protocol_target: Option<PointingTarget>,
    toggle_seq: u64,
}

/// Mutex-protected snapshot and mailboxes.
#[derive(Debug, Default)]
pub struct TrackingHub {
    state: Mutex<HubState>,
}

/// Hub handle shared by both contexts.
pub type SharedHub = Arc<TrackingHub>;

impl TrackingHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedHub {
        Arc::new(Self::new())
    }

    /// Consistent copy of the snapshot.
    pub fn read(&self) -> TrackingSnapshot {
        self.state.lock().snapshot.clone()
    }

    /// Replace the whole snapshot.
    pub fn write(&self, snapshot: TrackingSnapshot) {
        self.state.lock().snapshot = snapshot;
    }

    /// Flip `tracking` alone and return the new value.
    pub fn toggle_tracking(&self) -> bool {
        let tracking = {
            let mut s = self.state.lock();
            s.snapshot.tracking = !s.snapshot.tracking;
            s.toggle_seq = s.toggle_seq.wrapping_add(1);
            s.snapshot.tracking
        };
        debug!(tracking, "Tracking toggled");
        tracking
    }

    /// Switch tracking on unless it already is. Returns `true` when the flag
    /// changed. Counts as a toggle for [`commit_refresh`](Self::commit_refresh).
    pub fn engage_tracking(&self) -> bool {
        let changed = {
            let mut s = self.state.lock();
            if s.snapshot.tracking {
                false
            } else {
                s.snapshot.tracking = true;
                s.toggle_seq = s.toggle_seq.wrapping_add(1);
                true
            }
        };
        if changed {
            debug!("Tracking engaged");
        }
        changed
    }

    /// Capture the tracking flag before a refresh.
    pub fn tracking_token(&self) -> TrackingToken {
        let s = self.state.lock();
        TrackingToken {
            tracking: s.snapshot.tracking,
            seq: s.toggle_seq,
        }
    }

    /// Write back a refreshed snapshot.
    ///
    /// If tracking was toggled after `token` was taken, the toggled value
    /// wins over the one computed by the refresh. An invalid or invisible
    /// target always stores `tracking = false`. Returns the tracking flag
    /// that was stored.
    pub fn commit_refresh(&self, mut snapshot: TrackingSnapshot, token: TrackingToken) -> bool {
        let mut s = self.state.lock();
        if s.toggle_seq != token.seq && snapshot.valid && snapshot.visible {
            snapshot.tracking = s.snapshot.tracking;
        }
        let tracking = snapshot.tracking;
        s.snapshot = snapshot;
        tracking
    }

    /// Queue a calibration command. A newer command replaces an unconsumed one.
    pub fn submit_calibration(&self, command: CalibrationCommand) {
        if command.is_none() {
            return;
        }
        let replaced = std::mem::replace(&mut self.state.lock().pending_calibration, command);
        if !replaced.is_none() {
            debug!(?replaced, "Unconsumed calibration command replaced");
        }
    }

    /// Take the pending calibration command, leaving `None` behind.
    pub fn take_calibration(&self) -> CalibrationCommand {
        std::mem::take(&mut self.state.lock().pending_calibration)
    }

    /// Record the latest target received from a rotor-protocol client.
    pub fn post_protocol_target(&self, target: PointingTarget) {
        self.state.lock().protocol_target = Some(target);
    }

    pub fn latest_protocol_target(&self) -> Option<PointingTarget> {
        self.state.lock().protocol_target
    }
}

impl RigControl for TrackingHub {
    fn snapshot(&self) -> TrackingSnapshot {
        self.read()
    }

    fn toggle_tracking(&self) -> bool {
        TrackingHub::toggle_tracking(self)
    }

    fn submit_calibration(&self, command: CalibrationCommand) {
        TrackingHub::submit_calibration(self, command)
    }
}
