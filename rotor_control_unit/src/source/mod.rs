//! Object sources feeding the arbiter.
//!
//! - [`stellarium`] - Stellarium remote control plugin (HTTP, polled)
//! - [`protocol`] - latest target posted by a rotctld-protocol client
//!
//! A source either yields an [`ObjectInfo`] or a [`SourceError`]; both are
//! turned into a full [`TrackingSnapshot`] by [`ObjectSource::fetch`].

pub mod protocol;
pub mod stellarium;

use rotor_common::config::RigConfig;
use rotor_common::tracking::{PointingTarget, SourceMode, TrackingSnapshot};

use crate::error::SourceError;
use crate::hub::SharedHub;

pub use protocol::ProtocolSource;
pub use stellarium::StellariumSource;

/// Target object as reported by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub target: PointingTarget,
    pub name: String,
    pub visible: bool,
}

pub trait ObjectSource: Send {
    /// Query the source once.
    fn poll(&mut self) -> Result<ObjectInfo, SourceError>;

    /// True for the automatic (astronomy application) source.
    fn is_automatic(&self) -> bool;

    /// Query the source and render the result as a snapshot.
    ///
    /// Failures become `valid = false` snapshots carrying the error text.
    fn fetch(&mut self) -> TrackingSnapshot {
        let automatic = self.is_automatic();
        match self.poll() {
            Ok(info) => TrackingSnapshot::with_target(info.target, info.name, info.visible, automatic),
            Err(e) => TrackingSnapshot::invalid(e.to_string(), automatic),
        }
    }
}

/// Build the source selected by `[mode].source`.
pub fn from_config(config: &RigConfig, hub: &SharedHub) -> Box<dyn ObjectSource> {
    match config.mode.source {
        SourceMode::Stellarium => Box::new(StellariumSource::new(&config.stellarium)),
        SourceMode::Rotctl => Box::new(ProtocolSource::new(hub.clone())),
    }
}
