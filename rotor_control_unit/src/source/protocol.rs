//! Rotor-protocol object source.
//!
//! Reads the latest target the service context posted to the hub.

use super::{ObjectInfo, ObjectSource};
use crate::error::SourceError;
use crate::hub::SharedHub;

/// Display name of targets received over the rotor protocol.
pub const PROTOCOL_TARGET_NAME: &str = "<rotor client>";

pub struct ProtocolSource {
    hub: SharedHub,
}

impl ProtocolSource {
    pub fn new(hub: SharedHub) -> Self {
        Self { hub }
    }
}

impl ObjectSource for ProtocolSource {
    fn poll(&mut self) -> Result<ObjectInfo, SourceError> {
        let target = self
            .hub
            .latest_protocol_target()
            .ok_or(SourceError::NoProtocolTarget)?;
        Ok(ObjectInfo {
            target,
            name: PROTOCOL_TARGET_NAME.to_string(),
            visible: target.is_visible(),
        })
    }

    fn is_automatic(&self) -> bool {
        false
    }
}
