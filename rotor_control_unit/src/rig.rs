//! Rig assembly from a loaded configuration.

use rotor_common::config::RigConfig;
use rotor_common::hal::driver::{HalError, SlotStore, StatusLed};
use rotor_common::tracking::SourceMode;
use rotor_hal::{DriverRegistry, FileSlotStore, LogLed, MemorySlotStore, SysfsLed};
use std::io;
use tracing::info;

use crate::axis::{AxisTiming, Axes};
use crate::config::LoadedConfig;
use crate::cycle::RigParts;
use crate::hub::SharedHub;
use crate::indicator::StatusIndicator;
use crate::rotctl::RotctlSession;
use crate::source;

/// Build drivers, slot store, LED and object source for the control context.
///
/// # Errors
/// Unknown driver name or an unreadable slot image.
pub fn build_parts(loaded: &LoadedConfig, hub: &SharedHub) -> Result<RigParts, HalError> {
    let rig = &loaded.rig;
    let registry = DriverRegistry::with_builtin();
    let settings = rig.driver.settings();
    let altitude = registry.create_driver(&rig.driver.name, &settings)?;
    let azimuth = registry.create_driver(&rig.driver.name, &settings)?;
    info!(driver = %rig.driver.name, available = ?registry.list_drivers(), "Actuator driver");

    Ok(RigParts {
        axes: Axes::new(altitude, azimuth, AxisTiming::from_config(&rig.timing)),
        store: slot_store(rig, loaded.simulate)?,
        source: source::from_config(rig, hub),
        indicator: StatusIndicator::new(status_led(rig)),
    })
}

/// Bind the rotctld listener when the rig is fed by a rotor client.
///
/// Returns `None` in Stellarium mode; the port is left untouched.
pub fn rotctl_session(rig: &RigConfig) -> io::Result<Option<RotctlSession>> {
    match rig.mode.source {
        SourceMode::Rotctl => RotctlSession::bind(rig.rotctl.listen_addr()).map(Some),
        SourceMode::Stellarium => Ok(None),
    }
}

fn slot_store(rig: &RigConfig, simulate: bool) -> Result<Box<dyn SlotStore>, HalError> {
    if simulate {
        info!(capacity = rig.storage.capacity, "In-memory slot store");
        return Ok(Box::new(MemorySlotStore::new(rig.storage.capacity)));
    }
    let store = FileSlotStore::open(&rig.storage.path, rig.storage.capacity)?;
    info!(path = %store.path().display(), "Slot image opened");
    Ok(Box::new(store))
}

fn status_led(rig: &RigConfig) -> Box<dyn StatusLed> {
    match &rig.indicator.led {
        Some(name) => Box::new(SysfsLed::new(name)),
        None => Box::new(LogLed::new()),
    }
}
