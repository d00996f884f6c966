//! Servo output driver implementations.
//!
//! - [`simulation`] - In-memory servo for development and testing
//! - [`sysfs_pwm`] - Linux `/sys/class/pwm` servo output
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `ActuatorDriver` from `rotor_common::hal::driver`
//! 3. Register the factory in [`register_all_drivers`]

pub mod simulation;
pub mod sysfs_pwm;

use crate::driver_registry::DriverRegistry;

/// Register all built-in drivers.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register("simulation", simulation::create_driver);
    registry.register("sysfs_pwm", sysfs_pwm::create_driver);
}
