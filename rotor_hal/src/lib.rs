//! # Rotor HAL Library
//!
//! Concrete hardware behind the `rotor_common::hal` traits.
//!
//! # Module Structure
//!
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Servo output drivers (simulation, Linux sysfs PWM)
//! - [`storage`] - Persistent slot stores (file image, in-memory)
//! - [`led`] - Status LED outputs (sysfs, log-only)
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                         rotor_hal                          │
//! │  ┌─────────────────┐   ┌────────────────┐   ┌───────────┐  │
//! │  │ DriverRegistry  │──►│ ActuatorDriver │   │ SlotStore │  │
//! │  │ name → factory  │   │ (trait object) │   │ StatusLed │  │
//! │  └─────────────────┘   └────────────────┘   └───────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod driver_registry;
pub mod drivers;
pub mod led;
pub mod storage;

pub use crate::driver_registry::DriverRegistry;
pub use crate::drivers::simulation::{ServoProbe, SimulatedServo};
pub use crate::drivers::sysfs_pwm::SysfsPwmServo;
pub use crate::led::{LedProbe, LogLed, SysfsLed};
pub use crate::storage::{FileSlotStore, MemorySlotStore};
