//! Rotor Common Library
//!
//! Shared constants, configuration loading and data types for the alt/az
//! rotor workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Hardware-safe limits, timing defaults and slot layout
//! - [`config`] - TOML configuration loading and validation
//! - [`tracking`] - Tracking snapshot, pointing targets, calibration commands
//! - [`hal`] - Actuator, slot store and LED traits plus HAL errors
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use rotor_common::prelude::*;
//!
//! let snapshot = TrackingSnapshot::default();
//! assert!(!snapshot.tracking);
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
pub mod tracking;
