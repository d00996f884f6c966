//! # Rotor Control Unit Library
//!
//! Points an alt/az servo rig at a target supplied either by the Stellarium
//! remote control plugin or by a rotctld-protocol client.
//!
//! ## Execution Contexts
//!
//! 1. **Control** ([`cycle`]): 20 ms axis ticks, calibration commands,
//!    1 s target refresh through the [`arbiter`], status indicator.
//! 2. **Service** ([`service`]): ≈10 ms polling of the [`rotctl`] session.
//!
//! The two contexts share nothing but the [`hub::TrackingHub`].
//!
//! ## Axis Model
//!
//! Each [`axis::AxisController`] maps degrees to a servo pulse width through
//! an affine calibration, steps toward its target at a bounded rate and
//! persists every step in a slot store.

pub mod arbiter;
pub mod axis;
pub mod config;
pub mod cycle;
pub mod error;
pub mod error_log;
pub mod hub;
pub mod indicator;
pub mod rig;
pub mod rotctl;
pub mod service;
pub mod source;
