//! Hardware abstraction contracts.
//!
//! This module contains the traits and error types implemented by the
//! `rotor_hal` crate and consumed by the control unit.

pub mod driver;
