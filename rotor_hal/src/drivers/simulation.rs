//! Simulated servo output.
//!
//! `SimulatedServo` clamps and records pulse widths instead of driving a pin.
//! A [`ServoProbe`] shares the recorded state so tests and the simulation
//! binary can observe a servo after it has been boxed into a controller.

use parking_lot::Mutex;
use rotor_common::hal::driver::{ActuatorDriver, ChannelConfig, DriverSettings, HalError};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct ServoTrace {
    channel: Option<ChannelConfig>,
    last_pulse: Option<i32>,
    writes: u64,
}

/// Software servo that records every emitted pulse.
#[derive(Debug, Default)]
pub struct SimulatedServo {
    trace: Arc<Mutex<ServoTrace>>,
    fail_attach: bool,
}

impl SimulatedServo {
    /// Create a new simulated servo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Servo whose `attach()` always fails.
    pub fn failing() -> Self {
        Self {
            fail_attach: true,
            ..Self::default()
        }
    }

    /// Observation handle sharing this servo's state.
    pub fn probe(&self) -> ServoProbe {
        ServoProbe {
            trace: Arc::clone(&self.trace),
        }
    }
}

impl ActuatorDriver for SimulatedServo {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn attach(&mut self, channel: &ChannelConfig) -> Result<(), HalError> {
        if self.fail_attach {
            return Err(HalError::AttachFailed(format!(
                "simulated failure on channel {}",
                channel.channel
            )));
        }
        debug!(
            channel = channel.channel,
            min = channel.min_pulse,
            max = channel.max_pulse,
            "Simulated servo attached"
        );
        self.trace.lock().channel = Some(*channel);
        Ok(())
    }

    fn write_pulse(&mut self, pulse_us: i32) {
        let mut t = self.trace.lock();
        let Some(channel) = t.channel else {
            return;
        };
        let clamped = channel.clamp(pulse_us);
        trace!(channel = channel.channel, pulse = clamped, "pulse");
        t.last_pulse = Some(clamped);
        t.writes += 1;
    }

    fn detach(&mut self) {
        self.trace.lock().channel = None;
    }

    fn is_attached(&self) -> bool {
        self.trace.lock().channel.is_some()
    }
}

/// Read-only view of a [`SimulatedServo`].
#[derive(Debug, Clone)]
pub struct ServoProbe {
    trace: Arc<Mutex<ServoTrace>>,
}

impl ServoProbe {
    /// Last pulse width emitted (after clamping).
    pub fn last_pulse(&self) -> Option<i32> {
        self.trace.lock().last_pulse
    }

    /// Number of pulses emitted since creation.
    pub fn writes(&self) -> u64 {
        self.trace.lock().writes
    }

    /// Channel the servo is attached to.
    pub fn channel(&self) -> Option<ChannelConfig> {
        self.trace.lock().channel
    }

    /// True while attached.
    pub fn is_attached(&self) -> bool {
        self.trace.lock().channel.is_some()
    }
}

/// Factory function to create a simulated servo instance.
pub fn create_driver(_settings: &DriverSettings) -> Box<dyn ActuatorDriver> {
    Box::new(SimulatedServo::new())
}
