//! Linux sysfs PWM servo output.
//!
//! Drives one channel of a `/sys/class/pwm/pwmchipN` controller at the
//! standard 50 Hz servo frame. Pulse widths are written as `duty_cycle` in
//! nanoseconds.

use rotor_common::consts::SERVO_PERIOD_NS;
use rotor_common::hal::driver::{ActuatorDriver, ChannelConfig, DriverSettings, HalError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default PWM chip when the configuration names none.
pub const DEFAULT_PWM_CHIP: &str = "/sys/class/pwm/pwmchip0";

/// Servo on a sysfs PWM channel.
#[derive(Debug)]
pub struct SysfsPwmServo {
    chip: PathBuf,
    channel: Option<ChannelConfig>,
    last_duty_ns: Option<u64>,
}

impl SysfsPwmServo {
    /// Servo on the given PWM chip directory.
    pub fn new(chip: impl AsRef<Path>) -> Self {
        Self {
            chip: chip.as_ref().to_path_buf(),
            channel: None,
            last_duty_ns: None,
        }
    }

    fn channel_dir(&self, channel: u8) -> PathBuf {
        self.chip.join(format!("pwm{channel}"))
    }

    fn write_attr(dir: &Path, attr: &str, value: &str) -> Result<(), HalError> {
        fs::write(dir.join(attr), value).map_err(|e| {
            HalError::CommunicationError(format!("{}/{attr}: {e}", dir.display()))
        })
    }
}

impl ActuatorDriver for SysfsPwmServo {
    fn name(&self) -> &'static str {
        "sysfs_pwm"
    }

    fn attach(&mut self, channel: &ChannelConfig) -> Result<(), HalError> {
        let dir = self.channel_dir(channel.channel);
        if !dir.exists() {
            debug!(chip = %self.chip.display(), channel = channel.channel, "Exporting PWM channel");
            Self::write_attr(&self.chip, "export", &channel.channel.to_string())
                .map_err(|e| HalError::AttachFailed(e.to_string()))?;
        }

        let setup = || -> Result<(), HalError> {
            Self::write_attr(&dir, "period", &SERVO_PERIOD_NS.to_string())?;
            Self::write_attr(&dir, "enable", "1")
        };
        setup().map_err(|e| HalError::AttachFailed(e.to_string()))?;

        info!(
            chip = %self.chip.display(),
            channel = channel.channel,
            "PWM servo attached"
        );
        self.channel = Some(*channel);
        Ok(())
    }

    fn write_pulse(&mut self, pulse_us: i32) {
        let Some(channel) = self.channel else {
            return;
        };
        let duty_ns = channel.clamp(pulse_us).max(0) as u64 * 1000;
        if self.last_duty_ns == Some(duty_ns) {
            return;
        }
        let dir = self.channel_dir(channel.channel);
        match Self::write_attr(&dir, "duty_cycle", &duty_ns.to_string()) {
            Ok(()) => self.last_duty_ns = Some(duty_ns),
            Err(e) => warn!(channel = channel.channel, "PWM write failed: {e}"),
        }
    }

    fn detach(&mut self) {
        if let Some(channel) = self.channel.take() {
            let dir = self.channel_dir(channel.channel);
            if let Err(e) = Self::write_attr(&dir, "enable", "0") {
                warn!(channel = channel.channel, "PWM disable failed: {e}");
            }
            self.last_duty_ns = None;
        }
    }

    fn is_attached(&self) -> bool {
        self.channel.is_some()
    }
}

impl Drop for SysfsPwmServo {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Factory function to create a sysfs PWM servo instance.
pub fn create_driver(settings: &DriverSettings) -> Box<dyn ActuatorDriver> {
    let chip = settings.pwm_chip.as_deref().unwrap_or(DEFAULT_PWM_CHIP);
    Box::new(SysfsPwmServo::new(chip))
}
