//! Status LED outputs.

use parking_lot::Mutex;
use rotor_common::hal::driver::StatusLed;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, trace, warn};

/// Default sysfs LED class directory.
pub const LED_CLASS_DIR: &str = "/sys/class/leds";

/// LED under `/sys/class/leds/<name>/brightness`.
#[derive(Debug)]
pub struct SysfsLed {
    brightness: PathBuf,
    state: Option<bool>,
    /// Write failures since the last successful write.
    failures: u64,
}

impl SysfsLed {
    /// LED `name` under the standard class directory.
    pub fn new(name: &str) -> Self {
        Self::with_root(LED_CLASS_DIR, name)
    }

    /// LED `name` under an alternative class directory.
    pub fn with_root(root: impl AsRef<Path>, name: &str) -> Self {
        Self {
            brightness: root.as_ref().join(name).join("brightness"),
            state: None,
            failures: 0,
        }
    }

    /// True while writes keep failing.
    pub fn is_failing(&self) -> bool {
        self.failures > 0
    }
}

impl StatusLed for SysfsLed {
    fn set(&mut self, on: bool) {
        if self.state == Some(on) {
            return;
        }
        match fs::write(&self.brightness, if on { "1" } else { "0" }) {
            Ok(()) => {
                if self.failures > 0 {
                    info!(
                        path = %self.brightness.display(),
                        failures = self.failures,
                        "LED write recovered"
                    );
                }
                self.failures = 0;
                self.state = Some(on);
            }
            Err(e) => {
                // Only the first failure of a run is worth a warning.
                if self.failures == 0 {
                    warn!(path = %self.brightness.display(), "LED write failed: {e}");
                } else {
                    trace!(path = %self.brightness.display(), "LED write failed: {e}");
                }
                self.failures += 1;
                self.state = Some(on);
            }
        }
    }
}

/// LED that only traces its transitions.
///
/// Used when no physical LED is configured. A [`LedProbe`] shares the state.
#[derive(Debug, Default)]
pub struct LogLed {
    state: Arc<Mutex<LedState>>,
}

#[derive(Debug, Default)]
struct LedState {
    on: bool,
    toggles: u64,
}

impl LogLed {
    /// Create a log-only LED, initially off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observation handle.
    pub fn probe(&self) -> LedProbe {
        LedProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl StatusLed for LogLed {
    fn set(&mut self, on: bool) {
        let mut s = self.state.lock();
        if s.on != on {
            s.on = on;
            s.toggles += 1;
            trace!(on, "status LED");
        }
    }
}

/// Read-only view of a [`LogLed`].
#[derive(Debug, Clone)]
pub struct LedProbe {
    state: Arc<Mutex<LedState>>,
}

impl LedProbe {
    /// Current LED level.
    pub fn is_on(&self) -> bool {
        self.state.lock().on
    }

    /// Number of level changes.
    pub fn toggles(&self) -> u64 {
        self.state.lock().toggles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sysfs_led_writes_brightness() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("status")).unwrap();
        let mut led = SysfsLed::with_root(root.path(), "status");

        led.set(true);
        assert_eq!(
            fs::read_to_string(root.path().join("status/brightness")).unwrap(),
            "1"
        );
        led.set(false);
        assert_eq!(
            fs::read_to_string(root.path().join("status/brightness")).unwrap(),
            "0"
        );
    }

    #[test]
    fn sysfs_led_failure_is_latched() {
        let root = tempdir().unwrap();
        let mut led = SysfsLed::with_root(root.path(), "missing");

        led.set(true);
        assert!(led.is_failing());
        // Same state again is not retried.
        led.set(true);
        assert_eq!(led.failures, 1);
        led.set(false);
        assert_eq!(led.failures, 2);

        fs::create_dir(root.path().join("missing")).unwrap();
        led.set(true);
        assert!(!led.is_failing());
        assert_eq!(
            fs::read_to_string(root.path().join("missing/brightness")).unwrap(),
            "1"
        );
    }

    #[test]
    fn log_led_counts_transitions_only() {
        let mut led = LogLed::new();
        let probe = led.probe();
        led.set(false);
        assert_eq!(probe.toggles(), 0);
        led.set(true);
        led.set(true);
        led.set(false);
        assert_eq!(probe.toggles(), 2);
        assert!(!probe.is_on());
    }
}
