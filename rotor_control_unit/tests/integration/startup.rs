//! Startup: configuration, rig assembly, axis restore from the slot image.

use std::path::Path;

use rotor_common::tracking::CalibrationCommand;
use rotor_control_unit::config::{load_config, load_config_from_str};
use rotor_control_unit::indicator::IndicatorState;

use super::{cycles, simulated, started};

#[test]
fn sample_config_starts_simulated() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/config.toml");
    let loaded = load_config(&path, true).unwrap();
    assert_eq!(loaded.rig.driver.name, "simulation");

    let (runner, _hub) = started(&loaded);
    assert!(runner.axes().all_armed());
    // Fresh in-memory image: both stored pulses are 0 and get clamped.
    assert_eq!(runner.axes().altitude.target_pulse(), 500);
    assert!(runner.error_log().text().contains("smaller than minimum 500"));
}

#[test]
fn bad_axis_keeps_system_running() {
    let loaded = simulated(
        r#"
[mode]
source = "rotctl"

[axes.azimuth]
channel = 1
min_pulse = 100
max_pulse = 2500
degrees = 270
"#,
    );
    let (mut runner, hub) = started(&loaded);
    assert!(runner.axes().altitude.is_armed());
    assert!(!runner.axes().azimuth.is_armed());
    assert_eq!(runner.indicator().state(), IndicatorState::FastBlink);

    cycles(&mut runner, 0, 1000);
    let snap = hub.read();
    assert!(!snap.valid);
    assert_eq!(snap.error, "No rotor client target");
    assert_eq!(runner.error_log().text().matches("Failed to track azimuth").count(), 1);
}

#[test]
fn position_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("slots.bin");
    let toml = format!(
        r#"
[mode]
source = "rotctl"

[storage]
path = "{}"
"#,
        image.display()
    );
    let loaded = load_config_from_str(&toml, false).unwrap();
    assert_eq!(loaded.rig.driver.name, "simulation");

    {
        let (mut runner, hub) = started(&loaded);
        cycles(&mut runner, 0, 100);
        hub.submit_calibration(CalibrationCommand::JogUp { steps: 100 });
        cycles(&mut runner, 120, 1000);
        assert_eq!(runner.axes().altitude.current_pulse(), 600);
    }
    assert!(image.exists());

    let (runner, _hub) = started(&loaded);
    assert_eq!(runner.axes().altitude.target_pulse(), 600);
    assert_eq!(runner.axes().azimuth.target_pulse(), 500);
    assert!(runner.error_log().is_empty());
}
