//! Calibrate, then track a rotor-protocol target through the control cycle.

use rotor_common::tracking::{CalibrationCommand, PointingTarget, ReferenceHemisphere};
use rotor_control_unit::indicator::IndicatorState;
use rotor_control_unit::source::protocol::PROTOCOL_TARGET_NAME;

use super::{ROTCTL_RIG, cycles, simulated, started};

#[test]
fn confirm_origin_then_track() {
    let loaded = simulated(ROTCTL_RIG);
    let (mut runner, hub) = started(&loaded);

    // Rig rests at 500 µs on both axes; call that alt 0°, az 0° (north).
    hub.submit_calibration(CalibrationCommand::ConfirmOrigin {
        reference: ReferenceHemisphere::North,
    });
    runner.cycle_body(0);
    assert_eq!(runner.axes().altitude.calibration().calibration_pulse, 500);
    assert_eq!(runner.axes().azimuth.calibration().calibration_pulse, 500);
    assert_eq!(runner.indicator().state(), IndicatorState::ErrorBlink);

    hub.post_protocol_target(PointingTarget::new(135.0, 45.0));
    assert!(hub.toggle_tracking());
    cycles(&mut runner, 20, 6000);

    assert_eq!(runner.axes().altitude.target_pulse(), 1000);
    assert_eq!(runner.axes().azimuth.target_pulse(), 1500);
    assert_eq!(runner.axes().altitude.current_pulse(), 1000);
    assert_eq!(runner.axes().azimuth.current_pulse(), 1500);

    let snap = hub.read();
    assert!(snap.valid);
    assert!(snap.visible);
    assert!(snap.tracking);
    assert!(!snap.source_is_automatic);
    assert_eq!(snap.name, PROTOCOL_TARGET_NAME);
    assert!((snap.current_altitude_deg - 45.0).abs() < 1e-9);
    assert!((snap.current_azimuth_deg - 135.0).abs() < 1e-9);
    assert!(snap.error.is_empty(), "{}", snap.error);
    assert_eq!(runner.indicator().state(), IndicatorState::Off);
}

#[test]
fn slew_is_rate_limited() {
    let loaded = simulated(ROTCTL_RIG);
    let (mut runner, hub) = started(&loaded);
    hub.submit_calibration(CalibrationCommand::ConfirmOrigin {
        reference: ReferenceHemisphere::North,
    });
    runner.cycle_body(0);

    hub.post_protocol_target(PointingTarget::new(0.0, 180.0));
    hub.toggle_tracking();
    cycles(&mut runner, 20, 1000);
    assert_eq!(runner.axes().altitude.target_pulse(), 2500);
    let at_refresh = runner.axes().altitude.current_pulse();

    // 300 µs/s at 20 ms ticks is 6 µs per tick.
    cycles(&mut runner, 1020, 2000);
    assert_eq!(runner.axes().altitude.current_pulse() - at_refresh, 50 * 6);
}

#[test]
fn target_below_horizon_stops_tracking() {
    let loaded = simulated(ROTCTL_RIG);
    let (mut runner, hub) = started(&loaded);
    runner.cycle_body(0);

    hub.post_protocol_target(PointingTarget::new(90.0, -5.0));
    hub.toggle_tracking();
    cycles(&mut runner, 20, 1000);

    let snap = hub.read();
    assert!(snap.valid);
    assert!(!snap.visible);
    assert!(!snap.tracking);
}

#[test]
fn jog_while_tracking_shifts_calibration() {
    let loaded = simulated(ROTCTL_RIG);
    let (mut runner, hub) = started(&loaded);
    hub.submit_calibration(CalibrationCommand::ConfirmOrigin {
        reference: ReferenceHemisphere::North,
    });
    runner.cycle_body(0);

    hub.post_protocol_target(PointingTarget::new(135.0, 45.0));
    hub.toggle_tracking();
    cycles(&mut runner, 20, 1000);
    assert_eq!(runner.axes().azimuth.target_pulse(), 1500);

    hub.submit_calibration(CalibrationCommand::JogRight { steps: 20 });
    runner.cycle_body(1020);
    assert_eq!(runner.axes().azimuth.target_pulse(), 1520);
    assert_eq!(runner.axes().azimuth.calibration().calibration_pulse, 520);

    // The next refresh aims through the shifted calibration.
    cycles(&mut runner, 1040, 2000);
    assert_eq!(runner.axes().azimuth.target_pulse(), 1520);
    assert!(hub.read().tracking);
}
