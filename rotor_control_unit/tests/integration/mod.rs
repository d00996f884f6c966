mod rotctl_session;
mod startup;
mod tracking_cycle;

use rotor_control_unit::config::{LoadedConfig, load_config_from_str};
use rotor_control_unit::cycle::CycleRunner;
use rotor_control_unit::hub::{SharedHub, TrackingHub};
use rotor_control_unit::rig::build_parts;

/// Simulated rig fed by rotctld targets.
pub const ROTCTL_RIG: &str = r#"
[mode]
source = "rotctl"

[axes.altitude]
channel = 0
min_pulse = 500
max_pulse = 2500
degrees = 180

[axes.azimuth]
channel = 1
min_pulse = 500
max_pulse = 2500
degrees = 270
"#;

pub fn simulated(toml: &str) -> LoadedConfig {
    load_config_from_str(toml, true).unwrap()
}

/// Assemble and start a runner; returns it with its hub.
pub fn started(loaded: &LoadedConfig) -> (CycleRunner, SharedHub) {
    let hub = TrackingHub::shared();
    let parts = build_parts(loaded, &hub).unwrap();
    let mut runner = CycleRunner::new(&loaded.rig, hub.clone(), parts);
    runner.startup(0);
    (runner, hub)
}

/// Run control cycles every 20 ms over `from..=to`.
pub fn cycles(runner: &mut CycleRunner, from: u64, to: u64) {
    for t in (from..=to).step_by(20) {
        runner.cycle_body(t);
    }
}
