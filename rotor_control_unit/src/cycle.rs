//! Control context: periodic cycle driving the axes.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity`: pin to the configured CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`.
//!
//! All four are no-ops without the `rt` feature.
//!
//! ## Cycle Body
//! 1. Expire the rolling error log.
//! 2. Apply a pending calibration command.
//! 3. Tick both axes (both before any refresh decision).
//! 4. Refresh through the arbiter when the refresh period elapsed.
//! 5. Advance the status indicator.

use rotor_common::config::RigConfig;
use rotor_common::consts::{ALTITUDE_SLOT, AZIMUTH_SLOT};
use rotor_common::hal::driver::{ActuatorDriver, SlotStore};
use rotor_common::tracking::CalibrationCommand;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::arbiter::Arbiter;
use crate::axis::{AxisController, AxisParams, Axes};
use crate::error_log::ErrorLog;
use crate::hub::SharedHub;
use crate::indicator::{IndicatorState, StatusIndicator};
use crate::source::ObjectSource;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: u64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: u64,
    /// Running sum for average computation.
    pub sum_cycle_ns: u64,
    /// Cycles that exceeded the tick interval.
    pub overruns: u64,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, duration_ns: u64, budget_ns: u64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        if duration_ns > budget_ns {
            self.overruns += 1;
        }
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count
        }
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
}

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the cycle never faults it in.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Prepare the calling thread for the control cycle.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Hardware and source handles owned by the control context.
pub struct RigParts<A: ActuatorDriver = Box<dyn ActuatorDriver>> {
    pub axes: Axes<A>,
    pub store: Box<dyn SlotStore>,
    pub source: Box<dyn ObjectSource>,
    pub indicator: StatusIndicator,
}

pub struct CycleRunner<A: ActuatorDriver = Box<dyn ActuatorDriver>> {
    hub: SharedHub,
    axes: Axes<A>,
    store: Box<dyn SlotStore>,
    source: Box<dyn ObjectSource>,
    indicator: StatusIndicator,
    arbiter: Arbiter,
    log: ErrorLog,
    altitude_params: AxisParams,
    azimuth_params: AxisParams,
    tick_interval: Duration,
    refresh_period_ms: u64,
    next_refresh_ms: u64,
    /// Last tick outcome per axis (altitude, azimuth).
    axis_ok: [bool; 2],
    stats: CycleStats,
}

impl<A: ActuatorDriver> CycleRunner<A> {
    pub fn new(config: &RigConfig, hub: SharedHub, parts: RigParts<A>) -> Self {
        Self {
            hub,
            axes: parts.axes,
            store: parts.store,
            source: parts.source,
            indicator: parts.indicator,
            arbiter: Arbiter::new(),
            log: ErrorLog::new(config.timing.error_clear_ms),
            altitude_params: AxisParams::from_config(&config.axes.altitude, ALTITUDE_SLOT),
            azimuth_params: AxisParams::from_config(&config.axes.azimuth, AZIMUTH_SLOT),
            tick_interval: Duration::from_millis(config.timing.tick_interval_ms),
            refresh_period_ms: config.timing.refresh_period_ms,
            next_refresh_ms: 0,
            axis_ok: [true; 2],
            stats: CycleStats::new(),
        }
    }

    /// Initialize both axes from the configuration.
    ///
    /// A failing axis stays disarmed; its error goes to the error log and
    /// the indicator switches to fast blink. Returns `true` when both axes
    /// are armed.
    pub fn startup(&mut self, now_ms: u64) -> bool {
        let alt = self.axes.altitude.init(&self.altitude_params, self.store.as_ref());
        let az = self.axes.azimuth.init(&self.azimuth_params, self.store.as_ref());

        for (axis, result) in [(&self.axes.altitude, alt), (&self.axes.azimuth, az)] {
            match result {
                Err(e) => self.log.append(&format!("{} axis: {e}", axis.name()), now_ms),
                Ok(()) if !axis.last_error().is_empty() => {
                    self.log.append(axis.last_error(), now_ms)
                }
                Ok(()) => {}
            }
        }

        let ok = self.axes.all_armed();
        if !ok {
            self.indicator.set_state(IndicatorState::FastBlink, now_ms);
        }
        info!(armed = ok, "Startup complete");
        ok
    }

    /// One control cycle at `now_ms` since start.
    pub fn cycle_body(&mut self, now_ms: u64) {
        self.log.expire(now_ms);
        self.apply_calibration(now_ms);

        let alt = self.axes.altitude.tick(now_ms, self.store.as_mut()).is_ok();
        let az = self.axes.azimuth.tick(now_ms, self.store.as_mut()).is_ok();
        self.report_tick(0, alt, "Failed to track altitude", now_ms);
        self.report_tick(1, az, "Failed to track azimuth", now_ms);

        if now_ms >= self.next_refresh_ms {
            self.next_refresh_ms = now_ms + self.refresh_period_ms;
            self.arbiter.refresh(
                &self.hub,
                self.source.as_mut(),
                &mut self.axes,
                &mut self.log,
                &mut self.indicator,
                now_ms,
            );
        }

        self.indicator.update(now_ms);
    }

    /// Cycle every tick interval until `running` is cleared.
    pub fn run(&mut self, running: &AtomicBool) {
        let start = Instant::now();
        let budget = self.tick_interval;
        info!(tick_ms = budget.as_millis() as u64, "Control context started");

        while running.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();
            let now_ms = start.elapsed().as_millis() as u64;

            self.cycle_body(now_ms);

            let elapsed = cycle_start.elapsed();
            self.stats
                .record(elapsed.as_nanos() as u64, budget.as_nanos() as u64);
            if let Some(remaining) = budget.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }

        info!(
            cycles = self.stats.cycle_count,
            avg_ns = self.stats.avg_cycle_ns(),
            max_ns = self.stats.max_cycle_ns,
            overruns = self.stats.overruns,
            "Control context stopped"
        );
    }

    pub fn axes(&self) -> &Axes<A> {
        &self.axes
    }

    pub fn indicator(&self) -> &StatusIndicator {
        &self.indicator
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.log
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    fn report_tick(&mut self, idx: usize, ok: bool, message: &str, now_ms: u64) {
        if self.axis_ok[idx] && !ok {
            self.log.append(message, now_ms);
        }
        self.axis_ok[idx] = ok;
    }

    fn apply_calibration(&mut self, now_ms: u64) {
        let command = self.hub.take_calibration();
        if command.is_none() {
            return;
        }
        let tracking = self.hub.read().tracking;
        debug!(?command, tracking, "Calibration command");

        let result = match command {
            CalibrationCommand::None => Ok(()),
            CalibrationCommand::ConfirmOrigin { reference } => {
                if tracking {
                    debug!("Origin confirmation ignored while tracking");
                    Ok(())
                } else {
                    self.axes.altitude.calibrate(None).and_then(|()| {
                        self.axes
                            .azimuth
                            .calibrate(Some(reference.azimuth_reference_deg()))
                    })
                }
            }
            CalibrationCommand::JogLeft { steps } => {
                jog(&mut self.axes.azimuth, steps.saturating_neg(), tracking)
            }
            CalibrationCommand::JogRight { steps } => jog(&mut self.axes.azimuth, steps, tracking),
            CalibrationCommand::JogUp { steps } => jog(&mut self.axes.altitude, steps, tracking),
            CalibrationCommand::JogDown { steps } => {
                jog(&mut self.axes.altitude, steps.saturating_neg(), tracking)
            }
        };

        if let Err(e) = result {
            warn!(?command, "Calibration failed: {e}");
            self.log.append(&e.to_string(), now_ms);
        }
    }
}

/// Shift the calibration while tracking, move the target otherwise.
fn jog<A: ActuatorDriver>(
    axis: &mut AxisController<A>,
    steps: i32,
    tracking: bool,
) -> Result<(), crate::error::AxisError> {
    if tracking {
        axis.recalibrate(steps)
    } else {
        axis.move_relative(steps)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisTiming;
    use crate::error::SourceError;
    use crate::hub::TrackingHub;
    use crate::source::ObjectInfo;
    use rotor_common::tracking::{PointingTarget, ReferenceHemisphere};
    use rotor_hal::{LedProbe, LogLed, MemorySlotStore, SimulatedServo};

    struct Scripted(Result<ObjectInfo, SourceError>);

    impl ObjectSource for Scripted {
        fn poll(&mut self) -> Result<ObjectInfo, SourceError> {
            self.0.clone()
        }

        fn is_automatic(&self) -> bool {
            true
        }
    }

    fn rig_config() -> RigConfig {
        let mut config = RigConfig::default();
        for axis in [&mut config.axes.altitude, &mut config.axes.azimuth] {
            axis.min_pulse = 500;
            axis.max_pulse = 2500;
            axis.degrees = 180;
        }
        config
    }

    fn runner(
        config: &RigConfig,
        store: MemorySlotStore,
        source: Scripted,
    ) -> (CycleRunner<SimulatedServo>, SharedHub, LedProbe) {
        let hub = TrackingHub::shared();
        let led = LogLed::new();
        let probe = led.probe();
        let parts = RigParts {
            axes: Axes::new(
                SimulatedServo::new(),
                SimulatedServo::new(),
                AxisTiming::from_config(&config.timing),
            ),
            store: Box::new(store),
            source: Box::new(source),
            indicator: StatusIndicator::new(Box::new(led)),
        };
        (CycleRunner::new(config, hub.clone(), parts), hub, probe)
    }

    fn preloaded(pulse: i32) -> MemorySlotStore {
        let store = MemorySlotStore::new(32);
        store.preload(ALTITUDE_SLOT, pulse);
        store.preload(AZIMUTH_SLOT, pulse);
        store
    }

    fn target(az: f64, alt: f64) -> Scripted {
        Scripted(Ok(ObjectInfo {
            target: PointingTarget::new(az, alt),
            name: "Deneb".to_string(),
            visible: true,
        }))
    }

    #[test]
    fn cycle_stats_basic() {
        let mut stats = CycleStats::new();
        assert_eq!(stats.avg_cycle_ns(), 0);
        stats.record(500_000, 20_000_000);
        stats.record(25_000_000, 20_000_000);
        assert_eq!(stats.cycle_count, 2);
        assert_eq!(stats.max_cycle_ns, 25_000_000);
        assert_eq!(stats.overruns, 1);
        assert_eq!(stats.avg_cycle_ns(), 12_750_000);
    }

    #[test]
    fn rt_setup_no_rt_feature_is_noop() {
        #[cfg(not(feature = "rt"))]
        {
            assert!(rt_setup(0, 80).is_ok());
        }
    }

    #[test]
    fn cycle_error_display() {
        let err = CycleError::RtSetup("mlockall failed: EPERM".into());
        assert_eq!(err.to_string(), "RT setup error: mlockall failed: EPERM");
    }

    #[test]
    fn startup_arms_both_axes() {
        let config = rig_config();
        let (mut runner, _hub, _led) = runner(&config, preloaded(1500), target(0.0, 0.0));
        assert!(runner.startup(0));
        assert!(runner.axes().all_armed());
        assert!(runner.error_log().is_empty());
        assert_eq!(runner.indicator().state(), IndicatorState::Off);
    }

    #[test]
    fn startup_failure_blinks_fast_and_keeps_running() {
        let mut config = rig_config();
        config.axes.azimuth.direction = 2;
        let (mut runner, hub, _led) = runner(&config, preloaded(1500), target(0.0, 0.0));

        assert!(!runner.startup(0));
        assert!(runner.axes().altitude.is_armed());
        assert!(!runner.axes().azimuth.is_armed());
        assert_eq!(runner.indicator().state(), IndicatorState::FastBlink);
        assert!(runner.error_log().text().contains("azimuth axis: Direction can only be 1 or -1"));

        runner.cycle_body(20);
        runner.cycle_body(40);
        let log = runner.error_log().text();
        assert_eq!(log.matches("Failed to track azimuth").count(), 1);
        assert!(!log.contains("Failed to track altitude"));
        assert!(hub.read().valid);
        assert_eq!(runner.indicator().state(), IndicatorState::FastBlink);
    }

    #[test]
    fn stored_pulse_outside_bounds_is_reported() {
        let config = rig_config();
        let (mut runner, _hub, _led) = runner(&config, preloaded(3000), target(0.0, 0.0));
        assert!(runner.startup(0));
        assert!(runner.error_log().text().contains("greater than maximum 2500"));
        assert_eq!(runner.axes().altitude.target_pulse(), 2500);
    }

    #[test]
    fn refresh_runs_on_period() {
        let config = rig_config();
        let (mut runner, hub, _led) = runner(
            &config,
            preloaded(1500),
            Scripted(Err(SourceError::NoConnectedClient)),
        );
        runner.startup(0);

        runner.cycle_body(0);
        assert_eq!(runner.arbiter.refreshes(), 1);
        for t in (20..1000).step_by(20) {
            runner.cycle_body(t);
        }
        assert_eq!(runner.arbiter.refreshes(), 1);
        runner.cycle_body(1000);
        assert_eq!(runner.arbiter.refreshes(), 2);
        assert_eq!(hub.read().error, "No connected client");
        assert_eq!(runner.indicator().state(), IndicatorState::ErrorBlink);
    }

    #[test]
    fn jog_moves_target_when_idle() {
        let config = rig_config();
        let (mut runner, hub, _led) = runner(&config, preloaded(1500), target(0.0, 0.0));
        runner.startup(0);

        hub.submit_calibration(CalibrationCommand::JogUp { steps: 10 });
        runner.cycle_body(0);
        assert_eq!(runner.axes().altitude.target_pulse(), 1510);
        assert_eq!(runner.axes().altitude.calibration().calibration_pulse, 0);

        hub.submit_calibration(CalibrationCommand::JogLeft { steps: 20 });
        runner.cycle_body(20);
        assert_eq!(runner.axes().azimuth.target_pulse(), 1480);
    }

    #[test]
    fn jog_recalibrates_while_tracking() {
        let config = rig_config();
        // No target, so the refresh in the same cycle leaves the axes alone.
        let (mut runner, hub, _led) =
            runner(&config, preloaded(1500), Scripted(Err(SourceError::NoResponse)));
        runner.startup(0);
        hub.toggle_tracking();

        hub.submit_calibration(CalibrationCommand::JogDown { steps: 5 });
        runner.cycle_body(0);
        assert_eq!(runner.axes().altitude.target_pulse(), 1495);
        assert_eq!(runner.axes().altitude.calibration().calibration_pulse, -5);
    }

    #[test]
    fn confirm_origin_calibrates_both_axes() {
        let config = rig_config();
        let (mut runner, hub, _led) = runner(&config, preloaded(1500), target(0.0, 0.0));
        runner.startup(0);

        hub.submit_calibration(CalibrationCommand::ConfirmOrigin {
            reference: ReferenceHemisphere::South,
        });
        runner.cycle_body(0);
        let az = runner.axes().azimuth.calibration();
        assert_eq!(az.calibration_pulse, 1500);
        assert_eq!(az.offset_deg, 180.0);
        assert_eq!(runner.axes().altitude.calibration().calibration_pulse, 1500);
        assert_eq!(runner.axes().altitude.calibration().offset_deg, 0.0);
    }

    #[test]
    fn confirm_origin_ignored_while_tracking() {
        let config = rig_config();
        let (mut runner, hub, _led) =
            runner(&config, preloaded(1500), Scripted(Err(SourceError::NoResponse)));
        runner.startup(0);
        hub.toggle_tracking();

        hub.submit_calibration(CalibrationCommand::ConfirmOrigin {
            reference: ReferenceHemisphere::North,
        });
        runner.cycle_body(0);
        assert_eq!(runner.axes().azimuth.calibration().calibration_pulse, 0);
    }

    #[test]
    fn jog_past_bound_is_logged() {
        let config = rig_config();
        let (mut runner, hub, _led) = runner(&config, preloaded(2490), target(0.0, 0.0));
        runner.startup(0);

        hub.submit_calibration(CalibrationCommand::JogRight { steps: 50 });
        runner.cycle_body(0);
        assert_eq!(runner.axes().azimuth.target_pulse(), 2500);
        assert!(runner.error_log().text().contains("greater than maximum 2500"));
    }

    #[test]
    fn run_stops_when_flag_cleared() {
        let config = rig_config();
        let (mut runner, _hub, _led) = runner(&config, preloaded(1500), target(0.0, 0.0));
        runner.startup(0);
        let running = AtomicBool::new(false);
        runner.run(&running);
        assert_eq!(runner.stats().cycle_count, 0);
    }
}
