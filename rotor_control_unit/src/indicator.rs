//! Status indicator blink engine.
//!
//! Drives a [`StatusLed`] with one of four on/off patterns. The LED toggles
//! whenever the current phase has run for its duration.

use rotor_common::hal::driver::StatusLed;
use tracing::debug;

/// Indicator pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndicatorState {
    /// Dark (idle, valid data).
    #[default]
    Off,
    /// 1000 / 1000 ms.
    SlowBlink,
    /// 250 / 250 ms. Axis startup failure.
    FastBlink,
    /// 100 / 250 ms. Invalid target data.
    ErrorBlink,
}

impl IndicatorState {
    /// (on, off) phase durations [ms].
    pub const fn phases(self) -> (u64, u64) {
        match self {
            Self::Off => (0, u64::MAX),
            Self::SlowBlink => (1000, 1000),
            Self::FastBlink => (250, 250),
            Self::ErrorBlink => (100, 250),
        }
    }
}

pub struct StatusIndicator {
    led: Box<dyn StatusLed>,
    state: IndicatorState,
    lit: bool,
    phase_start_ms: u64,
}

impl StatusIndicator {
    pub fn new(mut led: Box<dyn StatusLed>) -> Self {
        led.set(false);
        Self {
            led,
            state: IndicatorState::Off,
            lit: false,
            phase_start_ms: 0,
        }
    }

    /// Select a pattern. Re-selecting the current pattern keeps its phase.
    pub fn set_state(&mut self, state: IndicatorState, now_ms: u64) {
        if state == self.state {
            return;
        }
        debug!(?state, "Indicator pattern");
        self.state = state;
        self.phase_start_ms = now_ms;
        let lit = state.phases().0 > 0;
        self.drive(lit);
    }

    pub fn state(&self) -> IndicatorState {
        self.state
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Advance the pattern; call every control tick.
    pub fn update(&mut self, now_ms: u64) {
        let (on_ms, off_ms) = self.state.phases();
        if on_ms == 0 {
            self.drive(false);
            return;
        }
        let phase = if self.lit { on_ms } else { off_ms };
        if now_ms.saturating_sub(self.phase_start_ms) >= phase {
            self.phase_start_ms = now_ms;
            let lit = !self.lit;
            self.drive(lit);
        }
    }

    fn drive(&mut self, lit: bool) {
        self.lit = lit;
        self.led.set(lit);
    }
}
