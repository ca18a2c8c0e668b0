use crate::domain::models::{Phase, SessionConfig, TimerState};

/// Result of a state-changing operation. `changed` is false for no-ops so the
/// caller can skip persistence and driver churn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub changed: bool,
    pub state: TimerState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseController {
    config: SessionConfig,
    state: TimerState,
}

impl PhaseController {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: TimerState {
                phase: Phase::Work,
                remaining_seconds: config.nominal_duration(Phase::Work),
                running: false,
            },
        }
    }

    /// Restores a paused Work timer from a persisted countdown. Values that are
    /// zero or exceed the Work duration fall back to the full duration.
    pub fn restore(config: SessionConfig, remaining_seconds: u32) -> Self {
        let nominal = config.nominal_duration(Phase::Work);
        let remaining_seconds = if remaining_seconds == 0 || remaining_seconds > nominal {
            nominal
        } else {
            remaining_seconds
        };
        Self {
            config,
            state: TimerState {
                phase: Phase::Work,
                remaining_seconds,
                running: false,
            },
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn nominal_duration(&self) -> u32 {
        self.config.nominal_duration(self.state.phase)
    }

    /// While running the phase still switches but the countdown is left alone.
    pub fn select_phase(&mut self, phase: Phase) -> Transition {
        let before = self.state;
        self.state.phase = phase;
        if !self.state.running {
            self.state.remaining_seconds = self.config.nominal_duration(phase);
        }
        self.transition_from(before)
    }

    pub fn config_changed(&mut self, config: SessionConfig) -> Transition {
        let before = self.state;
        self.config = config;
        if !self.state.running {
            self.state.remaining_seconds = config.nominal_duration(self.state.phase);
        }
        self.transition_from(before)
    }

    pub fn start(&mut self) -> Transition {
        let before = self.state;
        self.state.running = true;
        self.transition_from(before)
    }

    pub fn pause(&mut self) -> Transition {
        let before = self.state;
        self.state.running = false;
        self.transition_from(before)
    }

    pub fn reset(&mut self) -> Transition {
        let before = self.state;
        self.state.running = false;
        self.state.remaining_seconds = self.nominal_duration();
        self.transition_from(before)
    }

    pub fn complete_tick(&mut self) -> Transition {
        let before = self.state;
        let next = self.state.phase.successor();
        self.state = TimerState {
            phase: next,
            remaining_seconds: self.config.nominal_duration(next),
            running: false,
        };
        self.transition_from(before)
    }

    pub(crate) fn decrement(&mut self) -> u32 {
        self.state.remaining_seconds = self.state.remaining_seconds.saturating_sub(1);
        self.state.remaining_seconds
    }

    fn transition_from(&self, before: TimerState) -> Transition {
        Transition {
            changed: before != self.state,
            state: self.state,
        }
    }
}
