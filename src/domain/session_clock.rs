use crate::domain::phase_controller::PhaseController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Counting { remaining: u32 },
    ZeroCrossing,
    Stalled,
}

pub const TICK_PERIOD_MS: u64 = 1_000;

/// Applies one tick to the controller. Only the 1 -> 0 step reports a
/// zero-crossing; responding to it is left to the caller.
pub fn advance(controller: &mut PhaseController) -> TickOutcome {
    if !controller.is_running() {
        return TickOutcome::Idle;
    }
    if controller.state().remaining_seconds == 0 {
        return TickOutcome::Stalled;
    }
    match controller.decrement() {
        0 => TickOutcome::ZeroCrossing,
        remaining => TickOutcome::Counting { remaining },
    }
}
