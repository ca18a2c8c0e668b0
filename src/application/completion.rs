use crate::application::task_board::TaskBoard;
use crate::domain::models::{Phase, TimerState};
use crate::domain::phase_controller::PhaseController;
use crate::infrastructure::chime::Chime;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    pub ended: Phase,
    pub next: TimerState,
    pub credited_task: Option<String>,
}

/// Reacts to a zero-crossing: chime, then request the progress increment,
/// then move the controller to the next phase.
#[derive(Clone)]
pub struct CompletionCoordinator {
    chime: Arc<dyn Chime>,
}

impl CompletionCoordinator {
    pub fn new(chime: Arc<dyn Chime>) -> Self {
        Self { chime }
    }

    pub fn ring(&self) {
        if let Err(error) = self.chime.ring() {
            warn!(%error, "completion chime failed");
        }
    }

    pub fn on_zero_crossing<F>(
        &self,
        controller: &mut PhaseController,
        board: &TaskBoard,
        request_increment: F,
    ) -> CompletionReport
    where
        F: FnOnce(String),
    {
        let ended = controller.state().phase;
        self.ring();

        let credited_task = match (ended, board.selected_task()) {
            (Phase::Work, Some(task)) => {
                request_increment(task.id.clone());
                Some(task.id.clone())
            }
            _ => None,
        };

        let next = controller.complete_tick().state;
        info!(
            ended = ended.as_str(),
            next = next.phase.as_str(),
            credited_task = credited_task.as_deref().unwrap_or("-"),
            "phase completed"
        );
        CompletionReport {
            ended,
            next,
            credited_task,
        }
    }
}
