use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

pub const TASK_LOAD_FAILED_MESSAGE: &str =
    "Couldn't load tasks from Notion. Check property names/types, DB ID, and integration permissions.";
pub const PROGRESS_NOT_SAVED_MESSAGE: &str =
    "Timer finished, but failed to update 'Finished' in Notion. See the log for details.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    TaskLoadFailed,
    ProgressNotSaved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn task_load_failed() -> Self {
        Self::new(AlertKind::TaskLoadFailed, TASK_LOAD_FAILED_MESSAGE)
    }

    pub fn progress_not_saved(task_name: &str) -> Self {
        Self::new(
            AlertKind::ProgressNotSaved,
            format!("{PROGRESS_NOT_SAVED_MESSAGE} (task: {task_name})"),
        )
    }

    fn new(kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            raised_at: Utc::now(),
        }
    }
}

pub type AlertSender = mpsc::UnboundedSender<Alert>;
pub type AlertReceiver = mpsc::UnboundedReceiver<Alert>;

pub fn alert_channel() -> (AlertSender, AlertReceiver) {
    mpsc::unbounded_channel()
}
