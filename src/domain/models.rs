use serde::{Deserialize, Serialize};

pub const MIN_DURATION_MINUTES: u32 = 1;
pub const MAX_DURATION_MINUTES: u32 = 180;
pub const DEFAULT_WORK_MINUTES: u32 = 25;
pub const DEFAULT_SHORT_BREAK_MINUTES: u32 = 5;
pub const DEFAULT_LONG_BREAK_MINUTES: u32 = 15;

const MIN_DURATION_SECONDS: u32 = MIN_DURATION_MINUTES * 60;
const MAX_DURATION_SECONDS: u32 = MAX_DURATION_MINUTES * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Work,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::ShortBreak => "short",
            Self::LongBreak => "long",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::ShortBreak => "Short break",
            Self::LongBreak => "Long break",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "work" => Some(Self::Work),
            "short" | "short_break" | "shortbreak" => Some(Self::ShortBreak),
            "long" | "long_break" | "longbreak" => Some(Self::LongBreak),
            _ => None,
        }
    }

    /// Phase entered automatically when this one runs out. Long breaks are
    /// only ever entered by hand.
    pub fn successor(self) -> Self {
        match self {
            Self::Work => Self::ShortBreak,
            Self::ShortBreak | Self::LongBreak => Self::Work,
        }
    }
}

/// Nominal phase lengths in seconds. Each is a whole number of minutes within
/// 1..=180, so the minute-based persistence round-trips exactly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    work_seconds: u32,
    short_break_seconds: u32,
    long_break_seconds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_minutes(
            DEFAULT_WORK_MINUTES,
            DEFAULT_SHORT_BREAK_MINUTES,
            DEFAULT_LONG_BREAK_MINUTES,
        )
    }
}

impl SessionConfig {
    pub fn new(work_seconds: u32, short_break_seconds: u32, long_break_seconds: u32) -> Self {
        Self {
            work_seconds: clamp_seconds(work_seconds),
            short_break_seconds: clamp_seconds(short_break_seconds),
            long_break_seconds: clamp_seconds(long_break_seconds),
        }
    }

    pub fn from_minutes(work: u32, short_break: u32, long_break: u32) -> Self {
        Self::new(
            work.saturating_mul(60),
            short_break.saturating_mul(60),
            long_break.saturating_mul(60),
        )
    }

    pub fn work_seconds(&self) -> u32 {
        self.work_seconds
    }

    pub fn short_break_seconds(&self) -> u32 {
        self.short_break_seconds
    }

    pub fn long_break_seconds(&self) -> u32 {
        self.long_break_seconds
    }

    pub fn minutes(&self, phase: Phase) -> u32 {
        self.nominal_duration(phase) / 60
    }

    pub fn nominal_duration(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Work => self.work_seconds,
            Phase::ShortBreak => self.short_break_seconds,
            Phase::LongBreak => self.long_break_seconds,
        }
    }

    pub fn with_minutes(mut self, phase: Phase, minutes: u32) -> Self {
        let seconds = clamp_seconds(minutes.saturating_mul(60));
        match phase {
            Phase::Work => self.work_seconds = seconds,
            Phase::ShortBreak => self.short_break_seconds = seconds,
            Phase::LongBreak => self.long_break_seconds = seconds,
        }
        self
    }
}

fn clamp_seconds(seconds: u32) -> u32 {
    let minutes = seconds.saturating_add(30) / 60;
    minutes.saturating_mul(60).clamp(MIN_DURATION_SECONDS, MAX_DURATION_SECONDS)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerState {
    pub phase: Phase,
    pub remaining_seconds: u32,
    pub running: bool,
}

impl TimerState {
    pub fn clock_label(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.remaining_seconds / 60,
            self.remaining_seconds % 60
        )
    }

    pub fn progress(&self, config: &SessionConfig) -> f64 {
        let total = config.nominal_duration(self.phase).max(1) as f64;
        (1.0 - self.remaining_seconds as f64 / total).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub planned_units: Option<u32>,
    pub finished_units: u32,
    pub status: String,
}

impl Task {
    pub fn progress_label(&self) -> String {
        match self.planned_units {
            Some(planned) => format!(
                "Status: {} · Finished {} / {planned}",
                self.status, self.finished_units
            ),
            None => format!("Status: {} · Finished {}", self.status, self.finished_units),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Selection(Option<String>);

impl Selection {
    pub fn new(task_id: Option<String>) -> Self {
        Self(
            task_id
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        )
    }

    pub fn task_id(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn resolve<'a>(&self, tasks: &'a [Task]) -> Option<&'a Task> {
        let task_id = self.task_id()?;
        tasks.iter().find(|task| task.id == task_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub secret: String,
    pub database_id: String,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        self.has_secret() && !self.database_id.trim().is_empty()
    }

    pub fn has_secret(&self) -> bool {
        !self.secret.trim().is_empty()
    }
}
