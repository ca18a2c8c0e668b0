use crate::domain::models::{
    Credentials, Phase, Selection, SessionConfig, DEFAULT_LONG_BREAK_MINUTES,
    DEFAULT_SHORT_BREAK_MINUTES, DEFAULT_WORK_MINUTES,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::KeyValueStore;
use std::sync::Arc;
use tracing::debug;

pub const KEY_SECRET: &str = "npw.secret";
pub const KEY_DATABASE_ID: &str = "npw.dbid";
pub const KEY_WORK_MINUTES: &str = "npw.work";
pub const KEY_SHORT_MINUTES: &str = "npw.short";
pub const KEY_LONG_MINUTES: &str = "npw.long";
pub const KEY_SELECTED_TASK: &str = "npw.selectedTaskId";
pub const KEY_REMAINING_SECONDS: &str = "npw.remaining";

pub const ENV_SECRET: &str = "TASK_TICKER_NOTION_SECRET";
pub const ENV_DATABASE_ID: &str = "TASK_TICKER_DATABASE_ID";

const DEFAULT_REMAINING_SECONDS: u32 = DEFAULT_WORK_MINUTES * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSettings {
    pub credentials: Credentials,
    pub config: SessionConfig,
    pub selection: Selection,
    pub remaining_seconds: u32,
}

/// Typed view over the key-value store. Missing or malformed values fall back
/// to defaults; they are never reported as errors.
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Result<PersistedSettings, InfraError> {
        Ok(PersistedSettings {
            credentials: self.load_credentials()?,
            config: self.load_config()?,
            selection: self.load_selection()?,
            remaining_seconds: self.load_remaining()?,
        })
    }

    pub fn load_config(&self) -> Result<SessionConfig, InfraError> {
        let work = self.positive_number(KEY_WORK_MINUTES)?.unwrap_or(DEFAULT_WORK_MINUTES);
        let short_break = self
            .positive_number(KEY_SHORT_MINUTES)?
            .unwrap_or(DEFAULT_SHORT_BREAK_MINUTES);
        let long_break = self
            .positive_number(KEY_LONG_MINUTES)?
            .unwrap_or(DEFAULT_LONG_BREAK_MINUTES);
        Ok(SessionConfig::from_minutes(work, short_break, long_break))
    }

    pub fn save_config(&self, config: &SessionConfig) -> Result<(), InfraError> {
        self.store
            .set(KEY_WORK_MINUTES, &config.minutes(Phase::Work).to_string())?;
        self.store
            .set(KEY_SHORT_MINUTES, &config.minutes(Phase::ShortBreak).to_string())?;
        self.store
            .set(KEY_LONG_MINUTES, &config.minutes(Phase::LongBreak).to_string())?;
        Ok(())
    }

    pub fn load_credentials(&self) -> Result<Credentials, InfraError> {
        Ok(Credentials {
            secret: self.store.get(KEY_SECRET)?.unwrap_or_default(),
            database_id: self.store.get(KEY_DATABASE_ID)?.unwrap_or_default(),
        })
    }

    pub fn save_credentials(&self, credentials: &Credentials) -> Result<(), InfraError> {
        self.store.set(KEY_SECRET, &credentials.secret)?;
        self.store.set(KEY_DATABASE_ID, &credentials.database_id)?;
        Ok(())
    }

    pub fn load_selection(&self) -> Result<Selection, InfraError> {
        Ok(Selection::new(self.store.get(KEY_SELECTED_TASK)?))
    }

    pub fn save_selection(&self, selection: &Selection) -> Result<(), InfraError> {
        self.store
            .set(KEY_SELECTED_TASK, selection.task_id().unwrap_or_default())
    }

    pub fn load_remaining(&self) -> Result<u32, InfraError> {
        Ok(self
            .positive_number(KEY_REMAINING_SECONDS)?
            .unwrap_or(DEFAULT_REMAINING_SECONDS))
    }

    pub fn save_remaining(&self, remaining_seconds: u32) -> Result<(), InfraError> {
        self.store
            .set(KEY_REMAINING_SECONDS, &remaining_seconds.to_string())
    }

    fn positive_number(&self, key: &str) -> Result<Option<u32>, InfraError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        let parsed = parse_positive(&raw);
        if parsed.is_none() {
            debug!(key, value = %raw, "ignoring malformed stored value");
        }
        Ok(parsed)
    }
}

fn parse_positive(raw: &str) -> Option<u32> {
    let value = raw.trim().parse::<f64>().ok()?;
    if !value.is_finite() || value < 1.0 {
        return None;
    }
    Some(value.min(u32::MAX as f64) as u32)
}

/// Fills empty stored credentials from the environment.
pub fn credentials_with_lookup<F>(stored: Credentials, lookup: F) -> Credentials
where
    F: Fn(&str) -> Option<String>,
{
    let fallback = |current: String, key: &str| {
        if !current.trim().is_empty() {
            return current;
        }
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(current)
    };
    Credentials {
        secret: fallback(stored.secret, ENV_SECRET),
        database_id: fallback(stored.database_id, ENV_DATABASE_ID),
    }
}
