use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u8 = 1;

pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com/v1/";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema: u8,
    #[serde(default = "default_api_base")]
    pub notion_api_base: String,
    #[serde(default = "default_notion_version")]
    pub notion_version: String,
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub chime: ChimeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChimeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub player: Option<String>,
}

impl Default for ChimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            player: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: SUPPORTED_SCHEMA,
            notion_api_base: default_api_base(),
            notion_version: default_notion_version(),
            request_timeout_seconds: None,
            chime: ChimeConfig::default(),
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_NOTION_API_BASE.to_string()
}

fn default_notion_version() -> String {
    DEFAULT_NOTION_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

pub fn ensure_default_config(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&AppConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let raw = fs::read_to_string(&path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != u64::from(SUPPORTED_SCHEMA) {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    let mut config: AppConfig = serde_json::from_value(parsed)?;
    config.notion_api_base = normalize_api_base(&config.notion_api_base)?;
    config.chime.player = config
        .chime
        .player
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    Ok(config)
}

fn normalize_api_base(raw: &str) -> Result<String, InfraError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InfraError::InvalidConfig(
            "notionApiBase must not be empty".to_string(),
        ));
    }
    if trimmed.ends_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_CONFIG: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_CONFIG.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "task-ticker-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn default_config_is_written_once_and_loads() {
        let dir = TempConfigDir::new();
        ensure_default_config(&dir.path).expect("write defaults");
        let loaded = load_app_config(&dir.path).expect("load defaults");
        assert_eq!(loaded, AppConfig::default());

        fs::write(
            dir.path.join(APP_JSON),
            r#"{"schema":1,"notionApiBase":"http://127.0.0.1:9000","chime":{"enabled":false,"player":"  "}}"#,
        )
        .expect("overwrite config");
        ensure_default_config(&dir.path).expect("keep existing");
        let loaded = load_app_config(&dir.path).expect("load custom");
        assert_eq!(loaded.notion_api_base, "http://127.0.0.1:9000/");
        assert_eq!(loaded.notion_version, DEFAULT_NOTION_VERSION);
        assert!(!loaded.chime.enabled);
        assert_eq!(loaded.chime.player, None);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempConfigDir::new();
        fs::write(dir.path.join(APP_JSON), r#"{"schema":2}"#).expect("write config");
        match load_app_config(&dir.path) {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("unsupported schema")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }
}
