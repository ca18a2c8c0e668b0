use crate::application::alerts::AlertReceiver;
use crate::application::session::Session;
use crate::infrastructure::chime::{Chime, PlayerChime, SilentChime};
use crate::infrastructure::config::{ensure_default_config, load_app_config, AppConfig};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::SqliteKeyValueStore;
use crate::infrastructure::notion_client::ReqwestNotionClient;
use crate::infrastructure::settings_store::{credentials_with_lookup, SettingsStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const DATABASE_FILE: &str = "ticker.sqlite";
pub const LOG_FILE: &str = "ticker.log";

#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub database_path: PathBuf,
    pub app_config: AppConfig,
}

impl Workspace {
    pub fn log_path(&self) -> PathBuf {
        self.logs_dir.join(LOG_FILE)
    }
}

pub fn bootstrap_workspace(root: &Path) -> Result<Workspace, InfraError> {
    let config_dir = root.join("config");
    let state_dir = root.join("state");
    let logs_dir = root.join("logs");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_config(&config_dir)?;
    let app_config = load_app_config(&config_dir)?;

    Ok(Workspace {
        root: root.to_path_buf(),
        database_path: state_dir.join(DATABASE_FILE),
        config_dir,
        state_dir,
        logs_dir,
        app_config,
    })
}

pub fn open_settings(workspace: &Workspace) -> Result<SettingsStore, InfraError> {
    let store = SqliteKeyValueStore::open(&workspace.database_path)?;
    Ok(SettingsStore::new(Arc::new(store)))
}

pub fn open_chime(workspace: &Workspace) -> Result<Arc<dyn Chime>, InfraError> {
    if !workspace.app_config.chime.enabled {
        return Ok(Arc::new(SilentChime));
    }
    let chime = PlayerChime::prepare(&workspace.state_dir, &workspace.app_config.chime)?;
    Ok(Arc::new(chime))
}

pub fn open_session(
    workspace: &Workspace,
) -> Result<(Session<ReqwestNotionClient>, AlertReceiver), InfraError> {
    open_session_with_lookup(workspace, |key| std::env::var(key).ok())
}

pub fn open_session_with_lookup<F>(
    workspace: &Workspace,
    lookup: F,
) -> Result<(Session<ReqwestNotionClient>, AlertReceiver), InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let settings = open_settings(workspace)?;
    let mut persisted = settings.load()?;
    persisted.credentials = credentials_with_lookup(persisted.credentials, lookup);
    let client = Arc::new(ReqwestNotionClient::from_config(&workspace.app_config)?);
    let chime = open_chime(workspace)?;

    info!(
        root = %workspace.root.display(),
        credentials_ready = persisted.credentials.is_complete(),
        remaining = persisted.remaining_seconds,
        "session restored"
    );
    Ok(Session::new(persisted, settings, client, chime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Phase;
    use crate::infrastructure::settings_store::{ENV_DATABASE_ID, ENV_SECRET};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "task-ticker-bootstrap-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn silent(workspace: &Workspace) -> Workspace {
        let mut workspace = workspace.clone();
        workspace.app_config.chime.enabled = false;
        workspace
    }

    #[test]
    fn bootstrap_creates_layout_and_default_config() {
        let temp = TempWorkspace::new();
        let workspace = bootstrap_workspace(&temp.path).expect("bootstrap");

        assert!(workspace.config_dir.join("app.json").exists());
        assert!(workspace.state_dir.is_dir());
        assert!(workspace.logs_dir.is_dir());
        assert_eq!(workspace.database_path, temp.path.join("state").join("ticker.sqlite"));
        assert_eq!(workspace.app_config, AppConfig::default());
    }

    #[test]
    fn bootstrap_is_idempotent_and_keeps_edited_config() {
        let temp = TempWorkspace::new();
        bootstrap_workspace(&temp.path).expect("first bootstrap");
        fs::write(
            temp.path.join("config").join("app.json"),
            r#"{"schema":1,"requestTimeoutSeconds":20,"chime":{"enabled":false}}"#,
        )
        .expect("edit config");

        let workspace = bootstrap_workspace(&temp.path).expect("second bootstrap");

        assert_eq!(workspace.app_config.request_timeout_seconds, Some(20));
        assert!(!workspace.app_config.chime.enabled);
    }

    #[test]
    fn session_survives_reopen_with_environment_credentials() {
        let temp = TempWorkspace::new();
        let workspace = silent(&bootstrap_workspace(&temp.path).expect("bootstrap"));
        let lookup = |key: &str| match key {
            ENV_SECRET => Some("secret_env".to_string()),
            ENV_DATABASE_ID => Some("db-env".to_string()),
            _ => None,
        };

        {
            let (session, _alerts) =
                open_session_with_lookup(&workspace, lookup).expect("open session");
            assert!(session.snapshot().expect("snapshot").credentials_ready);
            session.set_duration(Phase::Work, 40).expect("set work");
            session.select_task("page-7").expect("select");
        }

        let (reopened, _alerts) =
            open_session_with_lookup(&workspace, |_| None).expect("reopen session");
        let snapshot = reopened.snapshot().expect("snapshot");
        assert!(!snapshot.credentials_ready);
        assert_eq!(snapshot.config.work_seconds(), 2400);
        assert_eq!(snapshot.timer.remaining_seconds, 2400);
        assert_eq!(snapshot.selection.task_id(), Some("page-7"));
    }

    #[test]
    fn disabled_chime_skips_sound_file() {
        let temp = TempWorkspace::new();
        let workspace = silent(&bootstrap_workspace(&temp.path).expect("bootstrap"));

        open_chime(&workspace).expect("open chime");

        assert!(!workspace.state_dir.join("ding.wav").exists());
    }
}
