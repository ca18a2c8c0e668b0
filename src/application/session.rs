use crate::application::alerts::{alert_channel, Alert, AlertReceiver, AlertSender};
use crate::application::completion::{CompletionCoordinator, CompletionReport};
use crate::application::task_board::{IncrementOutcome, LoadOutcome, TaskBoard, TaskSync};
use crate::application::tick_driver::TickDriver;
use crate::domain::models::{Credentials, Phase, Selection, SessionConfig, Task, TimerState};
use crate::domain::phase_controller::{PhaseController, Transition};
use crate::domain::session_clock::{self, TickOutcome, TICK_PERIOD_MS};
use crate::infrastructure::chime::Chime;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::notion_client::TaskStoreClient;
use crate::infrastructure::settings_store::{PersistedSettings, SettingsStore};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub timer: TimerState,
    pub config: SessionConfig,
    pub tasks: Vec<Task>,
    pub selection: Selection,
    pub selected_task: Option<Task>,
    pub loading: bool,
    pub credentials_ready: bool,
}

#[derive(Debug)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub completion: Option<CompletionReport>,
    pub increment: Option<JoinHandle<IncrementOutcome>>,
}

impl TickReport {
    fn ignored() -> Self {
        Self {
            outcome: TickOutcome::Idle,
            completion: None,
            increment: None,
        }
    }
}

struct SessionState {
    controller: PhaseController,
    board: TaskBoard,
    credentials: Credentials,
    driver: TickDriver,
}

struct Shared<C>
where
    C: TaskStoreClient + 'static,
{
    state: Mutex<SessionState>,
    sync: TaskSync<C>,
    coordinator: CompletionCoordinator,
    settings: SettingsStore,
    alerts: AlertSender,
    timer_tx: watch::Sender<TimerState>,
}

/// The single coordination context. Every surface command, tick and network
/// completion goes through here; the lock is never held across an await.
pub struct Session<C>
where
    C: TaskStoreClient + 'static,
{
    shared: Arc<Shared<C>>,
}

impl<C> Clone for Session<C>
where
    C: TaskStoreClient + 'static,
{
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C> Session<C>
where
    C: TaskStoreClient + 'static,
{
    pub fn new(
        persisted: PersistedSettings,
        settings: SettingsStore,
        client: Arc<C>,
        chime: Arc<dyn Chime>,
    ) -> (Self, AlertReceiver) {
        Self::with_tick_period(
            persisted,
            settings,
            client,
            chime,
            Duration::from_millis(TICK_PERIOD_MS),
        )
    }

    pub fn with_tick_period(
        persisted: PersistedSettings,
        settings: SettingsStore,
        client: Arc<C>,
        chime: Arc<dyn Chime>,
        period: Duration,
    ) -> (Self, AlertReceiver) {
        let controller = PhaseController::restore(persisted.config, persisted.remaining_seconds);
        let (timer_tx, _) = watch::channel(controller.state());
        let (alerts, alert_rx) = alert_channel();
        let driver = TickDriver::new(period);

        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState {
                controller,
                board: TaskBoard::new(persisted.selection),
                credentials: persisted.credentials,
                driver,
            }),
            sync: TaskSync::new(client),
            coordinator: CompletionCoordinator::new(chime),
            settings,
            alerts,
            timer_tx,
        });

        let weak: Weak<Shared<C>> = Arc::downgrade(&shared);
        if let Ok(state) = shared.state.lock() {
            state.driver.set_handler(move |generation| {
                if let Some(shared) = weak.upgrade() {
                    let _ = Session { shared }.handle_tick(generation);
                }
            });
        }

        (Self { shared }, alert_rx)
    }

    pub fn subscribe_timer(&self) -> watch::Receiver<TimerState> {
        self.shared.timer_tx.subscribe()
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, InfraError> {
        let state = self.lock_state()?;
        Ok(SessionSnapshot {
            timer: state.controller.state(),
            config: *state.controller.config(),
            tasks: state.board.tasks().to_vec(),
            selection: state.board.selection().clone(),
            selected_task: state.board.selected_task().cloned(),
            loading: state.board.is_loading(),
            credentials_ready: state.credentials.is_complete(),
        })
    }

    pub fn start(&self) -> Result<TimerState, InfraError> {
        let mut state = self.lock_state()?;
        let transition = state.controller.start();
        if state.controller.is_running() && !state.driver.is_active() {
            state.driver.start();
        }
        info!(phase = transition.state.phase.as_str(), "timer started");
        Ok(self.publish(transition))
    }

    pub fn pause(&self) -> Result<TimerState, InfraError> {
        let mut state = self.lock_state()?;
        let transition = state.controller.pause();
        state.driver.stop();
        if transition.changed {
            info!(remaining = transition.state.remaining_seconds, "timer paused");
        }
        Ok(self.publish(transition))
    }

    pub fn reset(&self) -> Result<TimerState, InfraError> {
        let mut state = self.lock_state()?;
        let transition = state.controller.reset();
        state.driver.stop();
        self.persist_remaining(transition);
        Ok(self.publish(transition))
    }

    pub fn select_phase(&self, phase: Phase) -> Result<TimerState, InfraError> {
        let mut state = self.lock_state()?;
        let transition = state.controller.select_phase(phase);
        self.persist_remaining(transition);
        Ok(self.publish(transition))
    }

    pub fn update_config(&self, config: SessionConfig) -> Result<TimerState, InfraError> {
        let mut state = self.lock_state()?;
        if *state.controller.config() != config {
            self.shared.settings.save_config(&config)?;
        }
        let transition = state.controller.config_changed(config);
        self.persist_remaining(transition);
        Ok(self.publish(transition))
    }

    pub fn set_duration(&self, phase: Phase, minutes: u32) -> Result<TimerState, InfraError> {
        let config = {
            let state = self.lock_state()?;
            state.controller.config().with_minutes(phase, minutes)
        };
        self.update_config(config)
    }

    pub fn set_credentials(&self, credentials: Credentials) -> Result<(), InfraError> {
        let credentials = Credentials {
            secret: credentials.secret.trim().to_string(),
            database_id: credentials.database_id.trim().to_string(),
        };
        let mut state = self.lock_state()?;
        if state.credentials != credentials {
            self.shared.settings.save_credentials(&credentials)?;
            state.credentials = credentials;
        }
        Ok(())
    }

    /// Replaces only the given parts; the rest comes from the session's
    /// current credentials, including values taken from the environment.
    pub fn update_credentials(
        &self,
        secret: Option<String>,
        database_id: Option<String>,
    ) -> Result<Credentials, InfraError> {
        let merged = {
            let state = self.lock_state()?;
            Credentials {
                secret: secret.unwrap_or_else(|| state.credentials.secret.clone()),
                database_id: database_id.unwrap_or_else(|| state.credentials.database_id.clone()),
            }
        };
        self.set_credentials(merged)?;
        Ok(self.lock_state()?.credentials.clone())
    }

    pub fn select_task(&self, task_id: &str) -> Result<Selection, InfraError> {
        self.apply_selection(Selection::new(Some(task_id.to_string())))
    }

    pub fn clear_selection(&self) -> Result<Selection, InfraError> {
        self.apply_selection(Selection::default())
    }

    pub fn resolve_task(&self, reference: &str) -> Result<Option<Task>, InfraError> {
        let state = self.lock_state()?;
        Ok(state.board.resolve_reference(reference).cloned())
    }

    pub fn test_chime(&self) {
        self.shared.coordinator.ring();
    }

    pub async fn load_tasks(&self) -> LoadOutcome {
        let prepared = self.lock_state().map(|mut state| {
            if !state.credentials.is_complete() {
                return None;
            }
            Some((state.credentials.clone(), state.board.begin_load()))
        });
        let (credentials, generation) = match prepared {
            Ok(Some(prepared)) => prepared,
            Ok(None) => {
                debug!("task load skipped: secret or database id missing");
                return LoadOutcome::NotConfigured;
            }
            Err(error) => {
                error!(%error, "task load aborted");
                return LoadOutcome::Failed;
            }
        };

        let result = self.shared.sync.fetch_tasks(&credentials).await;

        let finished = self
            .lock_state()
            .and_then(|mut state| state.board.finish_load(generation, result));
        match finished {
            Ok(LoadOutcome::Superseded) => {
                debug!(generation, "discarded superseded task load");
                LoadOutcome::Superseded
            }
            Ok(outcome) => outcome,
            Err(error) => {
                error!(
                    %error,
                    body = error.response_body().unwrap_or_default(),
                    "task store query error"
                );
                self.raise(Alert::task_load_failed());
                LoadOutcome::Failed
            }
        }
    }

    /// Manual +1 for a task in the loaded list. References that do not resolve
    /// are refused so an unloaded list never overwrites the remote count.
    pub async fn increment_listed(&self, reference: &str) -> IncrementOutcome {
        let task_id = match self.resolve_task(reference) {
            Ok(Some(task)) => task.id,
            Ok(None) => {
                debug!(reference, "manual increment refused: task not loaded");
                return IncrementOutcome::NotLoaded;
            }
            Err(error) => {
                error!(%error, reference, "manual increment aborted");
                return IncrementOutcome::Failed;
            }
        };
        self.increment_finished(&task_id).await
    }

    pub async fn increment_finished(&self, task_id: &str) -> IncrementOutcome {
        let prepared = self.lock_state().map(|state| {
            if !state.credentials.has_secret() {
                return None;
            }
            let task_name = state
                .board
                .find(task_id)
                .map(|task| task.name.clone())
                .unwrap_or_else(|| task_id.to_string());
            let next = state.board.finished_units(task_id).saturating_add(1);
            Some((state.credentials.clone(), task_name, next))
        });
        let (credentials, task_name, next) = match prepared {
            Ok(Some(prepared)) => prepared,
            Ok(None) => {
                debug!(task_id, "increment skipped: secret missing");
                return IncrementOutcome::NotConfigured;
            }
            Err(error) => {
                error!(%error, task_id, "increment aborted");
                return IncrementOutcome::Failed;
            }
        };

        match self
            .shared
            .sync
            .push_finished(&credentials, task_id, next)
            .await
        {
            Ok(()) => {
                match self.lock_state() {
                    Ok(mut state) => {
                        state.board.apply_finished(task_id, next);
                    }
                    Err(error) => warn!(%error, task_id, "could not mirror finished count"),
                }
                info!(task_id, finished = next, "recorded finished session");
                IncrementOutcome::Applied {
                    finished_units: next,
                }
            }
            Err(error) => {
                error!(
                    %error,
                    task_id,
                    body = error.response_body().unwrap_or_default(),
                    "failed to update Finished"
                );
                self.raise(Alert::progress_not_saved(&task_name));
                IncrementOutcome::Failed
            }
        }
    }

    pub(crate) fn handle_tick(&self, generation: u64) -> TickReport {
        let Ok(mut state) = self.lock_state() else {
            warn!("tick dropped: session lock poisoned");
            return TickReport::ignored();
        };
        if state.driver.generation() != generation {
            debug!(generation, "ignoring tick from stopped driver");
            return TickReport::ignored();
        }

        let outcome = session_clock::advance(&mut state.controller);
        match outcome {
            TickOutcome::Idle => {
                state.driver.stop();
                TickReport::ignored()
            }
            TickOutcome::Stalled => {
                warn!("running timer already at zero, tick ignored");
                TickReport {
                    outcome,
                    completion: None,
                    increment: None,
                }
            }
            TickOutcome::Counting { .. } => {
                let timer = state.controller.state();
                self.save_remaining(timer.remaining_seconds);
                self.shared.timer_tx.send_replace(timer);
                TickReport {
                    outcome,
                    completion: None,
                    increment: None,
                }
            }
            TickOutcome::ZeroCrossing => {
                let mut increment = None;
                let state = &mut *state;
                let completion = self.shared.coordinator.on_zero_crossing(
                    &mut state.controller,
                    &state.board,
                    |task_id| {
                        let session = self.clone();
                        increment = Some(tokio::spawn(async move {
                            session.increment_finished(&task_id).await
                        }));
                    },
                );
                state.driver.stop();
                self.save_remaining(completion.next.remaining_seconds);
                self.shared.timer_tx.send_replace(completion.next);
                TickReport {
                    outcome,
                    completion: Some(completion),
                    increment,
                }
            }
        }
    }

    fn apply_selection(&self, selection: Selection) -> Result<Selection, InfraError> {
        let mut state = self.lock_state()?;
        if state.board.select(selection.clone()) {
            self.shared.settings.save_selection(&selection)?;
        }
        Ok(selection)
    }

    fn publish(&self, transition: Transition) -> TimerState {
        if transition.changed {
            self.shared.timer_tx.send_replace(transition.state);
        }
        transition.state
    }

    fn persist_remaining(&self, transition: Transition) {
        if transition.changed {
            self.save_remaining(transition.state.remaining_seconds);
        }
    }

    fn save_remaining(&self, remaining_seconds: u32) {
        if let Err(error) = self.shared.settings.save_remaining(remaining_seconds) {
            warn!(%error, remaining_seconds, "failed to persist remaining time");
        }
    }

    fn raise(&self, alert: Alert) {
        if self.shared.alerts.send(alert).is_err() {
            debug!("alert dropped: no receiver");
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, SessionState>, InfraError> {
        self.shared
            .state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("session lock poisoned: {error}")))
    }
}
