use crate::domain::models::{Credentials, Selection, Task};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::notion_client::TaskStoreClient;
use crate::infrastructure::task_mapper::{
    eligible_tasks_query, finished_update, page_to_task, MarkerSchema,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    NotConfigured,
    Loaded { count: usize },
    Superseded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    NotConfigured,
    NotLoaded,
    Applied { finished_units: u32 },
    Failed,
}

/// Loaded tasks plus the active selection. The selection is kept even when it
/// does not resolve against the current list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskBoard {
    tasks: Vec<Task>,
    selection: Selection,
    latest_load: u64,
    loading: bool,
}

impl TaskBoard {
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            ..Self::default()
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.selection.resolve(&self.tasks)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn select(&mut self, selection: Selection) -> bool {
        if self.selection == selection {
            return false;
        }
        self.selection = selection;
        true
    }

    pub fn begin_load(&mut self) -> u64 {
        self.latest_load += 1;
        self.loading = true;
        self.latest_load
    }

    pub fn finish_load(
        &mut self,
        generation: u64,
        result: Result<Vec<Task>, InfraError>,
    ) -> Result<LoadOutcome, InfraError> {
        if generation != self.latest_load {
            return Ok(LoadOutcome::Superseded);
        }
        self.loading = false;
        let tasks = result?;
        let count = tasks.len();
        self.tasks = tasks;
        Ok(LoadOutcome::Loaded { count })
    }

    pub fn finished_units(&self, task_id: &str) -> u32 {
        self.find(task_id).map_or(0, |task| task.finished_units)
    }

    pub fn apply_finished(&mut self, task_id: &str, finished_units: u32) -> bool {
        match self.tasks.iter_mut().find(|task| task.id == task_id) {
            Some(task) => {
                task.finished_units = finished_units;
                true
            }
            None => false,
        }
    }

    pub fn find(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    /// Resolves a user reference: a 1-based list position or a task id.
    pub fn resolve_reference(&self, reference: &str) -> Option<&Task> {
        let reference = reference.trim();
        if let Ok(position) = reference.parse::<usize>() {
            if let Some(task) = position.checked_sub(1).and_then(|index| self.tasks.get(index)) {
                return Some(task);
            }
        }
        self.find(reference)
    }
}

/// Remote side of the task board: fetching the eligible list and writing the
/// finished counter.
pub struct TaskSync<C>
where
    C: TaskStoreClient,
{
    client: Arc<C>,
}

impl<C> TaskSync<C>
where
    C: TaskStoreClient,
{
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Tries the status-typed marker first, then once with the select-typed
    /// marker.
    pub async fn fetch_tasks(&self, credentials: &Credentials) -> Result<Vec<Task>, InfraError> {
        let primary = self
            .client
            .query(
                &credentials.secret,
                &credentials.database_id,
                &eligible_tasks_query(MarkerSchema::Status),
            )
            .await;
        let pages = match primary {
            Ok(pages) => pages,
            Err(error) => {
                warn!(%error, "status marker query failed, retrying with select marker");
                self.client
                    .query(
                        &credentials.secret,
                        &credentials.database_id,
                        &eligible_tasks_query(MarkerSchema::Select),
                    )
                    .await?
            }
        };
        let tasks = pages.iter().map(page_to_task).collect::<Vec<_>>();
        info!(count = tasks.len(), "loaded tasks from task store");
        Ok(tasks)
    }

    pub async fn push_finished(
        &self,
        credentials: &Credentials,
        task_id: &str,
        finished_units: u32,
    ) -> Result<(), InfraError> {
        self.client
            .patch(&credentials.secret, task_id, &finished_update(finished_units))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use crate::infrastructure::task_mapper::{NotionPage, QueryRequest};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub enum FakeResponse {
        Pages(Vec<NotionPage>),
        HttpError(u16),
        NetworkError,
    }

    #[derive(Debug, Default)]
    pub struct FakeTaskStoreClient {
        query_responses: Mutex<VecDeque<FakeResponse>>,
        patch_responses: Mutex<VecDeque<FakeResponse>>,
        pub query_calls: AtomicUsize,
        pub patch_calls: AtomicUsize,
        pub query_bodies: Mutex<Vec<Value>>,
        pub patch_bodies: Mutex<Vec<(String, Value)>>,
    }

    impl FakeTaskStoreClient {
        pub fn with_queries(responses: Vec<FakeResponse>) -> Self {
            Self {
                query_responses: Mutex::new(responses.into()),
                ..Self::default()
            }
        }

        pub fn with_patches(self, responses: Vec<FakeResponse>) -> Self {
            *self.patch_responses.lock().expect("patch responses lock") = responses.into();
            self
        }

        pub fn queries(&self) -> usize {
            self.query_calls.load(Ordering::SeqCst)
        }

        pub fn patches(&self) -> usize {
            self.patch_calls.load(Ordering::SeqCst)
        }

        fn respond(response: Option<FakeResponse>) -> Result<Vec<NotionPage>, InfraError> {
            match response.unwrap_or(FakeResponse::Pages(Vec::new())) {
                FakeResponse::Pages(pages) => Ok(pages),
                FakeResponse::HttpError(status) => Err(InfraError::TaskStoreHttp {
                    status,
                    body: format!("{{\"status\":{status}}}"),
                }),
                FakeResponse::NetworkError => Err(InfraError::TaskStoreTransport(
                    "network error while querying database".to_string(),
                )),
            }
        }
    }

    #[async_trait]
    impl TaskStoreClient for FakeTaskStoreClient {
        async fn query(
            &self,
            _secret: &str,
            _database_id: &str,
            request: &QueryRequest,
        ) -> Result<Vec<NotionPage>, InfraError> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.query_bodies
                .lock()
                .expect("query bodies lock")
                .push(serde_json::to_value(request).expect("serialize query"));
            let response = self
                .query_responses
                .lock()
                .expect("query responses lock")
                .pop_front();
            Self::respond(response)
        }

        async fn patch(
            &self,
            _secret: &str,
            page_id: &str,
            properties: &Value,
        ) -> Result<NotionPage, InfraError> {
            self.patch_calls.fetch_add(1, Ordering::SeqCst);
            self.patch_bodies
                .lock()
                .expect("patch bodies lock")
                .push((page_id.to_string(), properties.clone()));
            let response = self
                .patch_responses
                .lock()
                .expect("patch responses lock")
                .pop_front();
            Self::respond(response).map(|_| NotionPage {
                id: page_id.to_string(),
                properties: Value::Null,
            })
        }
    }

    pub fn task_page(id: &str, name: &str, finished: u32) -> NotionPage {
        NotionPage {
            id: id.to_string(),
            properties: json!({
                "Name": { "title": [{ "plain_text": name }] },
                "Planned": { "number": 4 },
                "Finished": { "number": finished },
                "Status": { "status": { "name": "In Progress" } }
            }),
        }
    }

    pub fn credentials() -> Credentials {
        Credentials {
            secret: "secret_test".to_string(),
            database_id: "db-test".to_string(),
        }
    }
}
