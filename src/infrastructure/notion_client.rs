use crate::infrastructure::config::{AppConfig, DEFAULT_NOTION_API_BASE, DEFAULT_NOTION_VERSION};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::task_mapper::{NotionPage, QueryRequest};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

const NOTION_VERSION_HEADER: &str = "Notion-Version";

#[async_trait]
pub trait TaskStoreClient: Send + Sync {
    async fn query(
        &self,
        secret: &str,
        database_id: &str,
        request: &QueryRequest,
    ) -> Result<Vec<NotionPage>, InfraError>;

    async fn patch(
        &self,
        secret: &str,
        page_id: &str,
        properties: &serde_json::Value,
    ) -> Result<NotionPage, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestNotionClient {
    client: Client,
    api_base: String,
    notion_version: String,
}

impl Default for ReqwestNotionClient {
    fn default() -> Self {
        Self {
            client: Client::new(),
            api_base: DEFAULT_NOTION_API_BASE.to_string(),
            notion_version: DEFAULT_NOTION_VERSION.to_string(),
        }
    }
}

impl ReqwestNotionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, InfraError> {
        let mut builder = Client::builder();
        if let Some(seconds) = config.request_timeout_seconds.filter(|seconds| *seconds > 0) {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let client = builder.build().map_err(|error| {
            InfraError::TaskStoreTransport(format!("failed building http client: {error}"))
        })?;
        Ok(Self {
            client,
            api_base: config.notion_api_base.clone(),
            notion_version: config.notion_version.clone(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into();
        self.api_base = if api_base.ends_with('/') {
            api_base
        } else {
            format!("{api_base}/")
        };
        self
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::InvalidConfig(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.api_base).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid notion api base url: {error}"))
        })?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("notion api base URL cannot be a base".to_string())
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn read_body(
        response: reqwest::Response,
        action: &str,
    ) -> Result<(StatusCode, String), InfraError> {
        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::TaskStoreTransport(format!("failed reading {action} response: {error}"))
        })?;
        if !status.is_success() {
            return Err(InfraError::TaskStoreHttp {
                status: status.as_u16(),
                body,
            });
        }
        Ok((status, body))
    }
}

#[derive(Debug, serde::Deserialize)]
struct QueryPageResponse {
    #[serde(default)]
    results: Vec<NotionPage>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct PatchPageRequest<'a> {
    properties: &'a serde_json::Value,
}

#[async_trait]
impl TaskStoreClient for ReqwestNotionClient {
    async fn query(
        &self,
        secret: &str,
        database_id: &str,
        request: &QueryRequest,
    ) -> Result<Vec<NotionPage>, InfraError> {
        Self::ensure_non_empty(secret, "notion secret")?;
        Self::ensure_non_empty(database_id, "database id")?;

        let endpoint = self.endpoint(&["databases", database_id.trim(), "query"])?;
        let mut request = request.clone();
        let mut pages = Vec::new();

        loop {
            let response = self
                .client
                .post(endpoint.clone())
                .bearer_auth(secret)
                .header(NOTION_VERSION_HEADER, &self.notion_version)
                .json(&request)
                .send()
                .await
                .map_err(|error| {
                    InfraError::TaskStoreTransport(format!(
                        "network error while querying database: {error}"
                    ))
                })?;
            let (_, body) = Self::read_body(response, "database query").await?;

            let parsed: QueryPageResponse = serde_json::from_str(&body).map_err(|error| {
                InfraError::TaskStoreTransport(format!(
                    "invalid database query payload: {error}; body={body}"
                ))
            })?;
            pages.extend(parsed.results);

            match parsed.next_cursor.filter(|_| parsed.has_more) {
                Some(cursor) => request.start_cursor = Some(cursor),
                None => break,
            }
        }

        Ok(pages)
    }

    async fn patch(
        &self,
        secret: &str,
        page_id: &str,
        properties: &serde_json::Value,
    ) -> Result<NotionPage, InfraError> {
        Self::ensure_non_empty(secret, "notion secret")?;
        Self::ensure_non_empty(page_id, "page id")?;

        let endpoint = self.endpoint(&["pages", page_id.trim()])?;
        let response = self
            .client
            .patch(endpoint)
            .bearer_auth(secret)
            .header(NOTION_VERSION_HEADER, &self.notion_version)
            .json(&PatchPageRequest { properties })
            .send()
            .await
            .map_err(|error| {
                InfraError::TaskStoreTransport(format!("network error while updating page: {error}"))
            })?;
        let (_, body) = Self::read_body(response, "page update").await?;

        serde_json::from_str(&body).map_err(|error| {
            InfraError::TaskStoreTransport(format!("invalid page update payload: {error}; body={body}"))
        })
    }
}
