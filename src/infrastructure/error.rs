use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("task store error: http {status}; body={body}")]
    TaskStoreHttp { status: u16, body: String },
    #[error("task store request failed: {0}")]
    TaskStoreTransport(String),
    #[error("notification failed: {0}")]
    Notification(String),
}

impl InfraError {
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::TaskStoreHttp { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }
}
