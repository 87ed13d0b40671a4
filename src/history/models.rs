use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// One stored prompt/response exchange. Never modified after it is
/// written.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationRecord {
    pub id: String,
    pub identity: String,
    pub prompt: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub created_at: String,
    pub last_login: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("invalid stored timestamp {0:?}")]
    Timestamp(String),
    #[error("{0}")]
    Other(String),
}
