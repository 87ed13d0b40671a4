use std::sync::Arc;

use async_trait::async_trait;
use tokio_rusqlite::Connection;

use super::db::{find_recent_records, insert_record, upsert_user};
use super::models::{ConversationRecord, StoreError};
use crate::auth::Identity;

/// Per-identity conversation history.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist one exchange and return the new record's ID.
    async fn append(
        &self,
        identity: &str,
        prompt: &str,
        response: &str,
    ) -> Result<String, StoreError>;

    async fn list_recent(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, StoreError>;

    /// Record that `identity` signed in.
    async fn touch_user(&self, identity: &Identity) -> Result<(), StoreError>;
}

pub type BoxedSessionStore = Arc<dyn SessionStore>;

#[derive(Clone)]
pub struct SqliteSessionStore {
    db: Connection,
}

impl SqliteSessionStore {
    pub fn new(db: Connection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn append(
        &self,
        identity: &str,
        prompt: &str,
        response: &str,
    ) -> Result<String, StoreError> {
        let id = insert_record(&self.db, identity, prompt, response).await?;
        tracing::info!("Conversation saved with ID: {}", id);
        Ok(id)
    }

    async fn list_recent(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, StoreError> {
        find_recent_records(&self.db, identity, limit).await
    }

    async fn touch_user(&self, identity: &Identity) -> Result<(), StoreError> {
        if upsert_user(&self.db, identity).await? {
            tracing::info!("New user saved: {}", identity.id);
        } else {
            tracing::debug!("User login timestamp updated: {}", identity.id);
        }
        Ok(())
    }
}
