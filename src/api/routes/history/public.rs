//! Public types for the history API
use serde::{Deserialize, Serialize};

use crate::chat::render::{format_message, format_timestamp, prompt_preview};
use crate::history::ConversationRecord;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HistoryRecord {
    pub id: String,
    pub identity: String,
    pub prompt: String,
    pub response: String,
    pub created_at: String,
    pub prompt_preview: String,
    pub response_html: String,
    pub created_at_display: String,
}

impl From<ConversationRecord> for HistoryRecord {
    fn from(record: ConversationRecord) -> Self {
        Self {
            prompt_preview: prompt_preview(&record.prompt),
            response_html: format_message(&record.response),
            created_at_display: format_timestamp(&record.created_at),
            created_at: record.created_at.to_rfc3339(),
            id: record.id,
            identity: record.identity,
            prompt: record.prompt,
            response: record.response,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HistoryResponse {
    pub identity: String,
    pub records: Vec<HistoryRecord>,
}
