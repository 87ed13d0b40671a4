//! The in-memory transcript shown to the user and the events emitted
//! when it changes.
use serde::Serialize;
use tokio::sync::mpsc;

use crate::history::ConversationRecord;

pub type EntryId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryRole {
    User,
    Assistant,
    Status,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Pending,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub id: EntryId,
    pub role: EntryRole,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusKind>,
}

impl TranscriptEntry {
    pub fn is_status(&self) -> bool {
        self.role == EntryRole::Status
    }
}

/// What the presentation layer needs to know to stay in sync.
#[derive(Clone, Debug, PartialEq)]
pub enum TranscriptEvent {
    Appended(TranscriptEntry),
    Updated(TranscriptEntry),
    Removed(EntryId),
    Cleared,
    /// The prompt was accepted, the input field can be emptied
    InputCleared,
    SavedLoaded(Vec<ConversationRecord>),
    SavedFailed(String),
}

/// Ordered entries for the current session. IDs are never reused,
/// not even after `clear`.
#[derive(Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    next_id: EntryId,
    tx: Option<mpsc::UnboundedSender<TranscriptEvent>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(tx: mpsc::UnboundedSender<TranscriptEvent>) -> Self {
        Self {
            tx: Some(tx),
            ..Default::default()
        }
    }

    /// Send an event to the listener if there is one. A listener that
    /// went away is ignored.
    pub fn emit(&self, event: TranscriptEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    fn push(&mut self, role: EntryRole, text: &str, status: Option<StatusKind>) -> EntryId {
        self.next_id += 1;
        let entry = TranscriptEntry {
            id: self.next_id,
            role,
            text: text.to_string(),
            status,
        };
        self.entries.push(entry.clone());
        self.emit(TranscriptEvent::Appended(entry));
        self.next_id
    }

    pub fn push_user(&mut self, text: &str) -> EntryId {
        self.push(EntryRole::User, text, None)
    }

    pub fn push_assistant(&mut self, text: &str) -> EntryId {
        self.push(EntryRole::Assistant, text, None)
    }

    pub fn push_status(&mut self, kind: StatusKind, text: &str) -> EntryId {
        self.push(EntryRole::Status, text, Some(kind))
    }

    /// Rewrite a status entry in place. Returns `false` if it is
    /// already gone.
    pub fn update_status(&mut self, id: EntryId, kind: StatusKind, text: &str) -> bool {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.id == id && e.is_status())
        else {
            return false;
        };
        entry.status = Some(kind);
        entry.text = text.to_string();
        let updated = entry.clone();
        self.emit(TranscriptEvent::Updated(updated));
        true
    }

    pub fn remove(&mut self, id: EntryId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        let removed = self.entries.len() != before;
        if removed {
            self.emit(TranscriptEvent::Removed(id));
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.emit(TranscriptEvent::Cleared);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&TranscriptEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_never_reuses_ids() {
        let mut transcript = Transcript::new();
        let a = transcript.push_user("a");
        transcript.clear();
        let b = transcript.push_user("b");
        assert!(b > a);
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn it_only_updates_status_entries() {
        let mut transcript = Transcript::new();
        let user = transcript.push_user("hi");
        let status = transcript.push_status(StatusKind::Pending, "Sending...");

        assert!(!transcript.update_status(user, StatusKind::Error, "nope"));
        assert!(transcript.update_status(status, StatusKind::Error, "Error: boom"));
        let entry = transcript.get(status).unwrap();
        assert_eq!(entry.status, Some(StatusKind::Error));
        assert_eq!(entry.text, "Error: boom");

        assert!(transcript.remove(status));
        assert!(!transcript.remove(status));
        assert!(!transcript.update_status(status, StatusKind::Error, "gone"));
    }

    #[test]
    fn it_emits_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transcript = Transcript::with_events(tx);
        let id = transcript.push_status(StatusKind::Pending, "wait");
        transcript.remove(id);
        transcript.clear();

        assert!(matches!(rx.try_recv(), Ok(TranscriptEvent::Appended(e)) if e.id == id));
        assert_eq!(rx.try_recv(), Ok(TranscriptEvent::Removed(id)));
        assert_eq!(rx.try_recv(), Ok(TranscriptEvent::Cleared));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn it_serializes_entries() {
        let mut transcript = Transcript::new();
        transcript.push_user("hi");
        transcript.push_status(StatusKind::Pending, "wait");
        let json = serde_json::to_value(transcript.entries()).unwrap();
        assert_eq!(json[0]["role"], "user");
        assert!(json[0].get("status").is_none());
        assert_eq!(json[1]["status"], "pending");
    }
}
