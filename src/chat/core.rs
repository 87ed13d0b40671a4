use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::models::{EntryId, StatusKind, Transcript, TranscriptEntry, TranscriptEvent};
use crate::auth::{AuthGate, Identity};
use crate::history::{BoxedSessionStore, ConversationRecord, DEFAULT_HISTORY_LIMIT};
use crate::openai::{BoxedCompleter, CompletionError, CompletionOptions, KeyError, KeyStore};

pub const PENDING_MESSAGE: &str = "Sending to OpenAI...";
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save conversation";
pub const KEY_SAVED_MESSAGE: &str = "API key saved for this session";
pub const KEY_INVALID_MESSAGE: &str = "Invalid API key format";
pub const KEY_REMOVED_MESSAGE: &str = "API key removed";
const DEFAULT_STATUS_TTL: Duration = Duration::from_secs(5);
const NOTICE_TTL: Duration = Duration::from_secs(3);

/// Reasons a prompt is turned away before anything is sent. Checked
/// in declaration order, the first failure wins.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Please enter a prompt")]
    EmptyPrompt,
    #[error("Please enter an OpenAI API key")]
    MissingApiKey,
    #[error("Please log in to use this feature")]
    AuthRequired,
}

/// How an accepted submission ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    /// The response is in the transcript. `record_id` is `None` when
    /// saving it failed.
    Success {
        response: String,
        record_id: Option<String>,
    },
    Failed(CompletionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Validating,
    AwaitingCompletion,
    Persisting,
    Settled,
}

#[derive(Default)]
struct SessionState {
    transcript: Transcript,
    saved: Vec<ConversationRecord>,
}

/// Everything one user session needs to turn prompts into a stored,
/// displayed conversation.
///
/// Submissions are independent: several can be in flight at once and
/// each one updates the transcript and the store whenever it
/// resolves, so entries from overlapping submissions can land in any
/// order.
///
/// Use `ChatSession::builder()` to construct one.
pub struct ChatSession {
    keys: Arc<KeyStore>,
    auth: Arc<AuthGate>,
    completer: BoxedCompleter,
    store: BoxedSessionStore,
    options: CompletionOptions,
    history_limit: usize,
    status_ttl: Duration,
    state: Arc<Mutex<SessionState>>,
    submissions: AtomicU64,
}

impl ChatSession {
    pub fn builder(completer: BoxedCompleter, store: BoxedSessionStore) -> ChatSessionBuilder {
        ChatSessionBuilder::new(completer, store)
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("Unable to lock session state")
    }

    fn trace_state(submission: u64, state: SubmissionState) {
        tracing::debug!(submission, ?state, "Submission state changed");
    }

    pub fn keys(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    pub fn auth(&self) -> &Arc<AuthGate> {
        &self.auth
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.lock().transcript.entries().to_vec()
    }

    pub fn saved(&self) -> Vec<ConversationRecord> {
        self.lock().saved.clone()
    }

    fn is_current(&self, identity_id: &str) -> bool {
        self.auth
            .current_identity()
            .is_some_and(|identity| identity.id == identity_id)
    }

    /// Remove status entry `id` once `ttl` has passed.
    fn dismiss_after(&self, id: EntryId, ttl: Duration) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            state
                .lock()
                .expect("Unable to lock session state")
                .transcript
                .remove(id);
        });
    }

    /// Show a transient status entry.
    fn notify(&self, kind: StatusKind, text: &str) -> EntryId {
        let id = self.lock().transcript.push_status(kind, text);
        let ttl = match kind {
            StatusKind::Error => self.status_ttl,
            _ => NOTICE_TTL,
        };
        self.dismiss_after(id, ttl);
        id
    }

    fn validate(&self, prompt: &str) -> Result<(String, String, Identity), SubmitError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SubmitError::EmptyPrompt);
        }
        let api_key = self.keys.get().ok_or(SubmitError::MissingApiKey)?;
        let identity = self
            .auth
            .current_identity()
            .ok_or(SubmitError::AuthRequired)?;
        Ok((prompt.to_string(), api_key, identity))
    }

    /// Send `prompt` and record the exchange.
    ///
    /// Returns `Err` only when the prompt was rejected up front, in
    /// which case nothing was sent. Remote failures are shown in the
    /// transcript and reported as `Settled::Failed`.
    pub async fn submit(&self, prompt: &str) -> Result<Settled, SubmitError> {
        let submission = self.submissions.fetch_add(1, Ordering::Relaxed) + 1;
        Self::trace_state(submission, SubmissionState::Validating);

        let (prompt, api_key, identity) = match self.validate(prompt) {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::debug!("Rejected prompt: {}", err);
                self.notify(StatusKind::Error, &err.to_string());
                Self::trace_state(submission, SubmissionState::Idle);
                return Err(err);
            }
        };

        let pending = {
            let mut state = self.lock();
            state.transcript.push_user(&prompt);
            state.transcript.emit(TranscriptEvent::InputCleared);
            state
                .transcript
                .push_status(StatusKind::Pending, PENDING_MESSAGE)
        };
        Self::trace_state(submission, SubmissionState::AwaitingCompletion);

        let result = self
            .completer
            .complete(&prompt, &api_key, &self.options)
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                tracing::error!("Error calling OpenAI: {}", err);
                let updated = self.lock().transcript.update_status(
                    pending,
                    StatusKind::Error,
                    &format!("Error: {}", err),
                );
                if updated {
                    self.dismiss_after(pending, self.status_ttl);
                }
                Self::trace_state(submission, SubmissionState::Settled);
                return Ok(Settled::Failed(err));
            }
        };

        // A sign out while waiting already cleared the transcript
        if self.is_current(&identity.id) {
            let mut state = self.lock();
            state.transcript.push_assistant(&response);
            state.transcript.remove(pending);
        }
        Self::trace_state(submission, SubmissionState::Persisting);

        let record_id = match self.store.append(&identity.id, &prompt, &response).await {
            Ok(id) => {
                self.reload_saved(&identity.id).await;
                Some(id)
            }
            Err(err) => {
                tracing::error!("Error saving conversation: {}", err);
                if self.is_current(&identity.id) {
                    self.notify(StatusKind::Error, SAVE_FAILED_MESSAGE);
                }
                None
            }
        };
        Self::trace_state(submission, SubmissionState::Settled);

        Ok(Settled::Success {
            response,
            record_id,
        })
    }

    /// Refresh the saved prompts list for `identity_id`. Errors leave
    /// an empty list and a message for the UI.
    pub async fn reload_saved(&self, identity_id: &str) {
        let result = self.store.list_recent(identity_id, self.history_limit).await;
        if !self.is_current(identity_id) {
            return;
        }
        let mut state = self.lock();
        match result {
            Ok(records) => {
                state.saved = records.clone();
                state.transcript.emit(TranscriptEvent::SavedLoaded(records));
            }
            Err(err) => {
                tracing::error!("Error loading prompts: {}", err);
                state.saved.clear();
                state
                    .transcript
                    .emit(TranscriptEvent::SavedFailed(format!("Error loading prompts: {}", err)));
            }
        }
    }

    /// React to a sign in or sign out.
    pub async fn on_identity_change(&self, identity: Option<Identity>) {
        match identity {
            Some(identity) => {
                if let Err(err) = self.store.touch_user(&identity).await {
                    tracing::error!("Error saving user data: {}", err);
                }
                self.reload_saved(&identity.id).await;
            }
            None => {
                let mut state = self.lock();
                state.transcript.clear();
                state.saved.clear();
                state.transcript.emit(TranscriptEvent::SavedLoaded(Vec::new()));
            }
        }
    }

    /// Keep this session in step with the auth gate. The current state
    /// is applied right away.
    pub fn follow_auth(self: &Arc<Self>) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Option<Identity>>();
        self.auth.on_change(move |identity| {
            let _ = tx.send(identity.cloned());
        });

        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(identity) = rx.recv().await {
                session.on_identity_change(identity).await;
            }
        })
    }

    /// Validate and store a key typed in by the user.
    pub fn set_api_key(&self, candidate: &str) -> Result<(), KeyError> {
        match self.keys.set(candidate.trim()) {
            Ok(()) => {
                tracing::info!("API key saved for this session");
                self.notify(StatusKind::Success, KEY_SAVED_MESSAGE);
                Ok(())
            }
            Err(err) => {
                self.notify(StatusKind::Error, KEY_INVALID_MESSAGE);
                Err(err)
            }
        }
    }

    pub fn clear_api_key(&self) {
        self.keys.clear();
        self.notify(StatusKind::Success, KEY_REMOVED_MESSAGE);
    }

    /// Ask the completion service whether the stored key works.
    pub async fn verify_api_key(&self) -> bool {
        match self.keys.get() {
            Some(key) => self.completer.verify(&key).await,
            None => false,
        }
    }

    /// Put a saved exchange back into the transcript.
    pub fn replay(&self, record_id: &str) -> bool {
        let mut state = self.lock();
        let Some(record) = state.saved.iter().find(|r| r.id == record_id).cloned() else {
            return false;
        };
        state.transcript.push_user(&record.prompt);
        state.transcript.push_assistant(&record.response);
        true
    }
}

pub struct ChatSessionBuilder {
    keys: Arc<KeyStore>,
    auth: Arc<AuthGate>,
    completer: BoxedCompleter,
    store: BoxedSessionStore,
    options: CompletionOptions,
    history_limit: usize,
    status_ttl: Duration,
    tx: Option<mpsc::UnboundedSender<TranscriptEvent>>,
}

impl ChatSessionBuilder {
    pub fn new(completer: BoxedCompleter, store: BoxedSessionStore) -> Self {
        Self {
            keys: Arc::new(KeyStore::new()),
            auth: Arc::new(AuthGate::new()),
            completer,
            store,
            options: CompletionOptions::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            status_ttl: DEFAULT_STATUS_TTL,
            tx: None,
        }
    }

    pub fn keys(mut self, keys: Arc<KeyStore>) -> Self {
        self.keys = keys;
        self
    }

    pub fn auth(mut self, auth: Arc<AuthGate>) -> Self {
        self.auth = auth;
        self
    }

    pub fn options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn status_ttl(mut self, ttl: Duration) -> Self {
        self.status_ttl = ttl;
        self
    }

    pub fn events(mut self, transmitter: mpsc::UnboundedSender<TranscriptEvent>) -> Self {
        self.tx = Some(transmitter);
        self
    }

    pub fn build(self) -> ChatSession {
        let transcript = match self.tx {
            Some(tx) => Transcript::with_events(tx),
            None => Transcript::new(),
        };
        ChatSession {
            keys: self.keys,
            auth: self.auth,
            completer: self.completer,
            store: self.store,
            options: self.options,
            history_limit: self.history_limit,
            status_ttl: self.status_ttl,
            state: Arc::new(Mutex::new(SessionState {
                transcript,
                saved: Vec::new(),
            })),
            submissions: AtomicU64::new(0),
        }
    }
}
