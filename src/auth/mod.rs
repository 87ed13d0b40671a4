//! Tracks who is signed in and tells listeners when that changes.
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: &str, display_name: Option<&str>, email: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.map(String::from),
            email: email.map(String::from),
        }
    }

    /// Name to show in the UI
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("User")
    }
}

pub type AuthCallback = Arc<dyn Fn(Option<&Identity>) + Send + Sync>;

#[derive(Default)]
pub struct AuthGate {
    current: RwLock<Option<Identity>>,
    listeners: RwLock<Vec<AuthCallback>>,
}

impl AuthGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.current.read().expect("Unable to read auth state").clone()
    }

    /// Register `callback`. It runs right away with the current state
    /// and then on every sign in and sign out, in registration order.
    /// Callbacks run outside of any lock and may register others.
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(Option<&Identity>) + Send + Sync + 'static,
    {
        let callback: AuthCallback = Arc::new(callback);
        // Registered and snapshotted together so a concurrent change
        // is either in the snapshot or delivered by `notify`
        let current = {
            let mut listeners = self.listeners.write().expect("Unable to write auth listeners");
            listeners.push(Arc::clone(&callback));
            self.current_identity()
        };
        callback(current.as_ref());
    }

    pub fn sign_in(&self, identity: Identity) {
        tracing::info!("User is signed in: {}", identity.id);
        {
            let mut current = self.current.write().expect("Unable to write auth state");
            *current = Some(identity);
        }
        self.notify();
    }

    pub fn sign_out(&self) {
        let previous = {
            let mut current = self.current.write().expect("Unable to write auth state");
            current.take()
        };
        if previous.is_none() {
            return;
        }
        tracing::info!("User is signed out");
        self.notify();
    }

    fn notify(&self) {
        let (current, listeners) = {
            let listeners = self.listeners.read().expect("Unable to read auth listeners");
            (self.current_identity(), listeners.clone())
        };
        for listener in listeners.iter() {
            listener(current.as_ref());
        }
    }
}
