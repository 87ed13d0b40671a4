//! Session scoped storage for the completion API key.
//!
//! The key lives in process memory only. It is not encrypted and is
//! gone when the process exits.
use std::sync::RwLock;

use thiserror::Error;

pub const API_KEY_PREFIX: &str = "sk-";
pub const API_KEY_MIN_LEN: usize = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("API key is empty")]
    Empty,
    #[error("API key must start with \"sk-\"")]
    WrongPrefix,
    #[error("API key must be at least 30 characters")]
    TooShort,
}

/// Format check only, the remote service is never consulted.
pub fn validate_api_key_format(candidate: &str) -> Result<(), KeyError> {
    if candidate.is_empty() {
        return Err(KeyError::Empty);
    }
    if !candidate.starts_with(API_KEY_PREFIX) {
        return Err(KeyError::WrongPrefix);
    }
    if candidate.len() < API_KEY_MIN_LEN {
        return Err(KeyError::TooShort);
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct KeyStore(RwLock<Option<String>>);

impl KeyStore {
    pub fn new() -> Self {
        Self(RwLock::new(None))
    }

    /// Store `candidate` as the current key. Last write wins.
    pub fn set(&self, candidate: &str) -> Result<(), KeyError> {
        validate_api_key_format(candidate)?;
        let mut slot = self.0.write().expect("Unable to write key store");
        *slot = Some(candidate.to_string());
        Ok(())
    }

    pub fn get(&self) -> Option<String> {
        self.0.read().expect("Unable to read key store").clone()
    }

    pub fn clear(&self) {
        let mut slot = self.0.write().expect("Unable to write key store");
        *slot = None;
    }

    pub fn is_set(&self) -> bool {
        self.0.read().expect("Unable to read key store").is_some()
    }

    /// Display form of the stored key that keeps the prefix and the
    /// last four characters.
    pub fn masked(&self) -> Option<String> {
        self.get().map(|key| {
            let tail: String = key
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("{}{}{}", API_KEY_PREFIX, "•".repeat(8), tail)
        })
    }
}
