//! Pending confirmation state, one entry per user.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One vocabulary entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    #[serde(rename = "enUS", alias = "source_word")]
    pub source_word: String,
    #[serde(rename = "zhTW", alias = "translation")]
    pub translation: String,
}

impl Word {
    pub fn new(source_word: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            source_word: source_word.into(),
            translation: translation.into(),
        }
    }
}

/// Word list waiting for the user's confirm/cancel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub user_id: String,
    pub word_list: Vec<Word>,
    pub created_at: DateTime<Utc>,
}

impl PendingAction {
    pub fn new(user_id: impl Into<String>, word_list: Vec<Word>, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            word_list,
            created_at,
        }
    }
}

/// Validates a word list before it may back a pending action
pub fn validate_word_list(words: Vec<Word>) -> Result<Vec<Word>, &'static str> {
    if words.is_empty() {
        return Err("empty");
    }

    words
        .into_iter()
        .map(|word| {
            let source_word = word.source_word.trim();
            let translation = word.translation.trim();
            if source_word.is_empty() || translation.is_empty() {
                Err("blank_entry")
            } else {
                Ok(Word::new(source_word, translation))
            }
        })
        .collect()
}

/// In-memory store of pending actions keyed by user id
///
/// Every read-modify-write goes through the internal mutex, which is never
/// held across an await point. Resolution uses [`SessionStore::take`], so a
/// postback and the expiry sweep can never both remove the same entry.
#[derive(Debug)]
pub struct SessionStore {
    entries: Mutex<HashMap<String, PendingAction>>,
    expiry: Duration,
}

impl SessionStore {
    pub fn new(expiry: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            expiry,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingAction>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a pending action, replacing the user's previous one
    pub fn insert(&self, pending: PendingAction) -> Option<PendingAction> {
        self.lock().insert(pending.user_id.clone(), pending)
    }

    pub fn get(&self, user_id: &str) -> Option<PendingAction> {
        self.lock().get(user_id).cloned()
    }

    /// Remove and return the user's pending action
    pub fn take(&self, user_id: &str) -> Option<PendingAction> {
        self.lock().remove(user_id)
    }

    /// Remove the user's pending action; absent keys are a no-op
    pub fn remove(&self, user_id: &str) -> bool {
        self.lock().remove(user_id).is_some()
    }

    /// Remove every action older than the expiry, returning the affected users
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut entries = self.lock();
        let expired: Vec<String> = entries
            .values()
            .filter(|pending| is_expired(pending, now, self.expiry))
            .map(|pending| pending.user_id.clone())
            .collect();

        for user_id in &expired {
            entries.remove(user_id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Strictly older than `expiry`; timestamps in the future never expire
fn is_expired(pending: &PendingAction, now: DateTime<Utc>, expiry: Duration) -> bool {
    now.signed_duration_since(pending.created_at)
        .to_std()
        .map(|age| age > expiry)
        .unwrap_or(false)
}
