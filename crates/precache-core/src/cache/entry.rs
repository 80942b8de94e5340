use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{RequestKey, Response};

/// A stored value together with the time it was written.
/// The timestamp is informational only; nothing expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Negative ages come from clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            // Round to the nearest hour
            format!("{}h ago", (minutes + 30) / 60)
        } else {
            // Round to the nearest day
            format!("{}d ago", (minutes + 720) / 1440)
        }
    }
}

/// One cached request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub key: RequestKey,
    pub response: CachedData<Response>,
}

/// Insertion-ordered entry list shared by the store implementations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Entries {
    #[serde(default)]
    pub entries: Vec<StoredEntry>,
}

impl Entries {
    pub fn get(&self, key: &RequestKey) -> Option<&CachedData<Response>> {
        self.entries
            .iter()
            .find(|e| &e.key == key)
            .map(|e| &e.response)
    }

    /// Replace in place if the key exists, otherwise append.
    pub fn put(&mut self, key: RequestKey, response: Response) {
        let response = CachedData::new(response);
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(existing) => existing.response = response,
            None => self.entries.push(StoredEntry { key, response }),
        }
    }
}
