use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use super::entry::{CachedData, Entries, StoredEntry};
use crate::error::StoreError;
use crate::models::{RequestKey, Response};

/// A single named cache: request key to stored response.
///
/// Implementations serialize writers so that every `put` is atomic per entry.
/// Nothing in this crate ever removes an entry.
pub trait CacheStore: Send + Sync {
    fn name(&self) -> &str;

    /// Look up a stored response. Non-GET keys never match.
    fn match_request(&self, key: &RequestKey) -> Result<Option<CachedData<Response>>, StoreError>;

    /// Insert or replace the response for `key`. Non-GET keys are rejected.
    fn put(&self, key: RequestKey, response: Response) -> Result<(), StoreError>;

    /// All entries in insertion order.
    fn entries(&self) -> Result<Vec<StoredEntry>, StoreError>;

    fn keys(&self) -> Result<Vec<RequestKey>, StoreError> {
        Ok(self.entries()?.into_iter().map(|e| e.key).collect())
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Poisoned(e.to_string())
}

fn check_cacheable(key: &RequestKey) -> Result<(), StoreError> {
    if key.is_cacheable() {
        Ok(())
    } else {
        Err(StoreError::NotCacheable(key.method.clone()))
    }
}

// ============================================================================
// In-memory store
// ============================================================================

pub struct MemoryStore {
    name: String,
    entries: RwLock<Entries>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(Entries::default()),
        }
    }
}

impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn match_request(&self, key: &RequestKey) -> Result<Option<CachedData<Response>>, StoreError> {
        if !key.is_cacheable() {
            return Ok(None);
        }
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: RequestKey, response: Response) -> Result<(), StoreError> {
        check_cacheable(&key)?;
        self.entries.write().map_err(poisoned)?.put(key, response);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<StoredEntry>, StoreError> {
        Ok(self.entries.read().map_err(poisoned)?.entries.clone())
    }
}

// ============================================================================
// On-disk store
// ============================================================================

/// One JSON document per cache at `<root>/<name>.json`.
///
/// The document is loaded once on open and rewritten whole on every `put`
/// while the write lock is held.
pub struct DiskStore {
    name: String,
    path: PathBuf,
    entries: RwLock<Entries>,
}

impl DiskStore {
    /// Open the cache file, creating an empty one if absent.
    pub fn open(root: &Path, name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        check_name(&name)?;
        std::fs::create_dir_all(root)?;
        let path = root.join(format!("{}.json", name));

        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str::<Entries>(&contents)?
        } else {
            let empty = Entries::default();
            write_atomic(&path, &empty)?;
            empty
        };

        debug!(cache = %name, path = %path.display(), "Opened disk cache");
        Ok(Self {
            name,
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for DiskStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn match_request(&self, key: &RequestKey) -> Result<Option<CachedData<Response>>, StoreError> {
        if !key.is_cacheable() {
            return Ok(None);
        }
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: RequestKey, response: Response) -> Result<(), StoreError> {
        check_cacheable(&key)?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        let mut updated = entries.clone();
        updated.put(key, response);
        write_atomic(&self.path, &updated)?;
        *entries = updated;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<StoredEntry>, StoreError> {
        Ok(self.entries.read().map_err(poisoned)?.entries.clone())
    }
}

/// Write to a `<path>.tmp` sibling and rename it over `path`. Readers see
/// either the old document or the new one, never a partial write.
fn write_atomic(path: &Path, entries: &Entries) -> Result<(), StoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Cache names become file names, so they may not contain path separators.
pub(crate) fn check_name(name: &str) -> Result<(), StoreError> {
    if name.contains(['/', '\\']) {
        Err(StoreError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}
