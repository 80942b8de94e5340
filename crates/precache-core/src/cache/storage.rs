use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use super::entry::CachedData;
use super::store::{check_name, CacheStore, DiskStore, MemoryStore};
use crate::error::StoreError;
use crate::models::{Request, Response};

#[derive(Debug, Clone)]
enum Backend {
    Memory,
    Disk(PathBuf),
}

struct Inner {
    backend: Backend,
    /// Open caches in creation order.
    caches: RwLock<Vec<Arc<dyn CacheStore>>>,
}

/// Process-scoped handle to all named caches.
///
/// Clone is cheap and every clone sees the same caches. There is no explicit
/// teardown; caches live as long as their backing storage.
#[derive(Clone)]
pub struct CacheStorage {
    inner: Arc<Inner>,
}

impl CacheStorage {
    pub fn memory() -> Self {
        Self::with_backend(Backend::Memory, Vec::new())
    }

    /// Disk-backed storage rooted at `root`. Caches already present on disk are
    /// opened immediately, ordered by name. A cache file that cannot be read
    /// is logged and left out rather than failing the whole storage.
    pub fn disk(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();

        let mut caches: Vec<Arc<dyn CacheStore>> = Vec::with_capacity(names.len());
        for name in names {
            match DiskStore::open(&root, name.as_str()) {
                Ok(store) => caches.push(Arc::new(store)),
                Err(e) => warn!(cache = %name, error = %e, "Skipping unreadable cache"),
            }
        }

        info!(root = %root.display(), caches = caches.len(), "Opened cache storage");
        Ok(Self::with_backend(Backend::Disk(root), caches))
    }

    fn with_backend(backend: Backend, caches: Vec<Arc<dyn CacheStore>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                caches: RwLock::new(caches),
            }),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        match &self.inner.backend {
            Backend::Memory => None,
            Backend::Disk(root) => Some(root),
        }
    }

    /// Open the named cache, creating it if it does not exist yet.
    /// Opening the same name twice returns the same store. Names containing
    /// `/` or `\` are rejected on every backend.
    pub fn open(&self, name: &str) -> Result<Arc<dyn CacheStore>, StoreError> {
        check_name(name)?;
        if let Some(existing) = self.find(name)? {
            return Ok(existing);
        }

        let mut caches = self
            .inner
            .caches
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        // Another opener may have won the race between the two locks
        if let Some(existing) = caches.iter().find(|c| c.name() == name) {
            return Ok(Arc::clone(existing));
        }

        let store: Arc<dyn CacheStore> = match &self.inner.backend {
            Backend::Memory => Arc::new(MemoryStore::new(name)),
            Backend::Disk(root) => Arc::new(DiskStore::open(root, name)?),
        };
        debug!(cache = name, "Created cache");
        caches.push(Arc::clone(&store));
        Ok(store)
    }

    /// Register an externally built store under its own name. If a cache with
    /// that name is already open, the existing one is kept and returned.
    pub fn attach(&self, store: Arc<dyn CacheStore>) -> Result<Arc<dyn CacheStore>, StoreError> {
        let mut caches = self
            .inner
            .caches
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        if let Some(existing) = caches.iter().find(|c| c.name() == store.name()) {
            return Ok(Arc::clone(existing));
        }
        caches.push(Arc::clone(&store));
        Ok(store)
    }

    pub fn has(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.find(name)?.is_some())
    }

    pub fn names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .snapshot()?
            .iter()
            .map(|c| c.name().to_string())
            .collect())
    }

    /// Look `request` up in every cache, oldest first, and return the first hit.
    pub fn match_request(
        &self,
        request: &Request,
    ) -> Result<Option<CachedData<Response>>, StoreError> {
        let key = request.key();
        if !key.is_cacheable() {
            return Ok(None);
        }
        for cache in self.snapshot()? {
            if let Some(hit) = cache.match_request(&key)? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    fn find(&self, name: &str) -> Result<Option<Arc<dyn CacheStore>>, StoreError> {
        let caches = self
            .inner
            .caches
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(caches
            .iter()
            .find(|c| c.name() == name)
            .cloned())
    }

    /// Clone the cache list so lookups run without holding the lock.
    fn snapshot(&self) -> Result<Vec<Arc<dyn CacheStore>>, StoreError> {
        Ok(self
            .inner
            .caches
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?
            .clone())
    }
}
