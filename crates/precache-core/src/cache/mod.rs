//! Cache storage for precached responses.
//!
//! `CacheStorage` is the process-wide handle to every named cache. Each cache
//! is a `CacheStore` mapping a `RequestKey` (method + URL) to a stored
//! `Response`. Two backends exist:
//! - `MemoryStore`: lives for the life of the process
//! - `DiskStore`: one JSON file per cache under the storage root
//!
//! Entries are only ever inserted. There is no eviction, expiry or quota.

pub mod entry;
pub mod storage;
pub mod store;

pub use entry::{CachedData, StoredEntry};
pub use storage::CacheStorage;
pub use store::{CacheStore, DiskStore, MemoryStore};
