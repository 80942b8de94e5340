//! precache - an offline cache interceptor.
//!
//! On install, a fixed list of static assets is fetched and stored in a named
//! cache. Afterwards every intercepted request is answered from cache storage
//! when possible and forwarded to the network otherwise.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use precache_core::{CacheStorage, HttpFetcher, InstallPolicy, OfflineInterceptor, Url, Worker};
//!
//! let storage = CacheStorage::disk("/tmp/precache")?;
//! let origin: Url = "http://localhost:8000".parse()?;
//! let interceptor = OfflineInterceptor::new(storage, HttpFetcher::default(), origin);
//! let worker = Worker::spawn(interceptor, InstallPolicy::default());
//! worker.install().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod manifest;
pub mod models;
pub mod network;
pub mod worker;

pub use cache::{CacheStorage, CacheStore, CachedData, StoredEntry};
pub use config::Config;
pub use error::{FetchError, PrecacheError, StoreError, WorkerError};
pub use interceptor::{InstallReport, OfflineInterceptor, Served, Source};
pub use manifest::{PrecacheManifest, CACHE_NAME, PRECACHE_ASSETS};
pub use models::{Request, RequestKey, Response};
pub use network::{Fetcher, HttpFetcher};
pub use worker::{InstallPolicy, Worker, WorkerHandle, WorkerState};
pub use reqwest::{Method, Url};
