//! The offline cache interceptor: precache on install, cache-first on fetch.

use futures::future::try_join_all;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::cache::CacheStorage;
use crate::error::{FetchError, PrecacheError};
use crate::manifest::PrecacheManifest;
use crate::models::{Request, RequestKey, Response};
use crate::network::Fetcher;

/// Where a fetch event's response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
}

#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: Source,
}

/// Outcome of a successful install.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub cache_name: String,
    /// Keys written, in manifest order.
    pub keys: Vec<RequestKey>,
}

pub struct OfflineInterceptor<F: Fetcher> {
    storage: CacheStorage,
    fetcher: F,
    manifest: PrecacheManifest,
    origin: Url,
}

impl<F: Fetcher> OfflineInterceptor<F> {
    /// Interceptor for the default manifest.
    pub fn new(storage: CacheStorage, fetcher: F, origin: Url) -> Self {
        Self::with_manifest(storage, fetcher, origin, PrecacheManifest::default())
    }

    pub fn with_manifest(
        storage: CacheStorage,
        fetcher: F,
        origin: Url,
        manifest: PrecacheManifest,
    ) -> Self {
        Self {
            storage,
            fetcher,
            manifest,
            origin,
        }
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn manifest(&self) -> &PrecacheManifest {
        &self.manifest
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Open the manifest's cache and fill it with every asset.
    ///
    /// All assets are fetched concurrently. Any transport failure or non-2xx
    /// status fails the whole install and nothing further is written. The
    /// error is returned as-is for the host to handle.
    ///
    /// Suspension points: cache open, network fetch, cache write.
    pub async fn install(&self) -> Result<InstallReport, PrecacheError> {
        let cache_name = &self.manifest.cache_name;
        info!(cache = %cache_name, assets = self.manifest.assets.len(), "Installing precache");

        let cache = self.storage.open(cache_name)?;
        let requests: Vec<Request> = self
            .manifest
            .resolve(&self.origin)?
            .into_iter()
            .map(Request::get)
            .collect();

        let fetched = try_join_all(requests.iter().map(|request| self.precache_one(request))).await?;

        let mut keys = Vec::with_capacity(fetched.len());
        for (key, response) in fetched {
            cache.put(key.clone(), response)?;
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        info!(cache = %cache_name, stored = keys.len(), "Precache complete");
        Ok(InstallReport {
            cache_name: cache_name.clone(),
            keys,
        })
    }

    async fn precache_one(&self, request: &Request) -> Result<(RequestKey, Response), PrecacheError> {
        let url = request.url.to_string();
        let response = self
            .fetcher
            .fetch(request)
            .await
            .map_err(|source| PrecacheError::Fetch {
                url: url.clone(),
                source,
            })?;

        if !response.is_success() {
            return Err(PrecacheError::Fetch {
                url,
                source: FetchError::from_status(response.status, &response.body),
            });
        }
        Ok((request.key(), response))
    }

    /// Cache-first lookup with network fallback.
    ///
    /// A hit never touches the network. A miss forwards the request once,
    /// unmodified, and does not store the result.
    ///
    /// Suspension points: cache match, network fetch.
    pub async fn respond(&self, request: &Request) -> Result<Served, FetchError> {
        match self.storage.match_request(request) {
            Ok(Some(hit)) => {
                debug!(url = %request.url, cached = %hit.age_display(), "Cache hit");
                return Ok(Served {
                    response: hit.data,
                    source: Source::Cache,
                });
            }
            Ok(None) => debug!(method = %request.method, url = %request.url, "Cache miss"),
            // Unreadable storage behaves like an empty cache
            Err(e) => warn!(url = %request.url, error = %e, "Cache lookup failed"),
        }

        let response = self.fetcher.fetch(request).await?;
        Ok(Served {
            response,
            source: Source::Network,
        })
    }

    /// Fetch handler: the response for `request`, wherever it came from.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.respond(request).await.map(|served| served.response)
    }
}
