//! The fixed precache manifest: cache name and asset list.
//!
//! There is no runtime override for either value. Changing the list between
//! deployments leaves old entries in place under the same cache name.

use reqwest::Url;

use crate::error::{FetchError, PrecacheError};

/// Name of the cache store populated at install time.
pub const CACHE_NAME: &str = "elmquotes";

/// Root-relative assets fetched and stored at install time, in order.
pub const PRECACHE_ASSETS: &[&str] = &["/", "/elm.js", "/assets/images/dwyl.png"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheManifest {
    pub cache_name: String,
    pub assets: Vec<String>,
}

impl Default for PrecacheManifest {
    fn default() -> Self {
        Self::new(CACHE_NAME, PRECACHE_ASSETS.iter().copied())
    }
}

impl PrecacheManifest {
    pub fn new<I, S>(cache_name: impl Into<String>, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cache_name: cache_name.into(),
            assets: assets.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolve every asset against `origin`, keeping list order.
    /// Fails on the first path that is not a valid URL reference.
    pub fn resolve(&self, origin: &Url) -> Result<Vec<Url>, PrecacheError> {
        self.assets
            .iter()
            .map(|path| {
                origin.join(path).map_err(|e| PrecacheError::InvalidAsset {
                    path: path.clone(),
                    source: FetchError::invalid_url(path.as_str(), e),
                })
            })
            .collect()
    }
}
