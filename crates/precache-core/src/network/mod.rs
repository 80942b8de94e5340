//! Network capability used on cache misses and during precache.
//!
//! `Fetcher` is the seam between the interceptor and the network. The
//! production implementation is `HttpFetcher` (reqwest); tests substitute a
//! scripted fetcher that counts calls.

pub mod client;
#[cfg(test)]
pub(crate) mod mock;

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::FetchError;
use crate::models::{Request, Response};

pub use client::HttpFetcher;

pub trait Fetcher: Send + Sync + 'static {
    /// Perform `request` against the network.
    ///
    /// Any HTTP status is a successful fetch; only failing to obtain a
    /// response at all is an error.
    fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>>;
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>> {
        (**self).fetch(request)
    }
}
