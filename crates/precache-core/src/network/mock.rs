//! Scripted fetcher for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};

use super::Fetcher;
use crate::error::FetchError;
use crate::models::{Request, Response};

#[derive(Clone)]
enum Outcome {
    Respond(Response),
    Fail,
    Flaky { failures: usize, response: Response },
}

/// Serves canned responses by URL path and records every call.
/// Unknown paths get a 404 response.
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, Outcome>>,
    calls: Mutex<Vec<String>>,
    count: AtomicUsize,
    delay: Option<Duration>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(self, path: &str, response: Response) -> Self {
        self.set(path, Outcome::Respond(response));
        self
    }

    /// Every fetch of `path` fails with a transport error.
    pub fn fail(self, path: &str) -> Self {
        self.set(path, Outcome::Fail);
        self
    }

    /// Fail the first `failures` fetches of `path`, then serve `response`.
    pub fn flaky(self, path: &str, failures: usize, response: Response) -> Self {
        self.set(path, Outcome::Flaky { failures, response });
        self
    }

    /// Change a route after the fetcher has been shared.
    pub fn set_response(&self, path: &str, response: Response) {
        self.set(path, Outcome::Respond(response));
    }

    fn set(&self, path: &str, outcome: Outcome) {
        self.routes.lock().unwrap().insert(path.to_string(), outcome);
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>> {
        async move {
            self.count.fetch_add(1, Ordering::SeqCst);
            let path = request.url.path().to_string();
            self.calls.lock().unwrap().push(path.clone());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(&path) {
                Some(Outcome::Respond(response)) => Ok(response.clone()),
                Some(Outcome::Fail) => Err(transport_error()),
                Some(Outcome::Flaky { failures, response }) => {
                    if *failures > 0 {
                        *failures -= 1;
                        Err(transport_error())
                    } else {
                        Ok(response.clone())
                    }
                }
                None => Ok(Response::new(404, "not found")),
            }
        }
        .boxed()
    }
}

/// A genuine `reqwest::Error`, produced by a request that can never be built.
fn transport_error() -> FetchError {
    let err = reqwest::Client::new()
        .get("not a url")
        .build()
        .unwrap_err();
    FetchError::Network(err)
}
