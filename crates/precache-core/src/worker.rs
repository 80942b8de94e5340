//! Host-side event dispatch for the interceptor.
//!
//! A `Worker` owns the interceptor and receives `WorkerEvent`s over an mpsc
//! channel, replying to each through a oneshot channel. Every fetch event
//! runs in its own task so requests interleave freely. Install events are
//! serialized and retried with exponential backoff according to the
//! `InstallPolicy`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{FetchError, PrecacheError, WorkerError};
use crate::interceptor::{InstallReport, OfflineInterceptor, Served};
use crate::models::Request;
use crate::network::Fetcher;

/// Buffer size for the worker event channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Default number of install attempts before giving up.
pub const DEFAULT_INSTALL_ATTEMPTS: u32 = 3;

/// Default delay before the first install retry, doubled on each retry.
pub const DEFAULT_INSTALL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawned, never installed
    Parsed,
    Installing,
    Installed,
    /// Install failed on every attempt
    Redundant,
}

/// How the host retries a failed install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for InstallPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_INSTALL_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INSTALL_BACKOFF_MS),
        }
    }
}

pub enum WorkerEvent {
    Install {
        reply: oneshot::Sender<Result<InstallReport, PrecacheError>>,
    },
    Fetch {
        request: Request,
        reply: oneshot::Sender<Result<Served, FetchError>>,
    },
}

pub struct Worker;

impl Worker {
    /// Start the dispatcher task. It runs until every handle is dropped.
    pub fn spawn<F: Fetcher>(interceptor: OfflineInterceptor<F>, policy: InstallPolicy) -> WorkerHandle {
        let (tx, mut rx) = mpsc::channel::<WorkerEvent>(CHANNEL_BUFFER_SIZE);
        let (state_tx, state_rx) = watch::channel(WorkerState::Parsed);

        let interceptor = Arc::new(interceptor);
        let state_tx = Arc::new(state_tx);
        let policy = Arc::new(policy);
        let install_lock = Arc::new(Mutex::new(()));

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    WorkerEvent::Install { reply } => {
                        let interceptor = Arc::clone(&interceptor);
                        let state_tx = Arc::clone(&state_tx);
                        let policy = Arc::clone(&policy);
                        let install_lock = Arc::clone(&install_lock);
                        tokio::spawn(async move {
                            let _guard = install_lock.lock().await;
                            let result = Self::run_install(&interceptor, &policy, &state_tx).await;
                            if reply.send(result).is_err() {
                                debug!("Install requester went away before completion");
                            }
                        });
                    }
                    WorkerEvent::Fetch { request, reply } => {
                        let interceptor = Arc::clone(&interceptor);
                        tokio::spawn(Self::run_fetch(interceptor, request, reply));
                    }
                }
            }
            debug!("Worker event channel closed");
        });

        WorkerHandle { tx, state: state_rx }
    }

    async fn run_install<F: Fetcher>(
        interceptor: &OfflineInterceptor<F>,
        policy: &InstallPolicy,
        state: &watch::Sender<WorkerState>,
    ) -> Result<InstallReport, PrecacheError> {
        state.send_replace(WorkerState::Installing);

        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;
        let mut backoff = policy.initial_backoff;

        loop {
            match interceptor.install().await {
                Ok(report) => {
                    state.send_replace(WorkerState::Installed);
                    info!(cache = %report.cache_name, attempt, "Worker installed");
                    return Ok(report);
                }
                Err(e) if attempt < max_attempts => {
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Install failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempts = attempt, error = %e, "Install failed, worker is redundant");
                    state.send_replace(WorkerState::Redundant);
                    return Err(e);
                }
            }
        }
    }

    /// Answer one fetch event. If the requester drops its receiver the
    /// in-flight lookup or network call is abandoned.
    async fn run_fetch<F: Fetcher>(
        interceptor: Arc<OfflineInterceptor<F>>,
        request: Request,
        mut reply: oneshot::Sender<Result<Served, FetchError>>,
    ) {
        let result = tokio::select! {
            result = interceptor.respond(&request) => Some(result),
            _ = reply.closed() => None,
        };

        match result {
            Some(result) => {
                let _ = reply.send(result);
            }
            None => debug!(url = %request.url, "Fetch abandoned by requester"),
        }
    }
}

/// Registration handle for a running worker.
/// Clone is cheap; all clones talk to the same dispatcher.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerEvent>,
    state: watch::Receiver<WorkerState>,
}

impl WorkerHandle {
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Dispatch an install event and wait until population finishes,
    /// including any retries.
    pub async fn install(&self) -> Result<InstallReport, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WorkerEvent::Install { reply })
            .await
            .map_err(|_| WorkerError::Stopped)?;
        Ok(rx.await.map_err(|_| WorkerError::Stopped)??)
    }

    /// Dispatch a fetch event. Dropping the returned future cancels it.
    pub async fn fetch(&self, request: Request) -> Result<Served, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WorkerEvent::Fetch { request, reply })
            .await
            .map_err(|_| WorkerError::Stopped)?;
        Ok(rx.await.map_err(|_| WorkerError::Stopped)??)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{Method, Url};

    use super::*;
    use crate::cache::CacheStorage;
    use crate::interceptor::Source;
    use crate::models::Response;
    use crate::network::mock::MockFetcher;

    const ORIGIN: &str = "http://localhost:8000";

    fn fast_policy(max_attempts: u32) -> InstallPolicy {
        InstallPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(5),
        }
    }

    fn assets() -> MockFetcher {
        MockFetcher::new()
            .respond("/", Response::ok("<html></html>"))
            .respond("/elm.js", Response::ok("var Elm = {};"))
            .respond("/assets/images/dwyl.png", Response::ok(vec![1, 2, 3]))
            .respond("/other.js", Response::ok("other"))
    }

    fn spawn(fetcher: Arc<MockFetcher>, policy: InstallPolicy) -> WorkerHandle {
        let interceptor =
            OfflineInterceptor::new(CacheStorage::memory(), fetcher, Url::parse(ORIGIN).unwrap());
        Worker::spawn(interceptor, policy)
    }

    fn get(path: &str) -> Request {
        Request::resolve(Method::GET, &Url::parse(ORIGIN).unwrap(), path).unwrap()
    }

    #[tokio::test]
    async fn test_install_then_serve_from_cache() {
        let fetcher = Arc::new(assets());
        let worker = spawn(Arc::clone(&fetcher), fast_policy(1));
        assert_eq!(worker.state(), WorkerState::Parsed);

        let report = worker.install().await.unwrap();
        assert_eq!(report.keys.len(), 3);
        assert_eq!(worker.state(), WorkerState::Installed);

        let calls = fetcher.call_count();
        let served = worker.fetch(get("/elm.js")).await.unwrap();
        assert_eq!(served.source, Source::Cache);
        assert_eq!(fetcher.call_count(), calls);

        let served = worker.fetch(get("/other.js")).await.unwrap();
        assert_eq!(served.source, Source::Network);
        assert_eq!(fetcher.call_count(), calls + 1);
    }

    #[tokio::test]
    async fn test_install_retries_then_succeeds() {
        let fetcher = Arc::new(assets().flaky("/elm.js", 2, Response::ok("var Elm = {};")));
        let worker = spawn(Arc::clone(&fetcher), fast_policy(3));

        worker.install().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Installed);
        let elm_calls = fetcher.calls().iter().filter(|p| *p == "/elm.js").count();
        assert_eq!(elm_calls, 3);
    }

    #[tokio::test]
    async fn test_install_gives_up_and_goes_redundant() {
        let fetcher = Arc::new(assets().fail("/elm.js"));
        let worker = spawn(Arc::clone(&fetcher), fast_policy(2));

        let err = worker.install().await.unwrap_err();
        assert!(matches!(err, WorkerError::Install(PrecacheError::Fetch { .. })));
        assert_eq!(worker.state(), WorkerState::Redundant);
        let elm_calls = fetcher.calls().iter().filter(|p| *p == "/elm.js").count();
        assert_eq!(elm_calls, 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let fetcher = Arc::new(assets().fail("/"));
        let worker = spawn(Arc::clone(&fetcher), fast_policy(0));

        assert!(worker.install().await.is_err());
        assert_eq!(fetcher.calls().iter().filter(|p| *p == "/").count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_network_error_reaches_requester() {
        let fetcher = Arc::new(MockFetcher::new().fail("/down"));
        let worker = spawn(fetcher, fast_policy(1));

        let err = worker.fetch(get("/down")).await.unwrap_err();
        assert!(matches!(err, WorkerError::Fetch(FetchError::Network(_))));
    }

    #[tokio::test]
    async fn test_concurrent_fetches_are_independent() {
        let fetcher = Arc::new(assets().with_delay(Duration::from_millis(20)));
        let worker = spawn(Arc::clone(&fetcher), fast_policy(1));

        let requests = (0..8).map(|_| worker.fetch(get("/other.js")));
        let results = futures::future::join_all(requests).await;

        assert!(results.iter().all(|r| r.as_ref().map(|s| s.response.body == b"other").unwrap_or(false)));
        assert_eq!(fetcher.call_count(), 8);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_leaves_worker_running() {
        let fetcher = Arc::new(assets().with_delay(Duration::from_millis(200)));
        let worker = spawn(Arc::clone(&fetcher), fast_policy(1));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), worker.fetch(get("/other.js"))).await;
        assert!(cancelled.is_err());

        let served = worker.fetch(get("/other.js")).await.unwrap();
        assert_eq!(served.response.body, b"other");
    }
}
