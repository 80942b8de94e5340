use thiserror::Error;

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Failure of a single network fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Bad status {status}: {body}")]
    Status { status: u16, body: String },
}

impl FetchError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body);
        FetchError::Status {
            status,
            body: Self::truncate_body(&body),
        }
    }

    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        FetchError::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failure reading or writing a cache store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Cache lock poisoned: {0}")]
    Poisoned(String),

    #[error("Only GET requests can be cached, got {0}")]
    NotCacheable(String),

    #[error("Invalid cache name {0:?}: path separators are not allowed")]
    InvalidName(String),
}

/// Precache population failure, the only way installation can fail.
#[derive(Error, Debug)]
pub enum PrecacheError {
    #[error("Failed to precache {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Invalid precache asset {path}: {source}")]
    InvalidAsset {
        path: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to store precached response: {source}")]
    Storage {
        #[from]
        source: StoreError,
    },
}

/// Failure reported to callers of a running worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Install(#[from] PrecacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Worker has stopped")]
    Stopped,
}
