use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of the durable cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid cache key {0:?} (allowed: A-Z a-z 0-9 _ . -)")]
    InvalidKey(String),

    #[error("cache entry '{key}' could not be read: {source}")]
    Unreadable {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("cache entry '{key}' is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache entry '{key}' does not match the requested type: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize cache entry '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache backend failure: {0}")]
    Backend(#[source] BoxError),
}

impl From<anyhow::Error> for CacheError {
    fn from(err: anyhow::Error) -> Self {
        Self::Backend(err.into())
    }
}

/// Failures of a remote fetch. Any records accumulated before the failure are discarded.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("GET {url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("max retries exceeded for {url}")]
    RetriesExhausted { url: String },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to sync '{collection}': {source}")]
    Fetch {
        collection: String,
        #[source]
        source: FetchError,
    },

    #[error("server returned no record for '{key}'")]
    EmptyResponse { key: String },

    #[error(transparent)]
    Cache(#[from] CacheError),
}
