use async_trait::async_trait;

use crate::error::FetchError;
use crate::record::{Resource, Watermark};

/// First-page request for a paginated fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Path relative to the API base URL, or an absolute URL.
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Sent as `If-Modified-Since` on the first page only.
    pub if_modified_since: Option<Watermark>,
}

impl FetchRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
            if_modified_since: None,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn if_modified_since(mut self, watermark: Watermark) -> Self {
        self.if_modified_since = Some(watermark);
        self
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The server answered "not modified" to the conditional first page.
    Unchanged,
    Fetched(FetchedPages),
}

/// Every record of a completed pagination run.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPages {
    pub records: Vec<Resource>,
    /// Freshness reported on the first page.
    pub data_updated_at: Option<Watermark>,
    pub pages: usize,
}

/// Anything that can run a complete paginated fetch.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_all(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError>;
}
