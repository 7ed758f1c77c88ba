use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, IF_MODIFIED_SINCE, RETRY_AFTER};
use reqwest::{StatusCode, Url};
use tracing::{debug, warn};

use wksync_core::{FetchError, FetchOutcome, FetchRequest, FetchedPages, PageSource, Watermark};

use crate::auth::Credentials;
use crate::limiter::RateLimiter;
use crate::types::Payload;

pub const DEFAULT_BASE_URL: &str = "https://api.wanikani.com/v2";
const MAX_RETRIES: u32 = 5;
const RATE_LIMIT_REMAINING: &str = "ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "ratelimit-reset";

/// Authenticated, rate-limited client for the remote collection API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    credentials: Credentials,
    limiter: Arc<RateLimiter>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("failed to build HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            credentials,
            limiter,
            http,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    fn resolve(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!("{}{path}", self.base_url)
        }
    }

    fn first_page_url(&self, request: &FetchRequest) -> Result<String, FetchError> {
        let resolved = self.resolve(&request.path);
        let mut url = Url::parse(&resolved).map_err(|e| FetchError::Transport {
            url: resolved.clone(),
            source: Box::new(e),
        })?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url.into())
    }

    /// GET one page. `Ok(None)` means the server answered 304 to a conditional request.
    async fn get_page(
        &self,
        url: &str,
        if_modified_since: Option<Watermark>,
    ) -> Result<Option<Payload>, FetchError> {
        let mut retries = 0;
        loop {
            self.limiter.acquire().await;

            let mut req = self.http.get(url).bearer_auth(self.credentials.token());
            if let Some(since) = if_modified_since {
                req = req.header(IF_MODIFIED_SINCE, since.to_http_date());
            }
            let resp = req.send().await.map_err(|e| FetchError::Transport {
                url: url.to_string(),
                source: Box::new(e),
            })?;

            let status = resp.status();
            self.observe_budget(resp.headers()).await;

            if status == StatusCode::NOT_MODIFIED && if_modified_since.is_some() {
                debug!(url, "not modified");
                return Ok(None);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(FetchError::RetriesExhausted {
                        url: url.to_string(),
                    });
                }
                let delay = retry_delay(resp.headers(), retries);
                warn!(
                    url,
                    retry_after = delay.as_secs(),
                    retries,
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                });
            }

            let body = resp.bytes().await.map_err(|e| FetchError::Transport {
                url: url.to_string(),
                source: Box::new(e),
            })?;
            let payload = serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
                url: url.to_string(),
                source,
            })?;
            debug!(url, "OK");
            return Ok(Some(payload));
        }
    }

    async fn observe_budget(&self, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
        };
        let (Some(remaining), Some(reset_at)) =
            (header(RATE_LIMIT_REMAINING), header(RATE_LIMIT_RESET))
        else {
            return;
        };
        // Whole seconds since the epoch; truncating `now` makes the wait err on the long side.
        let reset_after = (reset_at - chrono::Utc::now().timestamp()).max(0) as u64;
        self.limiter
            .observe(remaining.max(0) as u32, Duration::from_secs(reset_after))
            .await;
    }
}

/// Wait before retrying a 429: `Retry-After` in seconds when present, otherwise `2^retries`.
fn retry_delay(headers: &HeaderMap, retries: u32) -> Duration {
    let secs = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(2u64.pow(retries));
    Duration::from_secs(secs)
}

#[async_trait]
impl PageSource for ApiClient {
    /// Follow `pages.next_url` until exhausted. Only the first page is conditional; a failure
    /// on any page fails the whole fetch and drops what was accumulated.
    async fn fetch_all(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        let mut url = self.first_page_url(request)?;
        let mut conditional = request.if_modified_since;
        let mut records = Vec::new();
        let mut data_updated_at = None;
        let mut pages = 0;

        loop {
            let Some(payload) = self.get_page(&url, conditional.take()).await? else {
                return Ok(FetchOutcome::Unchanged);
            };
            pages += 1;

            match payload {
                Payload::Resource(resource) => {
                    data_updated_at = resource.data_updated_at.map(Watermark::from);
                    records.push(resource);
                    break;
                }
                Payload::Collection(page) => {
                    if pages == 1 {
                        data_updated_at = page.data_updated_at.map(Watermark::from);
                    }
                    debug!(items = page.data.len(), total = page.total_count, "fetched page");
                    records.extend(page.data);
                    match page.pages.next_url {
                        Some(next) => url = next,
                        None => break,
                    }
                }
            }
        }

        debug!(pages, records = records.len(), "pagination complete");
        Ok(FetchOutcome::Fetched(FetchedPages {
            records,
            data_updated_at,
            pages,
        }))
    }
}
