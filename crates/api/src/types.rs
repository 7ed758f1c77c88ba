use chrono::{DateTime, Utc};
use serde::Deserialize;

use wksync_core::Resource;

#[derive(Debug, Clone, Deserialize)]
pub struct Pages {
    pub next_url: Option<String>,
    pub previous_url: Option<String>,
    pub per_page: Option<u32>,
}

/// One page of a collection response.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionPage {
    pub object: String,
    pub url: String,
    pub pages: Pages,
    #[serde(default)]
    pub total_count: u64,
    pub data_updated_at: Option<DateTime<Utc>>,
    pub data: Vec<Resource>,
}

/// Any response body: a collection page or a single resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Collection(CollectionPage),
    Resource(Resource),
}
