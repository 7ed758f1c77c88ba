use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::collection::MergedCollection;
use crate::error::{CacheError, SyncError};
use crate::policy::{self, CollectionSpec, PlanReason};
use crate::record::{Resource, Watermark};
use crate::source::{FetchOutcome, FetchRequest, PageSource};
use crate::store::{self, CacheStore};

/// What one [`Synchronizer::sync_with_report`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// `None` when no request was needed at all.
    pub reason: Option<PlanReason>,
    pub unchanged: bool,
    pub fetched: usize,
    pub pages: usize,
    pub total: usize,
    pub watermark: Option<Watermark>,
}

/// Keeps cached collections in step with the remote API.
///
/// Nothing is persisted until a fetch has completed in full, so a failed or dropped `sync`
/// leaves the previous collection and watermark untouched.
pub struct Synchronizer<S> {
    store: CacheStore,
    source: S,
}

impl<S: PageSource> Synchronizer<S> {
    pub fn new(store: CacheStore, source: S) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CacheStore {
        &mut self.store
    }

    /// Bring `collection` up to date and return it, restricted to `needed` when given.
    pub async fn sync(
        &mut self,
        collection: &CollectionSpec,
        needed: Option<&BTreeSet<u64>>,
    ) -> Result<MergedCollection, SyncError> {
        self.sync_with_report(collection, needed)
            .await
            .map(|(view, _)| view)
    }

    pub async fn sync_with_report(
        &mut self,
        collection: &CollectionSpec,
        needed: Option<&BTreeSet<u64>>,
    ) -> Result<(MergedCollection, SyncReport), SyncError> {
        let name = collection.name.as_str();
        let watermark_key = collection.watermark_key();

        let cached: MergedCollection = self
            .store
            .get_or_initialize(name, MergedCollection::default)
            .await?;
        let watermark: Option<Watermark> =
            self.store.get_or_initialize(&watermark_key, || None).await?;

        if needed.is_some_and(BTreeSet::is_empty) {
            debug!(collection = name, "no ids needed, skipping fetch");
            let report = SyncReport {
                reason: None,
                unchanged: true,
                fetched: 0,
                pages: 0,
                total: cached.len(),
                watermark,
            };
            return Ok((MergedCollection::default(), report));
        }

        let plan = policy::plan(collection, watermark.as_ref(), needed, &cached);
        match plan.reason {
            PlanReason::NoWatermark => info!(collection = name, "full sync (no watermark)"),
            PlanReason::MissingIds(missing) => {
                info!(collection = name, missing, "full sync (needed ids not cached)")
            }
            PlanReason::Delta => {
                debug!(collection = name, since = ?watermark, "delta sync")
            }
        }

        let outcome = self
            .source
            .fetch_all(&plan.request)
            .await
            .map_err(|source| SyncError::Fetch {
                collection: name.to_string(),
                source,
            })?;

        let (merged, report) = match outcome {
            FetchOutcome::Unchanged => {
                debug!(collection = name, "not modified since watermark");
                let report = SyncReport {
                    reason: Some(plan.reason),
                    unchanged: true,
                    fetched: 0,
                    pages: 1,
                    total: cached.len(),
                    watermark,
                };
                (cached, report)
            }
            FetchOutcome::Fetched(fetched) => {
                let count = fetched.records.len();
                let mut merged = cached;
                let stats = merged.merge(fetched.records);
                let next = if plan.scoped {
                    debug!(collection = name, "id-scoped fetch, keeping watermark");
                    watermark
                } else {
                    Watermark::latest(watermark, fetched.data_updated_at)
                };

                // Collection before watermark: a crash in between costs a redundant delta,
                // never a skipped one.
                self.store.put(name, &merged).await?;
                self.store.put(&watermark_key, &next).await?;

                info!(
                    collection = name,
                    fetched = count,
                    inserted = stats.inserted,
                    updated = stats.updated,
                    stale = stats.stale,
                    total = merged.len(),
                    "collection synced"
                );
                let report = SyncReport {
                    reason: Some(plan.reason),
                    unchanged: false,
                    fetched: count,
                    pages: fetched.pages,
                    total: merged.len(),
                    watermark: next,
                };
                (merged, report)
            }
        };

        let view = match needed {
            Some(ids) => merged.filtered(ids),
            None => merged,
        };
        Ok((view, report))
    }

    /// A single resource cached under `key`, fetched from `path` on first use only.
    pub async fn resource(&mut self, key: &str, path: &str) -> Result<Resource, SyncError> {
        if !store::is_valid_key(key) {
            return Err(CacheError::InvalidKey(key.to_string()).into());
        }
        if let Some(cached) = self.store.get::<Resource>(key)? {
            return Ok(cached);
        }

        let outcome = self
            .source
            .fetch_all(&FetchRequest::new(path))
            .await
            .map_err(|source| SyncError::Fetch {
                collection: key.to_string(),
                source,
            })?;
        let record = match outcome {
            FetchOutcome::Fetched(fetched) => fetched.records.into_iter().next(),
            FetchOutcome::Unchanged => None,
        }
        .ok_or_else(|| SyncError::EmptyResponse {
            key: key.to_string(),
        })?;

        self.store.put(key, &record).await?;
        debug!(key, "resource cached");
        Ok(record)
    }
}
