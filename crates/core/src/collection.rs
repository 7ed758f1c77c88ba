use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::record::Resource;

/// Latest known record per id for one collection. Ids are never removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergedCollection {
    records: BTreeMap<u64, Resource>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    pub updated: usize,
    /// Incoming records older than what is already held.
    pub stale: usize,
}

impl MergedCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u64) -> Option<&Resource> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.records.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.records.values()
    }

    /// Merge incoming records by id.
    ///
    /// An incoming record replaces the held one unless both carry a timestamp and the held one
    /// is strictly newer, so the stored `data_updated_at` is always the maximum seen.
    pub fn merge<I>(&mut self, incoming: I) -> MergeStats
    where
        I: IntoIterator<Item = Resource>,
    {
        let mut stats = MergeStats::default();
        for record in incoming {
            match self.records.get(&record.id) {
                None => {
                    stats.inserted += 1;
                    self.records.insert(record.id, record);
                }
                Some(held) if is_newer(held, &record) => stats.stale += 1,
                Some(_) => {
                    stats.updated += 1;
                    self.records.insert(record.id, record);
                }
            }
        }
        stats
    }

    /// Ids from `wanted` that are not held.
    pub fn missing(&self, wanted: &BTreeSet<u64>) -> Vec<u64> {
        wanted
            .iter()
            .copied()
            .filter(|id| !self.contains(*id))
            .collect()
    }

    /// A copy restricted to `ids`.
    pub fn filtered(&self, ids: &BTreeSet<u64>) -> Self {
        let records = ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| (*id, r.clone())))
            .collect();
        Self { records }
    }
}

fn is_newer(held: &Resource, incoming: &Resource) -> bool {
    match (held.data_updated_at, incoming.data_updated_at) {
        (Some(held), Some(incoming)) => held > incoming,
        _ => false,
    }
}

impl FromIterator<Resource> for MergedCollection {
    fn from_iter<I: IntoIterator<Item = Resource>>(iter: I) -> Self {
        let mut collection = Self::new();
        collection.merge(iter);
        collection
    }
}
