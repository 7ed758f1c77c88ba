use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::collection::MergedCollection;
use crate::record::Watermark;
use crate::source::FetchRequest;

/// Query parameter carrying the delta lower bound.
pub const UPDATED_AFTER: &str = "updated_after";

/// One remote collection and how to address it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Cache key of the merged collection; the watermark lives under `<name>-watermark`.
    pub name: String,
    pub path: String,
    /// Query parameter for an id allow-list, if the endpoint supports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_filter: Option<String>,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            id_filter: None,
        }
    }

    pub fn with_id_filter(mut self, param: impl Into<String>) -> Self {
        self.id_filter = Some(param.into());
        self
    }

    pub fn watermark_key(&self) -> String {
        format!("{}-watermark", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanReason {
    /// Nothing merged yet.
    NoWatermark,
    /// Needed ids are absent although a watermark exists; a delta would never repair the gap.
    MissingIds(usize),
    Delta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub request: FetchRequest,
    pub reason: PlanReason,
    /// The request is limited to an id allow-list. Its response says nothing about records
    /// outside that list, so it must not advance the collection watermark.
    pub scoped: bool,
}

/// Decide the request shape for one sync of `collection`. Performs no I/O.
pub fn plan(
    collection: &CollectionSpec,
    watermark: Option<&Watermark>,
    needed: Option<&BTreeSet<u64>>,
    cached: &MergedCollection,
) -> SyncPlan {
    let mut request = FetchRequest::new(&collection.path);
    let mut scoped = false;

    if let (Some(param), Some(ids)) = (collection.id_filter.as_deref(), needed)
        && !ids.is_empty()
    {
        let joined = ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        request = request.with_query(param, joined);
        scoped = true;
    }

    let reason = match watermark {
        None => PlanReason::NoWatermark,
        Some(_) => match needed.map(|ids| cached.missing(ids).len()) {
            Some(missing) if missing > 0 => PlanReason::MissingIds(missing),
            _ => PlanReason::Delta,
        },
    };

    if let (PlanReason::Delta, Some(watermark)) = (reason, watermark) {
        request = request
            .with_query(UPDATED_AFTER, watermark.to_query_value())
            .if_modified_since(*watermark);
    }

    SyncPlan {
        request,
        reason,
        scoped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Resource;

    fn cached(ids: &[u64]) -> MergedCollection {
        ids.iter()
            .map(|&id| Resource {
                id,
                object: "subject".into(),
                url: format!("https://api.example.test/v2/subjects/{id}"),
                data_updated_at: None,
                data: serde_json::Value::Null,
            })
            .collect()
    }

    fn t0() -> Watermark {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn no_watermark_means_full_fetch() {
        let spec = CollectionSpec::new("assignments", "/assignments");
        let plan = plan(&spec, None, None, &cached(&[]));
        assert_eq!(plan.reason, PlanReason::NoWatermark);
        assert_eq!(plan.request, FetchRequest::new("/assignments"));
    }

    #[test]
    fn watermark_means_conditional_delta() {
        let spec = CollectionSpec::new("assignments", "/assignments");
        let wm = t0();
        let plan = plan(&spec, Some(&wm), None, &cached(&[1, 2]));
        assert_eq!(plan.reason, PlanReason::Delta);
        assert!(!plan.scoped);
        assert_eq!(plan.request.if_modified_since, Some(wm));
        assert_eq!(
            plan.request.query_value(UPDATED_AFTER),
            Some("2024-05-01T12:00:00.000000Z")
        );
    }

    #[test]
    fn missing_needed_id_forces_full_fetch() {
        let spec = CollectionSpec::new("subjects", "/subjects");
        let needed: BTreeSet<u64> = [1, 2, 3].into();
        let wm = t0();
        let plan = plan(&spec, Some(&wm), Some(&needed), &cached(&[1, 2]));
        assert_eq!(plan.reason, PlanReason::MissingIds(1));
        assert!(!plan.scoped, "no id filter configured");
        assert_eq!(plan.request.if_modified_since, None);
        assert_eq!(plan.request.query_value(UPDATED_AFTER), None);
    }

    #[test]
    fn complete_cache_with_needed_ids_stays_delta() {
        let spec = CollectionSpec::new("subjects", "/subjects").with_id_filter("ids");
        let needed: BTreeSet<u64> = [2, 1].into();
        let wm = t0();
        let plan = plan(&spec, Some(&wm), Some(&needed), &cached(&[1, 2, 9]));
        assert_eq!(plan.reason, PlanReason::Delta);
        assert!(plan.scoped);
        assert_eq!(plan.request.query_value("ids"), Some("1,2"));
    }

    #[test]
    fn id_allow_list_applies_to_full_fetch() {
        let spec = CollectionSpec::new("subjects", "/subjects").with_id_filter("ids");
        let needed: BTreeSet<u64> = [30, 4].into();
        let plan = plan(&spec, None, Some(&needed), &cached(&[]));
        assert_eq!(plan.reason, PlanReason::NoWatermark);
        assert_eq!(
            plan.request.query,
            vec![("ids".to_string(), "4,30".to_string())]
        );
    }
}
