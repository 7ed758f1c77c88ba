use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;
use serde_json::json;

use wksync_api::{ApiClient, Credentials, RateLimiter};
use wksync_core::backend::memory::MemoryBackend;
use wksync_core::{CacheStore, CollectionSpec, Synchronizer, Watermark};

const FIRST_PAGE_UPDATED: &str = "2024-04-02T08:30:00.000000Z";

fn resource(id: u64) -> serde_json::Value {
    json!({
        "id": id,
        "object": "vocabulary",
        "url": format!("https://api.wanikani.com/v2/subjects/{id}"),
        "data_updated_at": "2024-04-01T10:00:00.000000Z",
        "data": {"level": 5}
    })
}

fn page(ids: &[u64], next_url: Option<String>) -> String {
    json!({
        "object": "collection",
        "url": "https://api.wanikani.com/v2/subjects",
        "pages": {"next_url": next_url, "previous_url": null, "per_page": 2},
        "total_count": 4,
        "data_updated_at": FIRST_PAGE_UPDATED,
        "data": ids.iter().map(|id| resource(*id)).collect::<Vec<_>>()
    })
    .to_string()
}

#[tokio::test]
async fn two_pages_then_not_modified() {
    let mut server = mockito::Server::new_async().await;
    let next = format!("{}/subjects?page_after_id=2", server.url());

    let first = server
        .mock("GET", "/subjects")
        .with_status(200)
        .with_body(page(&[1, 2], Some(next)))
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/subjects")
        .match_query(Matcher::UrlEncoded("page_after_id".into(), "2".into()))
        .with_status(200)
        .with_body(page(&[3, 4], None))
        .expect(1)
        .create_async()
        .await;

    let watermark: Watermark = FIRST_PAGE_UPDATED.parse().unwrap();
    let conditional = server
        .mock("GET", "/subjects")
        .match_query(Matcher::UrlEncoded(
            "updated_after".into(),
            watermark.to_query_value(),
        ))
        .match_header("if-modified-since", watermark.to_http_date().as_str())
        .with_status(304)
        .expect(1)
        .create_async()
        .await;

    let backend = Arc::new(MemoryBackend::new());
    let store = CacheStore::open(backend.clone()).await.unwrap();
    let api = ApiClient::new(
        server.url(),
        Credentials::new("test-token").unwrap(),
        Arc::new(RateLimiter::new(10, Duration::from_secs(60))),
    )
    .unwrap();
    let mut sync = Synchronizer::new(store, api);
    let subjects = CollectionSpec::new("subjects", "/subjects");

    let (merged, report) = sync.sync_with_report(&subjects, None).await.unwrap();
    assert_eq!(merged.ids().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert_eq!(report.pages, 2);
    first.assert_async().await;
    second.assert_async().await;

    let snapshot = backend.snapshot().await;
    let (again, report) = sync.sync_with_report(&subjects, None).await.unwrap();
    assert!(report.unchanged);
    assert_eq!(again, merged);
    assert_eq!(backend.snapshot().await, snapshot);
    conditional.assert_async().await;
}

#[tokio::test]
async fn failed_second_page_keeps_previous_state() {
    let mut server = mockito::Server::new_async().await;
    let next = format!("{}/subjects?page_after_id=2", server.url());
    server
        .mock("GET", "/subjects")
        .with_status(200)
        .with_body(page(&[1, 2], Some(next)))
        .create_async()
        .await;
    server
        .mock("GET", "/subjects")
        .match_query(Matcher::UrlEncoded("page_after_id".into(), "2".into()))
        .with_status(503)
        .create_async()
        .await;

    let seeded = serde_json::to_vec_pretty(&json!({ "9": resource(9) })).unwrap();
    let backend = Arc::new(MemoryBackend::with_files([("subjects.json", seeded)]));
    let store = CacheStore::open(backend.clone()).await.unwrap();
    let api = ApiClient::new(
        server.url(),
        Credentials::new("test-token").unwrap(),
        Arc::new(RateLimiter::new(10, Duration::from_secs(60))),
    )
    .unwrap();
    let mut sync = Synchronizer::new(store, api);
    let subjects = CollectionSpec::new("subjects", "/subjects");

    // First run bootstraps the empty watermark entry; take the snapshot after that.
    sync.store_mut()
        .get_or_initialize::<Option<Watermark>, _>("subjects-watermark", || None)
        .await
        .unwrap();
    let before = backend.snapshot().await;

    assert!(sync.sync(&subjects, None).await.is_err());
    assert_eq!(backend.snapshot().await, before);
    let cached: wksync_core::MergedCollection = sync.store().get("subjects").unwrap().unwrap();
    assert_eq!(cached.ids().collect::<Vec<_>>(), vec![9]);
}
