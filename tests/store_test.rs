use chrono::{Duration, TimeZone, Utc};

use sift::feedback::{NewRecord, Sentiment, Theme};
use sift::store::FeedbackStore;
use sift::store::sqlite::SqliteStore;

fn record(content: &str, minute: u32) -> NewRecord {
    NewRecord {
        source: "Discord".to_string(),
        content: content.to_string(),
        sentiment: Sentiment::Positive,
        theme: Theme::UiUx,
        timestamp: Utc.with_ymd_and_hms(2026, 10, 19, 9, minute, 0).unwrap(),
    }
}

#[tokio::test]
async fn insert_assigns_increasing_ids() {
    let store = SqliteStore::in_memory().unwrap();
    let a = store.insert(&record("a", 0)).await.unwrap();
    let b = store.insert(&record("b", 1)).await.unwrap();
    assert!(b > a);
}

#[tokio::test]
async fn list_round_trips_fields() {
    let store = SqliteStore::in_memory().unwrap();
    let new = record("The settings page is confusing", 5);
    let id = store.insert(&new).await.unwrap();

    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.id, id);
    assert_eq!(r.source, new.source);
    assert_eq!(r.content, new.content);
    assert_eq!(r.sentiment, Sentiment::Positive);
    assert_eq!(r.theme, Theme::UiUx);
    assert_eq!(r.timestamp, new.timestamp);
}

#[tokio::test]
async fn list_orders_newest_first() {
    let store = SqliteStore::in_memory().unwrap();
    store.insert(&record("middle", 5)).await.unwrap();
    store.insert(&record("oldest", 1)).await.unwrap();
    store.insert(&record("newest", 9)).await.unwrap();

    let contents: Vec<_> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.content)
        .collect();
    assert_eq!(contents, vec!["newest", "middle", "oldest"]);
}

#[tokio::test]
async fn equal_timestamps_order_by_id_descending() {
    let store = SqliteStore::in_memory().unwrap();
    let first = store.insert(&record("first", 3)).await.unwrap();
    let second = store.insert(&record("second", 3)).await.unwrap();

    let ids: Vec<_> = store.list().await.unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![second, first]);
}

#[tokio::test]
async fn sub_second_timestamps_keep_order() {
    let store = SqliteStore::in_memory().unwrap();
    let base = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
    let mut later = record("later", 0);
    later.timestamp = base + Duration::microseconds(250);
    let mut earlier = record("earlier", 0);
    earlier.timestamp = base;

    store.insert(&later).await.unwrap();
    store.insert(&earlier).await.unwrap();

    let records = store.list().await.unwrap();
    assert_eq!(records[0].content, "later");
    assert_eq!(records[0].timestamp, later.timestamp);
}

#[tokio::test]
async fn persists_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store-test.db");
    let path_str = path.to_str().unwrap();

    {
        let store = SqliteStore::open(path_str).unwrap();
        store.insert(&record("kept", 0)).await.unwrap();
    }

    {
        let store = SqliteStore::open(path_str).unwrap();
        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "kept");
    }
}
