use hoopfeed_common::{EngagementError, Target};
use hoopfeed_counters::{CounterKey, CounterStore, MemoryCounterStore, VIEW_COUNT_FIELD};

#[tokio::test]
async fn increment_starts_from_zero() {
    let store = MemoryCounterStore::new();
    let key = CounterKey(Target::Place(1));

    assert_eq!(store.get(key, VIEW_COUNT_FIELD).await.unwrap(), None);
    assert_eq!(store.increment(key, VIEW_COUNT_FIELD, 1).await.unwrap(), 1);
    assert_eq!(store.get(key, VIEW_COUNT_FIELD).await.unwrap(), Some(1));
}

#[tokio::test]
async fn place_and_story_with_same_id_are_separate_keys() {
    let store = MemoryCounterStore::new();
    store.increment(CounterKey(Target::Place(4)), VIEW_COUNT_FIELD, 3).await.unwrap();

    let story = store
        .get(CounterKey(Target::Story(4)), VIEW_COUNT_FIELD)
        .await
        .unwrap();
    assert_eq!(story, None);
}

#[tokio::test]
async fn offline_store_reports_unavailable_and_recovers() {
    let store = MemoryCounterStore::new();
    let key = CounterKey(Target::Story(2));
    store.set(key, VIEW_COUNT_FIELD, 10);

    store.set_offline(true);
    let err = store.increment(key, VIEW_COUNT_FIELD, 1).await.unwrap_err();
    assert!(matches!(err, EngagementError::StoreUnavailable(_)));

    store.set_offline(false);
    assert_eq!(store.get(key, VIEW_COUNT_FIELD).await.unwrap(), Some(10));
}

#[tokio::test]
async fn flush_loses_counts() {
    let store = MemoryCounterStore::new();
    let key = CounterKey(Target::Story(2));
    store.increment(key, VIEW_COUNT_FIELD, 1).await.unwrap();

    store.flush();
    assert_eq!(store.get(key, VIEW_COUNT_FIELD).await.unwrap(), None);
}
