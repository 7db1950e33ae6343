//! Integration tests for PgActivityLog.
//!
//! Requirements: Docker (for Postgres via testcontainers)
//!
//! Run with: cargo test -p hoopfeed-events --features test-utils --test pg_log_test

#![cfg(feature = "test-utils")]

use std::time::Duration;

use hoopfeed_common::{ActivityKind, EngagementError, LikeKey, NewActivity, Target};
use hoopfeed_events::{testutil, ActivityLog, FeedQuery, PgActivityLog};

async fn setup() -> (impl std::any::Any, PgActivityLog) {
    let (container, pool) = testutil::postgres_container().await;
    (container, PgActivityLog::new(pool, Duration::from_secs(5)))
}

fn like(user: i64, target: Target) -> NewActivity {
    LikeKey::new(user, target).unwrap().to_new_activity()
}

#[tokio::test]
async fn append_round_trips_kind_and_target() {
    let (_container, log) = setup().await;

    let stored = log
        .append(NewActivity::new(3, ActivityKind::CommentedOnStory, Target::Story(11)).unwrap())
        .await
        .unwrap();

    assert!(stored.id > 0);
    assert_eq!(stored.kind, ActivityKind::CommentedOnStory);
    assert_eq!(stored.story_id(), Some(11));
    assert_eq!(stored.place_id(), None);
}

#[tokio::test]
async fn unique_index_rejects_second_like() {
    let (_container, log) = setup().await;

    log.append(like(1, Target::Place(2))).await.unwrap();
    let err = log.append(like(1, Target::Place(2))).await.unwrap_err();

    assert!(matches!(err, EngagementError::DuplicateLike));
}

#[tokio::test]
async fn comments_are_not_subject_to_like_uniqueness() {
    let (_container, log) = setup().await;
    let comment = NewActivity::new(1, ActivityKind::CommentedOnPlace, Target::Place(2)).unwrap();

    log.append(comment).await.unwrap();
    log.append(comment).await.unwrap();

    let events = log.read_by_target(Target::Place(2), 10).await.unwrap();
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn find_and_remove_like() {
    let (_container, log) = setup().await;
    let key = LikeKey::new(7, Target::Story(3)).unwrap();

    assert!(log.find_like(&key).await.unwrap().is_none());

    let stored = log.append(key.to_new_activity()).await.unwrap();
    let found = log.find_like(&key).await.unwrap().unwrap();
    assert_eq!(found.id, stored.id);

    assert!(log.remove_like(stored.id).await.unwrap());
    assert!(log.find_like(&key).await.unwrap().is_none());
    assert!(!log.remove_like(stored.id).await.unwrap());
}

#[tokio::test]
async fn remove_like_refuses_content_events() {
    let (_container, log) = setup().await;
    let post = log
        .append(NewActivity::new(1, ActivityKind::PostedPlace, Target::Place(1)).unwrap())
        .await
        .unwrap();

    assert!(!log.remove_like(post.id).await.unwrap());
    assert_eq!(log.read_by_actor(1, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn feed_orders_newest_first_and_excludes_viewer() {
    let (_container, log) = setup().await;
    let first = log.append(like(1, Target::Place(1))).await.unwrap();
    let second = log.append(like(2, Target::Place(1))).await.unwrap();
    let third = log.append(like(3, Target::Story(1))).await.unwrap();

    let feed = log.read_feed(&FeedQuery::new(2, true, 100)).await.unwrap();
    let ids: Vec<i64> = feed.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![third.id, first.id]);

    let everything = log.read_feed(&FeedQuery::new(2, false, 2)).await.unwrap();
    let ids: Vec<i64> = everything.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![third.id, second.id]);
}

#[tokio::test]
async fn count_by_targets_groups_story_likes() {
    let (_container, log) = setup().await;
    log.append(like(1, Target::Story(1))).await.unwrap();
    log.append(like(2, Target::Story(1))).await.unwrap();
    log.append(like(2, Target::Story(2))).await.unwrap();

    let counts = log
        .count_by_targets(ActivityKind::LikedStory, &[1, 2, 3])
        .await
        .unwrap();

    assert_eq!(counts.get(&1), Some(&2));
    assert_eq!(counts.get(&2), Some(&1));
    assert!(!counts.contains_key(&3));
}

#[tokio::test]
async fn count_since_without_mark_counts_window() {
    let (_container, log) = setup().await;
    log.append(like(1, Target::Story(1))).await.unwrap();
    log.append(like(2, Target::Story(1))).await.unwrap();
    log.append(like(3, Target::Story(1))).await.unwrap();

    let query = FeedQuery::new(1, true, 100);
    assert_eq!(log.count_since(&query, None).await.unwrap(), 2);

    let capped = FeedQuery::new(1, true, 1);
    assert_eq!(log.count_since(&capped, None).await.unwrap(), 1);
}
