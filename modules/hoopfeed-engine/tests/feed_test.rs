mod common;

use chrono::{Duration, Utc};

use hoopfeed_common::{ActivityKind, Config, EngagementError, NewActivity, Target};
use hoopfeed_engine::{MissingReference, MissingReferencePolicy};

use common::{harness, harness_with};

#[tokio::test]
async fn liked_place_shows_in_other_feeds_until_unliked() {
    let h = harness();
    let u1 = h.entities.add_user("Alice");
    let u2 = h.entities.add_user("Bob");
    let p1 = h.entities.add_place(u2.id, "Rucker");

    h.engine.toggle_like(u1.id, Target::Place(p1.id)).await.unwrap();

    let feed = h.engine.get_feed(u2.id, true).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].kind, ActivityKind::LikedPlace);
    assert_eq!(feed[0].user_id, u1.id);
    assert_eq!(feed[0].data.user.as_ref().map(|u| u.id), Some(u1.id));
    assert_eq!(feed[0].data.place.as_ref().map(|p| p.id), Some(p1.id));
    assert!(feed[0].data.story.is_none());

    h.engine.toggle_like(u1.id, Target::Place(p1.id)).await.unwrap();
    assert!(h.engine.get_feed(u2.id, true).await.unwrap().is_empty());
}

#[tokio::test]
async fn comment_on_story_is_hydrated_for_other_users() {
    let h = harness();
    let u1 = h.entities.add_user("Alice");
    let u2 = h.entities.add_user("Bob");
    let place = h.entities.add_place(u1.id, "Rucker");
    let s1 = h.entities.add_story(u1.id, place.id, "Dunk");

    h.engine
        .insert_comment(u2.id, Target::Story(s1.id), "Great court!")
        .await
        .unwrap();

    let events = h.log.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ActivityKind::CommentedOnStory);
    assert_eq!(events[0].user_id, u2.id);
    assert_eq!(events[0].story_id(), Some(s1.id));

    let feed = h.engine.get_feed(u1.id, true).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].data.user.as_ref().map(|u| u.id), Some(u2.id));
    assert_eq!(feed[0].data.story.as_ref().map(|s| s.id), Some(s1.id));

    // The commenter's own feed leaves it out when excluding self.
    assert!(h.engine.get_feed(u2.id, true).await.unwrap().is_empty());
    assert_eq!(h.engine.get_feed(u2.id, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn deleted_targets_drop_only_their_attachment() {
    let h = harness();
    let viewer = h.entities.add_user("Viewer");
    let actor = h.entities.add_user("Alice");
    let place = h.entities.add_place(actor.id, "Rucker");
    let story = h.entities.add_story(actor.id, place.id, "Dunk");

    h.engine.toggle_like(actor.id, Target::Story(story.id)).await.unwrap();
    h.engine.toggle_like(actor.id, Target::Place(place.id)).await.unwrap();
    h.entities.remove_story(story.id);

    let feed = h.engine.get_feed(viewer.id, true).await.unwrap();
    assert_eq!(feed.len(), 2);

    let story_like = feed.iter().find(|a| a.kind == ActivityKind::LikedStory).unwrap();
    assert!(story_like.data.story.is_none());
    assert!(story_like.data.user.is_some());
    assert_eq!(story_like.missing, [MissingReference::Story(story.id)]);

    let json = serde_json::to_value(story_like).unwrap();
    assert!(json["data"].get("story").is_none());
    assert!(json["data"].get("user").is_some());

    let place_like = feed.iter().find(|a| a.kind == ActivityKind::LikedPlace).unwrap();
    assert!(place_like.is_complete());
}

#[tokio::test]
async fn deleted_actor_keeps_the_event() {
    let h = harness();
    let viewer = h.entities.add_user("Viewer");
    let actor = h.entities.add_user("Gone");
    let place = h.entities.add_place(viewer.id, "Rucker");
    h.engine.toggle_like(actor.id, Target::Place(place.id)).await.unwrap();
    h.entities.remove_user(actor.id);

    let feed = h.engine.get_feed(viewer.id, true).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert!(feed[0].data.user.is_none());
    assert!(feed[0].data.place.is_some());
    assert_eq!(feed[0].missing, [MissingReference::User(actor.id)]);
}

#[tokio::test]
async fn entity_outage_degrades_records_not_the_feed() {
    let h = harness();
    let viewer = h.entities.add_user("Viewer");
    let actor = h.entities.add_user("Alice");
    h.engine.toggle_like(actor.id, Target::Place(5)).await.unwrap();
    h.entities.set_offline(true);

    let feed = h.engine.get_feed(viewer.id, true).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].missing.len(), 2);
}

#[tokio::test]
async fn strict_policy_fails_on_missing_reference() {
    let h = harness();
    let engine = h.engine.with_policy(MissingReferencePolicy::Strict);
    let viewer = h.entities.add_user("Viewer");
    let actor = h.entities.add_user("Alice");
    h.log.insert_at(
        NewActivity::new(actor.id, ActivityKind::LikedStory, Target::Story(404)).unwrap(),
        Utc::now(),
    );

    let err = engine.get_feed(viewer.id, true).await.unwrap_err();
    assert!(matches!(err, EngagementError::NotFound(_)));
}

#[tokio::test]
async fn feed_is_newest_first_with_insertion_tiebreak() {
    let h = harness();
    let viewer = h.entities.add_user("Viewer");
    let actor = h.entities.add_user("Alice");
    let place = h.entities.add_place(actor.id, "Rucker");
    let now = Utc::now();
    let older = now - Duration::minutes(5);

    let event = |kind, target| NewActivity::new(actor.id, kind, target).unwrap();
    let a = h.log.insert_at(event(ActivityKind::PostedPlace, Target::Place(place.id)), older);
    let b = h.log.insert_at(event(ActivityKind::CommentedOnPlace, Target::Place(place.id)), now);
    let c = h.log.insert_at(event(ActivityKind::LikedPlace, Target::Place(place.id)), now);

    let ids: Vec<i64> = h
        .engine
        .get_feed(viewer.id, true)
        .await
        .unwrap()
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, [c.id, b.id, a.id]);
}

#[tokio::test]
async fn feed_window_is_bounded_by_page_size() {
    let h = harness_with(Config {
        feed_page_size: 3,
        ..Config::default()
    });
    let viewer = h.entities.add_user("Viewer");
    let actor = h.entities.add_user("Alice");
    for id in 1..=5 {
        h.engine.toggle_like(actor.id, Target::Story(id)).await.unwrap();
    }

    let feed = h.engine.get_feed(viewer.id, true).await.unwrap();
    let stories: Vec<Option<i64>> = feed.iter().map(|a| a.target.story_id()).collect();
    assert_eq!(stories, [Some(5), Some(4), Some(3)]);
}

#[tokio::test]
async fn unavailable_log_fails_the_feed() {
    let h = harness();
    let viewer = h.entities.add_user("Viewer");
    h.log.set_offline(true);

    let err = h.engine.get_feed(viewer.id, true).await.unwrap_err();
    assert!(matches!(err, EngagementError::StoreUnavailable(_)));
}

#[tokio::test]
async fn unseen_count_tracks_the_last_check() {
    let h = harness();
    let viewer = h.entities.add_user("Viewer");
    let actor = h.entities.add_user("Alice");
    let place = h.entities.add_place(actor.id, "Rucker");
    let t0 = Utc::now() - Duration::hours(1);

    let event = |kind| NewActivity::new(actor.id, kind, Target::Place(place.id)).unwrap();
    h.log.insert_at(event(ActivityKind::PostedPlace), t0);
    h.log.insert_at(event(ActivityKind::CommentedOnPlace), t0 + Duration::minutes(10));
    h.log.insert_at(
        NewActivity::new(viewer.id, ActivityKind::LikedPlace, Target::Place(place.id)).unwrap(),
        t0 + Duration::minutes(20),
    );

    // Never checked: the whole window, minus the viewer's own event.
    assert_eq!(h.engine.unseen_activity_count(viewer.id).await.unwrap(), 2);

    h.engine
        .mark_activity_checked(viewer.id, t0 + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(h.engine.unseen_activity_count(viewer.id).await.unwrap(), 1);

    let err = h.engine.unseen_activity_count(9_999).await.unwrap_err();
    assert!(matches!(err, EngagementError::NotFound(_)));
}
