mod common;

use chrono::Duration;

use hoopfeed_common::{
    ActivityKind, EngagementError, FeaturedImage, FeaturedRole, NewPlace, NewStory, Story,
    StorySort, Target,
};
use hoopfeed_counters::{CounterKey, VIEW_COUNT_FIELD};
use hoopfeed_engine::Ranked;

use common::harness;

#[tokio::test]
async fn views_accumulate_and_read_back() {
    let h = harness();
    let target = Target::Story(8);

    assert_eq!(h.engine.get_view_count(target).await.unwrap(), None);
    for expected in 1..=3 {
        assert_eq!(h.engine.record_view(target).await.unwrap(), Some(expected));
    }
    assert_eq!(h.engine.get_view_count(target).await.unwrap(), Some(3));

    // Views never touch the activity log.
    assert!(h.log.events().is_empty());
}

#[tokio::test]
async fn counter_outage_does_not_affect_likes_or_comments() {
    let h = harness();
    let user = h.entities.add_user("Alice");
    let place = h.entities.add_place(user.id, "Rucker");
    let target = Target::Place(place.id);
    h.counters.set_offline(true);

    assert_eq!(h.engine.record_view(target).await.unwrap(), None);
    h.engine.insert_comment(user.id, target, "Nice run").await.unwrap();
    assert!(h.engine.toggle_like(user.id, target).await.unwrap().is_liked());

    assert_eq!(h.entities.comments().len(), 1);
    assert_eq!(h.log.events().len(), 2);
}

#[tokio::test]
async fn stories_rank_by_each_sort() {
    let h = harness();
    let alice = h.entities.add_user("Alice");
    let bob = h.entities.add_user("Bob");
    let place = h.entities.add_place(alice.id, "Rucker");
    let now = chrono::Utc::now();
    let s1 = h.entities.add_story_at(alice.id, place.id, "one", now - Duration::hours(3));
    let s2 = h.entities.add_story_at(alice.id, place.id, "two", now - Duration::hours(2));
    let s3 = h.entities.add_story_at(alice.id, place.id, "three", now - Duration::hours(1));

    h.counters.set(CounterKey(Target::Story(s1.id)), VIEW_COUNT_FIELD, 40);
    h.counters.set(CounterKey(Target::Story(s3.id)), VIEW_COUNT_FIELD, 2);

    h.engine.toggle_like(alice.id, Target::Story(s2.id)).await.unwrap();
    h.engine.toggle_like(bob.id, Target::Story(s2.id)).await.unwrap();
    h.engine.toggle_like(bob.id, Target::Story(s1.id)).await.unwrap();

    h.engine.insert_comment(bob.id, Target::Story(s3.id), "wow").await.unwrap();

    let order = |ranked: Vec<Ranked<Story>>| -> Vec<(i64, i64)> {
        ranked.into_iter().map(|r| (r.item.id, r.score)).collect()
    };

    let latest = h.engine.stories_for_place(place.id, StorySort::Latest).await.unwrap();
    let ids: Vec<i64> = latest.iter().map(|r| r.item.id).collect();
    assert_eq!(ids, [s3.id, s2.id, s1.id]);

    let viewed = h.engine.stories_for_place(place.id, StorySort::MostViewed).await.unwrap();
    assert_eq!(order(viewed), [(s1.id, 40), (s3.id, 2), (s2.id, 0)]);

    let liked = h.engine.stories_for_place(place.id, StorySort::MostLiked).await.unwrap();
    assert_eq!(order(liked), [(s2.id, 2), (s1.id, 1), (s3.id, 0)]);

    let commented = h
        .engine
        .stories_for_place(place.id, StorySort::MostCommented)
        .await
        .unwrap();
    assert_eq!(order(commented), [(s3.id, 1), (s2.id, 0), (s1.id, 0)]);
}

#[tokio::test]
async fn most_viewed_survives_a_counter_flush() {
    let h = harness();
    let alice = h.entities.add_user("Alice");
    let place = h.entities.add_place(alice.id, "Rucker");
    let a = h.entities.add_story(alice.id, place.id, "a");
    let b = h.entities.add_story(alice.id, place.id, "b");
    h.engine.record_view(Target::Story(a.id)).await.unwrap();
    h.counters.flush();

    let ranked = h.engine.stories_for_place(place.id, StorySort::MostViewed).await.unwrap();
    let ids: Vec<i64> = ranked.iter().map(|r| r.item.id).collect();
    assert!(ranked.iter().all(|r| r.score == 0));
    assert!(ids.contains(&a.id) && ids.contains(&b.id));
}

#[tokio::test]
async fn blank_comment_is_rejected_without_side_effects() {
    let h = harness();
    let user = h.entities.add_user("Alice");
    h.entities.set_offline(true);

    let err = h
        .engine
        .insert_comment(user.id, Target::Story(1), "   ")
        .await
        .unwrap_err();

    assert!(err.is_client_error());
    assert!(h.log.events().is_empty());
}

#[tokio::test]
async fn failed_event_append_aborts_the_comment() {
    let h = harness();
    let user = h.entities.add_user("Alice");
    let place = h.entities.add_place(user.id, "Rucker");
    h.log.fail_appends(true);

    let err = h
        .engine
        .insert_comment(user.id, Target::Place(place.id), "Great court!")
        .await
        .unwrap_err();

    assert!(matches!(err, EngagementError::TransactionAborted(_)));
    assert!(h.entities.comments().is_empty());
}

#[tokio::test]
async fn posting_a_place_and_story_emits_content_events() {
    let h = harness();
    let user = h.entities.add_user("Alice");

    let place = h
        .engine
        .insert_place(NewPlace {
            user_id: user.id,
            name: "Venice Beach".into(),
            description: "Boardwalk courts".into(),
            latitude: 33.98,
            longitude: -118.47,
            featured: vec![FeaturedImage {
                role: FeaturedRole::Court,
                image_url: "court.jpg".into(),
            }],
        })
        .await
        .unwrap();
    let place_id = place.content.place.id;

    let story = h
        .engine
        .insert_story(NewStory {
            user_id: user.id,
            place_id,
            name: "Sunset run".into(),
            description: "Five on five".into(),
            image_url: "sunset.jpg".into(),
        })
        .await
        .unwrap();

    assert_eq!(place.activity.kind, ActivityKind::PostedPlace);
    assert_eq!(story.activity.kind, ActivityKind::PostedStory);
    assert_eq!(story.activity.story_id(), Some(story.content.id));
    assert_eq!(h.log.events().len(), 2);

    let listed = h.engine.stories_for_place(place_id, StorySort::Latest).await.unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn comments_list_oldest_first_with_authors() {
    let h = harness();
    let alice = h.entities.add_user("Alice");
    let bob = h.entities.add_user("Bob");
    let place = h.entities.add_place(alice.id, "Rucker");
    let target = Target::Place(place.id);

    h.engine.insert_comment(alice.id, target, "first").await.unwrap();
    h.engine.insert_comment(bob.id, target, "second").await.unwrap();
    h.entities.remove_user(bob.id);

    let comments = h.engine.comments(target).await.unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].comment.text, "first");
    assert_eq!(comments[0].user.as_ref().map(|u| u.id), Some(alice.id));
    assert!(comments[1].user.is_none());

    let json = serde_json::to_value(&comments[0]).unwrap();
    assert_eq!(json["hoop_id"], place.id);
    assert_eq!(json["user"]["firstname"], "Alice");
}
