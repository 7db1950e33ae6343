use std::sync::Arc;

use chrono::{DateTime, Utc};

use hoopfeed_common::{
    Comment, Config, NewPlace, NewStory, PlaceId, Result, Story, StorySort, Target, UserId,
};
use hoopfeed_counters::CounterStore;
use hoopfeed_entities::{ContentWriter, EntityRepository, PlaceWithFeatured, Posted};
use hoopfeed_events::ActivityLog;

use crate::content::{CommentView, ContentService};
use crate::feed::{FeedHydrator, HydratedActivity, MissingReferencePolicy};
use crate::rankings::{Ranked, StoryRankings};
use crate::toggle::{LikeToggler, ToggleOutcome};
use crate::unseen::UnseenActivity;
use crate::views::ViewTracker;

/// The stores the engine runs against. Production wires Postgres and Redis;
/// tests wire the in-memory fakes.
#[derive(Clone)]
pub struct EngineDeps {
    pub log: Arc<dyn ActivityLog>,
    pub counters: Arc<dyn CounterStore>,
    pub entities: Arc<dyn EntityRepository>,
    pub writer: Arc<dyn ContentWriter>,
}

/// Every engagement operation behind one handle.
pub struct EngagementEngine {
    toggler: LikeToggler,
    feed: FeedHydrator,
    views: Arc<ViewTracker>,
    rankings: StoryRankings,
    content: ContentService,
    unseen: UnseenActivity,
}

impl EngagementEngine {
    pub fn new(deps: EngineDeps, config: &Config) -> Self {
        let views = Arc::new(ViewTracker::new(deps.counters));
        Self {
            toggler: LikeToggler::new(deps.log.clone()),
            feed: FeedHydrator::new(
                deps.log.clone(),
                deps.entities.clone(),
                config.feed_page_size,
                config.hydrate_concurrency,
            ),
            rankings: StoryRankings::new(deps.entities.clone(), deps.log.clone(), views.clone()),
            views,
            content: ContentService::new(deps.writer, deps.entities.clone()),
            unseen: UnseenActivity::new(deps.log, deps.entities, config.feed_page_size),
        }
    }

    pub fn with_policy(mut self, policy: MissingReferencePolicy) -> Self {
        self.feed = self.feed.with_policy(policy);
        self
    }

    // --- Likes ---

    pub async fn toggle_like(&self, user_id: UserId, target: Target) -> Result<ToggleOutcome> {
        self.toggler.toggle_like(user_id, target).await
    }

    pub async fn is_liked(&self, user_id: UserId, target: Target) -> Result<bool> {
        self.toggler.is_liked(user_id, target).await
    }

    pub async fn like_count(&self, target: Target) -> Result<i64> {
        self.toggler.like_count(target).await
    }

    // --- Feed ---

    pub async fn get_feed(
        &self,
        for_user: UserId,
        exclude_self: bool,
    ) -> Result<Vec<HydratedActivity>> {
        self.feed.get_feed(for_user, exclude_self).await
    }

    pub async fn mark_activity_checked(&self, user_id: UserId, at: DateTime<Utc>) -> Result<()> {
        self.unseen.mark_checked(user_id, at).await
    }

    pub async fn unseen_activity_count(&self, user_id: UserId) -> Result<i64> {
        self.unseen.unseen_count(user_id).await
    }

    // --- Views ---

    pub async fn record_view(&self, target: Target) -> Result<Option<i64>> {
        self.views.record_view(target).await
    }

    pub async fn get_view_count(&self, target: Target) -> Result<Option<i64>> {
        self.views.get_view_count(target).await
    }

    pub async fn stories_for_place(
        &self,
        place_id: PlaceId,
        sort: StorySort,
    ) -> Result<Vec<Ranked<Story>>> {
        self.rankings.stories_for_place(place_id, sort).await
    }

    // --- Content ---

    pub async fn insert_comment(
        &self,
        user_id: UserId,
        target: Target,
        text: &str,
    ) -> Result<Posted<Comment>> {
        self.content.insert_comment(user_id, target, text).await
    }

    pub async fn insert_story(&self, story: NewStory) -> Result<Posted<Story>> {
        self.content.insert_story(story).await
    }

    pub async fn insert_place(&self, place: NewPlace) -> Result<Posted<PlaceWithFeatured>> {
        self.content.insert_place(place).await
    }

    pub async fn comments(&self, target: Target) -> Result<Vec<CommentView>> {
        self.content.comments(target).await
    }
}
