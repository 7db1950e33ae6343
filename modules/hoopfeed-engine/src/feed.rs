//! Feed hydration: raw activity events joined with the user and the place or
//! story they reference.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use hoopfeed_common::{
    Activity, ActivityId, ActivityKind, EngagementError, Place, PlaceId, Result, Story, StoryId,
    Target, User, UserId,
};
use hoopfeed_entities::EntityRepository;
use hoopfeed_events::{ActivityLog, FeedQuery};

/// What to do when an event references an entity that cannot be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingReferencePolicy {
    /// Keep the event and omit the attachment.
    #[default]
    PartialResult,
    /// Fail the whole feed with `NotFound`.
    Strict,
}

/// An attachment that could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReference {
    User(UserId),
    Place(PlaceId),
    Story(StoryId),
}

impl std::fmt::Display for MissingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingReference::User(id) => write!(f, "user {id}"),
            MissingReference::Place(id) => write!(f, "hoop {id}"),
            MissingReference::Story(id) => write!(f, "story {id}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttachedData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(rename = "hoop", skip_serializing_if = "Option::is_none")]
    pub place: Option<Place>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story: Option<Story>,
}

/// A feed entry. Serializes as
/// `{"user_id", "type", "hoop_id"?, "story_id"?, "created_at", "data"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HydratedActivity {
    #[serde(skip)]
    pub id: ActivityId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(flatten)]
    pub target: Target,
    pub created_at: DateTime<Utc>,
    pub data: AttachedData,
    #[serde(skip)]
    pub missing: Vec<MissingReference>,
}

impl HydratedActivity {
    fn bare(activity: Activity) -> Self {
        Self {
            id: activity.id,
            user_id: activity.user_id,
            kind: activity.kind,
            target: activity.target,
            created_at: activity.created_at,
            data: AttachedData::default(),
            missing: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

pub struct FeedHydrator {
    log: Arc<dyn ActivityLog>,
    entities: Arc<dyn EntityRepository>,
    page_size: usize,
    concurrency: usize,
    policy: MissingReferencePolicy,
}

impl FeedHydrator {
    pub fn new(
        log: Arc<dyn ActivityLog>,
        entities: Arc<dyn EntityRepository>,
        page_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            log,
            entities,
            page_size,
            concurrency: concurrency.max(1),
            policy: MissingReferencePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MissingReferencePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> MissingReferencePolicy {
        self.policy
    }

    /// The most recent events visible to `for_user`, hydrated, newest first.
    pub async fn get_feed(
        &self,
        for_user: UserId,
        exclude_self: bool,
    ) -> Result<Vec<HydratedActivity>> {
        if for_user <= 0 {
            return Err(EngagementError::InvalidInput(format!(
                "user id must be positive, got {for_user}"
            )));
        }

        let query = FeedQuery::new(for_user, exclude_self, self.page_size);
        let events = self.log.read_feed(&query).await?;
        let window = events.len();

        // `buffered` keeps the log's order while lookups overlap.
        let lookups = events.into_iter().map(|a| self.hydrate(a));
        let feed: Vec<HydratedActivity> = stream::iter(lookups)
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let degraded = feed.iter().filter(|a| !a.is_complete()).count();
        debug!(user_id = for_user, exclude_self, events = window, degraded, "Feed assembled");
        Ok(feed)
    }

    /// Attach the actor and, by kind, the referenced place or story.
    pub async fn hydrate(&self, activity: Activity) -> Result<HydratedActivity> {
        let mut hydrated = HydratedActivity::bare(activity);

        let (user, target) = futures::join!(
            self.entities.user(hydrated.user_id),
            self.load_target(hydrated.target)
        );

        let actor = MissingReference::User(hydrated.user_id);
        hydrated.data.user = self.resolve(&mut hydrated, actor, user)?;

        match target {
            Loaded::Place(id, place) => {
                let reference = MissingReference::Place(id);
                hydrated.data.place = self.resolve(&mut hydrated, reference, place)?;
            }
            Loaded::Story(id, story) => {
                let reference = MissingReference::Story(id);
                hydrated.data.story = self.resolve(&mut hydrated, reference, story)?;
            }
        }

        Ok(hydrated)
    }

    async fn load_target(&self, target: Target) -> Loaded {
        match target {
            Target::Place(id) => Loaded::Place(id, self.entities.place(id).await),
            Target::Story(id) => Loaded::Story(id, self.entities.story(id).await),
        }
    }

    fn resolve<T>(
        &self,
        hydrated: &mut HydratedActivity,
        reference: MissingReference,
        lookup: Result<Option<T>>,
    ) -> Result<Option<T>> {
        let error = match lookup {
            Ok(Some(entity)) => return Ok(Some(entity)),
            Ok(None) => EngagementError::NotFound(reference.to_string()),
            Err(e) => e,
        };

        match self.policy {
            MissingReferencePolicy::Strict => Err(match error {
                EngagementError::NotFound(_) => error,
                other => EngagementError::NotFound(format!("{reference}: {other}")),
            }),
            MissingReferencePolicy::PartialResult => {
                warn!(
                    activity_id = hydrated.id,
                    reference = %reference,
                    error = %error,
                    "Omitting unresolvable feed attachment"
                );
                hydrated.missing.push(reference);
                Ok(None)
            }
        }
    }
}

enum Loaded {
    Place(PlaceId, Result<Option<Place>>),
    Story(StoryId, Result<Option<Story>>),
}
