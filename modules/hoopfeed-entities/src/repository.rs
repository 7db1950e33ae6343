use async_trait::async_trait;
use chrono::{DateTime, Utc};

use hoopfeed_common::{
    Activity, Comment, FeaturedRole, NewComment, NewPlace, NewStory, Place, PlaceId, Result,
    Story, StoryId, Target, User, UserId,
};

/// Read-side lookups. `Ok(None)` means the entity does not exist (or was
/// deleted); errors are transport failures.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    async fn user(&self, id: UserId) -> Result<Option<User>>;

    async fn place(&self, id: PlaceId) -> Result<Option<Place>>;

    async fn story(&self, id: StoryId) -> Result<Option<Story>>;

    /// Stories posted at a place, newest first.
    async fn stories_for_place(&self, place_id: PlaceId) -> Result<Vec<Story>>;

    /// Comments on a target, oldest first.
    async fn comments_for(&self, target: Target) -> Result<Vec<Comment>>;

    /// When the user last looked at their feed. `NotFound` for unknown users.
    async fn last_activity_check(&self, user_id: UserId) -> Result<Option<DateTime<Utc>>>;

    async fn mark_activity_checked(&self, user_id: UserId, at: DateTime<Utc>) -> Result<()>;
}

/// A content row together with the event appended in the same transaction.
#[derive(Debug, Clone)]
pub struct Posted<T> {
    pub content: T,
    pub activity: Activity,
}

#[derive(Debug, Clone)]
pub struct PlaceWithFeatured {
    pub place: Place,
    pub featured: Vec<(FeaturedRole, Story)>,
}

/// Content writes. Each call commits the content row(s) and the matching
/// activity event atomically: both land or neither does.
#[async_trait]
pub trait ContentWriter: Send + Sync {
    async fn insert_comment(&self, comment: NewComment) -> Result<Posted<Comment>>;

    async fn insert_story(&self, story: NewStory) -> Result<Posted<Story>>;

    /// The place, one story per featured image, and a single `PostedPlace` event.
    async fn insert_place(&self, place: NewPlace) -> Result<Posted<PlaceWithFeatured>>;
}
