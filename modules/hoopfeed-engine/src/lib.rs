//! Engagement & feed engine: like toggling over the activity log, feed
//! hydration, view counts and story rankings, and transactional posting.
//!
//! All stores are injected as trait objects; see [`EngineDeps`].

pub mod content;
pub mod engine;
pub mod feed;
pub mod rankings;
pub mod toggle;
pub mod unseen;
pub mod views;

pub use content::{CommentView, ContentService};
pub use engine::{EngagementEngine, EngineDeps};
pub use feed::{
    AttachedData, FeedHydrator, HydratedActivity, MissingReference, MissingReferencePolicy,
};
pub use rankings::{rank_desc, Ranked, StoryRankings};
pub use toggle::{LikeToggler, ToggleOutcome};
pub use unseen::UnseenActivity;
pub use views::ViewTracker;
