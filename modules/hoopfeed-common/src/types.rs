//! Event taxonomy and target addressing. Shared by every engagement crate.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngagementError, Result};

pub type UserId = i64;
pub type PlaceId = i64;
pub type StoryId = i64;
pub type ActivityId = i64;
pub type CommentId = i64;

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// The kind of entity an engagement points at.
///
/// Places are persisted (and serialized) under their historical name `hoop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[serde(alias = "hoop")]
    Place,
    Story,
}

impl TargetType {
    /// Storage name: column prefix and counter key prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Place => "hoop",
            TargetType::Story => "story",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = EngagementError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "place" | "hoop" => Ok(TargetType::Place),
            "story" => Ok(TargetType::Story),
            other => Err(EngagementError::InvalidInput(format!(
                "unknown target type: {other:?}"
            ))),
        }
    }
}

/// A typed reference to a place or a story. Exactly one id is ever set, so the
/// "one of hoop_id / story_id" rule holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TargetColumns", into = "TargetColumns")]
pub enum Target {
    Place(PlaceId),
    Story(StoryId),
}

impl Target {
    pub fn new(target_type: TargetType, id: i64) -> Self {
        match target_type {
            TargetType::Place => Target::Place(id),
            TargetType::Story => Target::Story(id),
        }
    }

    /// Parse caller input (`"place"`/`"hoop"`/`"story"` plus an id).
    pub fn parse(target_type: &str, id: i64) -> Result<Self> {
        let target = Target::new(target_type.parse()?, id);
        target.validate()?;
        Ok(target)
    }

    /// Rebuild a target from the nullable `hoop_id` / `story_id` column pair.
    pub fn from_columns(hoop_id: Option<i64>, story_id: Option<i64>) -> Result<Self> {
        match (hoop_id, story_id) {
            (Some(id), None) => Ok(Target::Place(id)),
            (None, Some(id)) => Ok(Target::Story(id)),
            (Some(_), Some(_)) => Err(EngagementError::Corrupt(
                "both hoop_id and story_id are set".into(),
            )),
            (None, None) => Err(EngagementError::Corrupt(
                "neither hoop_id nor story_id is set".into(),
            )),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id() <= 0 {
            return Err(EngagementError::InvalidInput(format!(
                "{} id must be positive, got {}",
                self.target_type(),
                self.id()
            )));
        }
        Ok(())
    }

    pub fn target_type(&self) -> TargetType {
        match self {
            Target::Place(_) => TargetType::Place,
            Target::Story(_) => TargetType::Story,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Target::Place(id) | Target::Story(id) => *id,
        }
    }

    pub fn place_id(&self) -> Option<PlaceId> {
        match self {
            Target::Place(id) => Some(*id),
            Target::Story(_) => None,
        }
    }

    pub fn story_id(&self) -> Option<StoryId> {
        match self {
            Target::Story(id) => Some(*id),
            Target::Place(_) => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_type(), self.id())
    }
}

/// Column-shaped form of [`Target`], used for serde.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TargetColumns {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hoop_id: Option<PlaceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_id: Option<StoryId>,
}

impl From<Target> for TargetColumns {
    fn from(target: Target) -> Self {
        Self {
            hoop_id: target.place_id(),
            story_id: target.story_id(),
        }
    }
}

impl TryFrom<TargetColumns> for Target {
    type Error = EngagementError;

    fn try_from(cols: TargetColumns) -> Result<Self> {
        Target::from_columns(cols.hoop_id, cols.story_id)
    }
}

// ---------------------------------------------------------------------------
// Kind taxonomy
// ---------------------------------------------------------------------------

/// Partition of the integer tag space. New kinds are added inside their
/// category's range so tags never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindCategory {
    Content,
    Comment,
    Like,
}

impl KindCategory {
    pub fn tag_range(&self) -> RangeInclusive<i64> {
        match self {
            KindCategory::Content => 1..=99,
            KindCategory::Comment => 100..=199,
            KindCategory::Like => 200..=299,
        }
    }
}

/// What a user did. Stored as an integer tag in the `activity.type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum ActivityKind {
    PostedPlace,
    PostedStory,
    CommentedOnPlace,
    CommentedOnStory,
    LikedPlace,
    LikedStory,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 6] = [
        ActivityKind::PostedPlace,
        ActivityKind::PostedStory,
        ActivityKind::CommentedOnPlace,
        ActivityKind::CommentedOnStory,
        ActivityKind::LikedPlace,
        ActivityKind::LikedStory,
    ];

    pub fn tag(self) -> i64 {
        match self {
            ActivityKind::PostedPlace => 1,
            ActivityKind::PostedStory => 2,
            ActivityKind::CommentedOnPlace => 101,
            ActivityKind::CommentedOnStory => 102,
            ActivityKind::LikedPlace => 201,
            ActivityKind::LikedStory => 202,
        }
    }

    pub fn from_tag(tag: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn category(self) -> KindCategory {
        match self {
            ActivityKind::PostedPlace | ActivityKind::PostedStory => KindCategory::Content,
            ActivityKind::CommentedOnPlace | ActivityKind::CommentedOnStory => {
                KindCategory::Comment
            }
            ActivityKind::LikedPlace | ActivityKind::LikedStory => KindCategory::Like,
        }
    }

    pub fn target_type(self) -> TargetType {
        match self {
            ActivityKind::PostedPlace
            | ActivityKind::CommentedOnPlace
            | ActivityKind::LikedPlace => TargetType::Place,
            ActivityKind::PostedStory
            | ActivityKind::CommentedOnStory
            | ActivityKind::LikedStory => TargetType::Story,
        }
    }

    pub fn posted(target_type: TargetType) -> Self {
        match target_type {
            TargetType::Place => ActivityKind::PostedPlace,
            TargetType::Story => ActivityKind::PostedStory,
        }
    }

    pub fn commented(target_type: TargetType) -> Self {
        match target_type {
            TargetType::Place => ActivityKind::CommentedOnPlace,
            TargetType::Story => ActivityKind::CommentedOnStory,
        }
    }

    pub fn liked(target_type: TargetType) -> Self {
        match target_type {
            TargetType::Place => ActivityKind::LikedPlace,
            TargetType::Story => ActivityKind::LikedStory,
        }
    }

    pub fn is_like(self) -> bool {
        self.category() == KindCategory::Like
    }
}

impl From<ActivityKind> for i64 {
    fn from(kind: ActivityKind) -> i64 {
        kind.tag()
    }
}

impl TryFrom<i64> for ActivityKind {
    type Error = EngagementError;

    fn try_from(tag: i64) -> Result<Self> {
        ActivityKind::from_tag(tag)
            .ok_or_else(|| EngagementError::Corrupt(format!("unknown activity tag {tag}")))
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// An event as stored in the activity log. Immutable; the store assigns
/// `id` (insertion sequence) and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(flatten)]
    pub target: Target,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    /// Rebuild an event from its raw column values, enforcing that the
    /// populated target column matches the kind.
    pub fn from_columns(
        id: ActivityId,
        user_id: UserId,
        tag: i64,
        hoop_id: Option<i64>,
        story_id: Option<i64>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        let kind = ActivityKind::try_from(tag)?;
        let target = Target::from_columns(hoop_id, story_id)?;
        if kind.target_type() != target.target_type() {
            return Err(EngagementError::Corrupt(format!(
                "activity {id}: {kind:?} points at {target}"
            )));
        }
        Ok(Self {
            id,
            user_id,
            kind,
            target,
            created_at,
        })
    }

    pub fn place_id(&self) -> Option<PlaceId> {
        self.target.place_id()
    }

    pub fn story_id(&self) -> Option<StoryId> {
        self.target.story_id()
    }

    /// Most recent first; ties fall back to the store-assigned sequence.
    pub fn recency_cmp(&self, other: &Activity) -> std::cmp::Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// An event to be appended. The caller builds this; the store assigns id/ts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewActivity {
    pub user_id: UserId,
    pub kind: ActivityKind,
    pub target: Target,
}

impl NewActivity {
    pub fn new(user_id: UserId, kind: ActivityKind, target: Target) -> Result<Self> {
        if user_id <= 0 {
            return Err(EngagementError::InvalidInput(format!(
                "user id must be positive, got {user_id}"
            )));
        }
        target.validate()?;
        if kind.target_type() != target.target_type() {
            return Err(EngagementError::InvalidInput(format!(
                "{kind:?} cannot point at {target}"
            )));
        }
        Ok(Self {
            user_id,
            kind,
            target,
        })
    }
}

/// Identity of a like: at most one undeleted like event exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LikeKey {
    pub user_id: UserId,
    pub target: Target,
}

impl LikeKey {
    pub fn new(user_id: UserId, target: Target) -> Result<Self> {
        if user_id <= 0 {
            return Err(EngagementError::InvalidInput(format!(
                "user id must be positive, got {user_id}"
            )));
        }
        target.validate()?;
        Ok(Self { user_id, target })
    }

    pub fn kind(&self) -> ActivityKind {
        ActivityKind::liked(self.target.target_type())
    }

    pub fn to_new_activity(&self) -> NewActivity {
        NewActivity {
            user_id: self.user_id,
            kind: self.kind(),
            target: self.target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_and_sit_in_their_category_range() {
        for kind in ActivityKind::ALL {
            assert_eq!(ActivityKind::from_tag(kind.tag()), Some(kind));
            assert!(kind.category().tag_range().contains(&kind.tag()));
        }
    }

    #[test]
    fn liked_place_and_liked_story_have_distinct_tags() {
        assert_ne!(ActivityKind::LikedPlace.tag(), ActivityKind::LikedStory.tag());
    }

    #[test]
    fn unknown_tag_is_corrupt() {
        let err = ActivityKind::try_from(150).unwrap_err();
        assert!(matches!(err, EngagementError::Corrupt(_)));
    }

    #[test]
    fn target_type_parses_place_aliases() {
        assert_eq!("place".parse::<TargetType>().unwrap(), TargetType::Place);
        assert_eq!("HOOP".parse::<TargetType>().unwrap(), TargetType::Place);
        assert_eq!("story".parse::<TargetType>().unwrap(), TargetType::Story);
        assert!("court".parse::<TargetType>().is_err());
    }

    #[test]
    fn target_parse_rejects_non_positive_ids() {
        assert!(matches!(
            Target::parse("story", 0),
            Err(EngagementError::InvalidInput(_))
        ));
        assert_eq!(Target::parse("hoop", 7).unwrap(), Target::Place(7));
    }

    #[test]
    fn from_columns_requires_exactly_one_target() {
        assert_eq!(Target::from_columns(Some(3), None).unwrap(), Target::Place(3));
        assert_eq!(Target::from_columns(None, Some(4)).unwrap(), Target::Story(4));
        assert!(Target::from_columns(Some(3), Some(4)).is_err());
        assert!(Target::from_columns(None, None).is_err());
    }

    #[test]
    fn activity_rejects_kind_target_mismatch() {
        let err = Activity::from_columns(1, 1, 201, None, Some(9), Utc::now()).unwrap_err();
        assert!(matches!(err, EngagementError::Corrupt(_)));
    }

    #[test]
    fn activity_serializes_with_tag_and_target_column() {
        let activity = Activity::from_columns(5, 2, 102, None, Some(9), Utc::now()).unwrap();
        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json["type"], 102);
        assert_eq!(json["story_id"], 9);
        assert!(json.get("hoop_id").is_none());
    }

    #[test]
    fn new_activity_checks_kind_against_target() {
        assert!(NewActivity::new(1, ActivityKind::LikedPlace, Target::Story(3)).is_err());
        assert!(NewActivity::new(1, ActivityKind::LikedStory, Target::Story(3)).is_ok());
    }

    #[test]
    fn like_key_maps_target_to_like_kind() {
        let key = LikeKey::new(1, Target::Place(2)).unwrap();
        assert_eq!(key.kind(), ActivityKind::LikedPlace);
        assert_eq!(key.to_new_activity().kind, ActivityKind::LikedPlace);
    }
}
