//! Entities referenced by engagement events, plus their write-side inputs.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngagementError, Result};
use crate::types::{CommentId, PlaceId, StoryId, Target, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A basketball court, `hoop` in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: PlaceId,
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A photo story posted at a place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    #[serde(rename = "hoop_id")]
    pub place_id: PlaceId,
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub target: Target,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Write-side inputs
// ---------------------------------------------------------------------------

/// Rejects ids that cannot belong to a stored user.
pub fn require_user(user_id: UserId) -> Result<()> {
    if user_id <= 0 {
        return Err(EngagementError::InvalidInput(format!(
            "user id must be positive, got {user_id}"
        )));
    }
    Ok(())
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EngagementError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub user_id: UserId,
    pub target: Target,
    pub text: String,
}

impl NewComment {
    /// Validates ids and text. The stored text is trimmed.
    pub fn new(user_id: UserId, target: Target, text: &str) -> Result<Self> {
        require_user(user_id)?;
        target.validate()?;
        require_text("comment text", text)?;
        Ok(Self {
            user_id,
            target,
            text: text.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStory {
    pub user_id: UserId,
    pub place_id: PlaceId,
    pub name: String,
    pub description: String,
    pub image_url: String,
}

impl NewStory {
    pub fn validate(&self) -> Result<()> {
        require_user(self.user_id)?;
        Target::Place(self.place_id).validate()?;
        require_text("story name", &self.name)?;
        require_text("story image url", &self.image_url)
    }
}

/// Which featured slot a place image fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeaturedRole {
    Hoop,
    Court,
    Crew,
}

impl FeaturedRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeaturedRole::Hoop => "hoop",
            FeaturedRole::Court => "court",
            FeaturedRole::Crew => "crew",
        }
    }
}

impl fmt::Display for FeaturedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FeaturedRole {
    type Err = EngagementError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hoop" => Ok(FeaturedRole::Hoop),
            "court" => Ok(FeaturedRole::Court),
            "crew" => Ok(FeaturedRole::Crew),
            other => Err(EngagementError::InvalidInput(format!(
                "unknown featured role: {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeaturedImage {
    pub role: FeaturedRole,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlace {
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub featured: Vec<FeaturedImage>,
}

impl NewPlace {
    pub fn validate(&self) -> Result<()> {
        require_user(self.user_id)?;
        require_text("place name", &self.name)?;
        require_text("place description", &self.description)?;
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(EngagementError::InvalidInput(format!(
                "latitude out of range: {}",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(EngagementError::InvalidInput(format!(
                "longitude out of range: {}",
                self.longitude
            )));
        }
        let mut roles = HashSet::new();
        for image in &self.featured {
            require_text("featured image url", &image.image_url)?;
            if !roles.insert(image.role) {
                return Err(EngagementError::InvalidInput(format!(
                    "featured role {} given more than once",
                    image.role
                )));
            }
        }
        Ok(())
    }

    /// Stories created alongside the place, one per featured image.
    pub fn featured_stories(&self, place_id: PlaceId) -> Vec<(FeaturedRole, NewStory)> {
        self.featured
            .iter()
            .map(|image| {
                (
                    image.role,
                    NewStory {
                        user_id: self.user_id,
                        place_id,
                        name: self.name.clone(),
                        description: self.description.clone(),
                        image_url: image.image_url.clone(),
                    },
                )
            })
            .collect()
    }
}

/// Sort orders available when listing a place's stories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorySort {
    Latest,
    MostViewed,
    MostLiked,
    MostCommented,
}

impl std::str::FromStr for StorySort {
    type Err = EngagementError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(StorySort::Latest),
            "mostviewed" => Ok(StorySort::MostViewed),
            "mostliked" => Ok(StorySort::MostLiked),
            "mostcommented" => Ok(StorySort::MostCommented),
            other => Err(EngagementError::InvalidInput(format!("unknown sort: {other:?}"))),
        }
    }
}
