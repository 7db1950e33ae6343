//! PgEntities: users, places (`hoop`), stories and comments in Postgres.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};

use hoopfeed_common::{
    bounded, ActivityKind, Comment, EngagementError, NewActivity, NewComment, NewPlace, NewStory,
    Place, PlaceId, Result, Story, StoryId, Target, TargetType, User, UserId,
};
use hoopfeed_events::{append_in, store_error};

use crate::repository::{ContentWriter, EntityRepository, PlaceWithFeatured, Posted};

const USER_COLUMNS: &str = "id, firstname, lastname, description, image_url, created_at, updated_at";
const PLACE_COLUMNS: &str =
    "id, user_id, name, description, latitude, longitude, created_at, updated_at";
const STORY_COLUMNS: &str =
    "id, hoop_id, user_id, name, description, image_url, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, user_id, hoop_id, story_id, text, created_at, updated_at";

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    firstname: Option<String>,
    lastname: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            firstname: row.firstname,
            lastname: row.lastname,
            description: row.description,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlaceRow {
    id: i64,
    user_id: i64,
    name: String,
    description: String,
    latitude: f64,
    longitude: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PlaceRow> for Place {
    fn from(row: PlaceRow) -> Self {
        Place {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            latitude: row.latitude,
            longitude: row.longitude,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StoryRow {
    id: i64,
    hoop_id: i64,
    user_id: i64,
    name: String,
    description: String,
    image_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoryRow> for Story {
    fn from(row: StoryRow) -> Self {
        Story {
            id: row.id,
            place_id: row.hoop_id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: i64,
    user_id: i64,
    hoop_id: Option<i64>,
    story_id: Option<i64>,
    text: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CommentRow> for Comment {
    type Error = EngagementError;

    fn try_from(row: CommentRow) -> Result<Self> {
        Ok(Comment {
            id: row.id,
            user_id: row.user_id,
            target: Target::from_columns(row.hoop_id, row.story_id)?,
            text: row.text,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Anything that goes wrong between BEGIN and COMMIT rolls the whole write back.
fn aborted(e: EngagementError) -> EngagementError {
    match e {
        EngagementError::TransactionAborted(_) => e,
        other => EngagementError::TransactionAborted(other.to_string()),
    }
}

fn aborted_sql(e: sqlx::Error) -> EngagementError {
    aborted(store_error(e))
}

async fn insert_story_row(conn: &mut PgConnection, story: &NewStory) -> sqlx::Result<StoryRow> {
    sqlx::query_as::<_, StoryRow>(&format!(
        r#"
        INSERT INTO story (hoop_id, user_id, name, description, image_url)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {STORY_COLUMNS}
        "#
    ))
    .bind(story.place_id)
    .bind(story.user_id)
    .bind(&story.name)
    .bind(&story.description)
    .bind(&story.image_url)
    .fetch_one(&mut *conn)
    .await
}

// ---------------------------------------------------------------------------
// PgEntities
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgEntities {
    pool: PgPool,
    timeout: Duration,
}

impl PgEntities {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl EntityRepository for PgEntities {
    async fn user(&self, id: UserId) -> Result<Option<User>> {
        bounded(self.timeout, "entities.user", async {
            let row = sqlx::query_as::<_, UserRow>(&format!(
                r#"SELECT {USER_COLUMNS} FROM "user" WHERE id = $1"#
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            Ok(row.map(User::from))
        })
        .await
    }

    async fn place(&self, id: PlaceId) -> Result<Option<Place>> {
        bounded(self.timeout, "entities.place", async {
            let row = sqlx::query_as::<_, PlaceRow>(&format!(
                "SELECT {PLACE_COLUMNS} FROM hoop WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            Ok(row.map(Place::from))
        })
        .await
    }

    async fn story(&self, id: StoryId) -> Result<Option<Story>> {
        bounded(self.timeout, "entities.story", async {
            let row = sqlx::query_as::<_, StoryRow>(&format!(
                "SELECT {STORY_COLUMNS} FROM story WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            Ok(row.map(Story::from))
        })
        .await
    }

    async fn stories_for_place(&self, place_id: PlaceId) -> Result<Vec<Story>> {
        bounded(self.timeout, "entities.stories_for_place", async {
            let rows = sqlx::query_as::<_, StoryRow>(&format!(
                r#"
                SELECT {STORY_COLUMNS}
                FROM story
                WHERE hoop_id = $1
                ORDER BY created_at DESC, id DESC
                "#
            ))
            .bind(place_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

            Ok(rows.into_iter().map(Story::from).collect())
        })
        .await
    }

    async fn comments_for(&self, target: Target) -> Result<Vec<Comment>> {
        bounded(self.timeout, "entities.comments_for", async {
            let rows = sqlx::query_as::<_, CommentRow>(&format!(
                r#"
                SELECT {COMMENT_COLUMNS}
                FROM comment
                WHERE hoop_id IS NOT DISTINCT FROM $1
                  AND story_id IS NOT DISTINCT FROM $2
                ORDER BY created_at ASC, id ASC
                "#
            ))
            .bind(target.place_id())
            .bind(target.story_id())
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

            let comments = rows
                .into_iter()
                .filter_map(|row| {
                    let id = row.id;
                    Comment::try_from(row)
                        .map_err(|e| warn!(comment_id = id, error = %e, "Skipping corrupt comment row"))
                        .ok()
                })
                .collect();
            Ok(comments)
        })
        .await
    }

    async fn last_activity_check(&self, user_id: UserId) -> Result<Option<DateTime<Utc>>> {
        bounded(self.timeout, "entities.last_activity_check", async {
            let row = sqlx::query_as::<_, (Option<DateTime<Utc>>,)>(
                r#"SELECT last_activity_check_at FROM "user" WHERE id = $1"#,
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            match row {
                Some((checked_at,)) => Ok(checked_at),
                None => Err(EngagementError::NotFound(format!("user {user_id}"))),
            }
        })
        .await
    }

    async fn mark_activity_checked(&self, user_id: UserId, at: DateTime<Utc>) -> Result<()> {
        bounded(self.timeout, "entities.mark_activity_checked", async {
            let result = sqlx::query(
                r#"
                UPDATE "user"
                SET last_activity_check_at = $2, updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

            if result.rows_affected() == 0 {
                return Err(EngagementError::NotFound(format!("user {user_id}")));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ContentWriter for PgEntities {
    async fn insert_comment(&self, comment: NewComment) -> Result<Posted<Comment>> {
        let activity = NewActivity::new(
            comment.user_id,
            ActivityKind::commented(comment.target.target_type()),
            comment.target,
        )?;

        bounded(self.timeout, "content.insert_comment", async {
            let mut tx = self.pool.begin().await.map_err(store_error)?;

            let row = sqlx::query_as::<_, CommentRow>(&format!(
                r#"
                INSERT INTO comment (user_id, hoop_id, story_id, text)
                VALUES ($1, $2, $3, $4)
                RETURNING {COMMENT_COLUMNS}
                "#
            ))
            .bind(comment.user_id)
            .bind(comment.target.place_id())
            .bind(comment.target.story_id())
            .bind(&comment.text)
            .fetch_one(&mut *tx)
            .await
            .map_err(aborted_sql)?;

            let stored = append_in(&mut *tx, &activity).await.map_err(aborted)?;
            tx.commit().await.map_err(aborted_sql)?;

            let content = Comment::try_from(row)?;
            info!(
                comment_id = content.id,
                activity_id = stored.id,
                user_id = content.user_id,
                target = %content.target,
                "Comment posted"
            );
            Ok(Posted {
                content,
                activity: stored,
            })
        })
        .await
    }

    async fn insert_story(&self, story: NewStory) -> Result<Posted<Story>> {
        story.validate()?;

        bounded(self.timeout, "content.insert_story", async {
            let mut tx = self.pool.begin().await.map_err(store_error)?;

            let row = insert_story_row(&mut *tx, &story).await.map_err(aborted_sql)?;
            let activity = NewActivity::new(
                story.user_id,
                ActivityKind::posted(TargetType::Story),
                Target::Story(row.id),
            )?;
            let stored = append_in(&mut *tx, &activity).await.map_err(aborted)?;
            tx.commit().await.map_err(aborted_sql)?;

            let content = Story::from(row);
            info!(
                story_id = content.id,
                place_id = content.place_id,
                user_id = content.user_id,
                "Story posted"
            );
            Ok(Posted {
                content,
                activity: stored,
            })
        })
        .await
    }

    async fn insert_place(&self, place: NewPlace) -> Result<Posted<PlaceWithFeatured>> {
        place.validate()?;

        bounded(self.timeout, "content.insert_place", async {
            let mut tx = self.pool.begin().await.map_err(store_error)?;

            let row = sqlx::query_as::<_, PlaceRow>(&format!(
                r#"
                INSERT INTO hoop (user_id, name, description, latitude, longitude)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {PLACE_COLUMNS}
                "#
            ))
            .bind(place.user_id)
            .bind(&place.name)
            .bind(&place.description)
            .bind(place.latitude)
            .bind(place.longitude)
            .fetch_one(&mut *tx)
            .await
            .map_err(aborted_sql)?;

            let mut featured = Vec::with_capacity(place.featured.len());
            for (role, story) in place.featured_stories(row.id) {
                let story_row = insert_story_row(&mut *tx, &story).await.map_err(aborted_sql)?;

                sqlx::query(
                    "INSERT INTO hoop_featured_story (hoop_id, story_id, role) VALUES ($1, $2, $3)",
                )
                .bind(row.id)
                .bind(story_row.id)
                .bind(role.as_str())
                .execute(&mut *tx)
                .await
                .map_err(aborted_sql)?;

                featured.push((role, Story::from(story_row)));
            }

            let activity = NewActivity::new(
                place.user_id,
                ActivityKind::posted(TargetType::Place),
                Target::Place(row.id),
            )?;
            let stored = append_in(&mut *tx, &activity).await.map_err(aborted)?;
            tx.commit().await.map_err(aborted_sql)?;

            let content = Place::from(row);
            info!(
                place_id = content.id,
                user_id = content.user_id,
                featured = featured.len(),
                "Place posted"
            );
            Ok(Posted {
                content: PlaceWithFeatured {
                    place: content,
                    featured,
                },
                activity: stored,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_inside_a_transaction_become_aborts() {
        let err = aborted(EngagementError::StoreUnavailable("connection reset".into()));
        assert!(matches!(err, EngagementError::TransactionAborted(ref m) if m.contains("connection reset")));

        let err = aborted_sql(sqlx::Error::PoolClosed);
        assert!(matches!(err, EngagementError::TransactionAborted(_)));
    }

    #[test]
    fn comment_rows_need_exactly_one_target() {
        let now = Utc::now();
        let row = CommentRow {
            id: 1,
            user_id: 2,
            hoop_id: None,
            story_id: None,
            text: "Nice".into(),
            created_at: now,
            updated_at: now,
        };
        assert!(Comment::try_from(row).is_err());
    }
}
