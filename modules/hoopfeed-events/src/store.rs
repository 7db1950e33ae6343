//! PgActivityLog: activity table in Postgres.
//!
//! Layout: `activity(id BIGSERIAL, user_id, type, hoop_id NULL, story_id NULL, created_at)`.
//! `type` is the integer kind tag. A unique index over like tags backs the
//! one-like-per-(actor, target, type) rule.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, warn};

use hoopfeed_common::{
    bounded, Activity, ActivityId, ActivityKind, EngagementError, KindCategory, LikeKey,
    NewActivity, Result, Target, TargetType, UserId,
};

use crate::log::{ActivityLog, FeedQuery};

/// Name of the unique index over like events.
pub const LIKE_UNIQUE_INDEX: &str = "activity_like_once";

const ACTIVITY_COLUMNS: &str = "id, user_id, type, hoop_id, story_id, created_at";

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: i64,
    user_id: i64,
    #[sqlx(rename = "type")]
    kind: i64,
    hoop_id: Option<i64>,
    story_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for Activity {
    type Error = EngagementError;

    fn try_from(row: ActivityRow) -> Result<Self> {
        Activity::from_columns(
            row.id,
            row.user_id,
            row.kind,
            row.hoop_id,
            row.story_id,
            row.created_at,
        )
    }
}

/// Rows that break the event invariants are logged and dropped so one bad
/// row never fails a whole read.
fn decode_rows(rows: Vec<ActivityRow>) -> Vec<Activity> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match Activity::try_from(row) {
                Ok(activity) => Some(activity),
                Err(e) => {
                    warn!(activity_id = id, error = %e, "Skipping corrupt activity row");
                    None
                }
            }
        })
        .collect()
}

/// Map a driver error onto the engagement taxonomy.
pub fn store_error(e: sqlx::Error) -> EngagementError {
    match e {
        sqlx::Error::RowNotFound => EngagementError::NotFound("row not found".into()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            if db.constraint() == Some(LIKE_UNIQUE_INDEX) {
                EngagementError::DuplicateLike
            } else {
                EngagementError::InvalidInput(db.message().to_string())
            }
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            EngagementError::NotFound(db.message().to_string())
        }
        other => EngagementError::StoreUnavailable(other.to_string()),
    }
}

/// Append an event on an existing connection, typically inside a transaction
/// that also writes the content row the event refers to.
pub async fn append_in(conn: &mut PgConnection, activity: &NewActivity) -> Result<Activity> {
    let row = sqlx::query_as::<_, ActivityRow>(&format!(
        r#"
        INSERT INTO activity (user_id, type, hoop_id, story_id)
        VALUES ($1, $2, $3, $4)
        RETURNING {ACTIVITY_COLUMNS}
        "#
    ))
    .bind(activity.user_id)
    .bind(activity.kind.tag())
    .bind(activity.target.place_id())
    .bind(activity.target.story_id())
    .fetch_one(&mut *conn)
    .await
    .map_err(store_error)?;

    Activity::try_from(row)
}

// ---------------------------------------------------------------------------
// PgActivityLog
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgActivityLog {
    pool: PgPool,
    timeout: Duration,
}

impl PgActivityLog {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ActivityLog for PgActivityLog {
    async fn append(&self, activity: NewActivity) -> Result<Activity> {
        bounded(self.timeout, "activity.append", async {
            let mut conn = self.pool.acquire().await.map_err(store_error)?;
            let stored = append_in(&mut conn, &activity).await?;
            debug!(
                activity_id = stored.id,
                user_id = stored.user_id,
                kind = ?stored.kind,
                target = %stored.target,
                "Appended activity"
            );
            Ok(stored)
        })
        .await
    }

    async fn find_like(&self, key: &LikeKey) -> Result<Option<Activity>> {
        bounded(self.timeout, "activity.find_like", async {
            let row = sqlx::query_as::<_, ActivityRow>(&format!(
                r#"
                SELECT {ACTIVITY_COLUMNS}
                FROM activity
                WHERE user_id = $1
                  AND type = $2
                  AND hoop_id IS NOT DISTINCT FROM $3
                  AND story_id IS NOT DISTINCT FROM $4
                ORDER BY id ASC
                LIMIT 1
                "#
            ))
            .bind(key.user_id)
            .bind(key.kind().tag())
            .bind(key.target.place_id())
            .bind(key.target.story_id())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            row.map(Activity::try_from).transpose()
        })
        .await
    }

    async fn remove_like(&self, id: ActivityId) -> Result<bool> {
        let likes = KindCategory::Like.tag_range();
        bounded(self.timeout, "activity.remove_like", async {
            let result = sqlx::query(
                r#"
                DELETE FROM activity
                WHERE id = $1 AND type BETWEEN $2 AND $3
                "#,
            )
            .bind(id)
            .bind(*likes.start())
            .bind(*likes.end())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn read_feed(&self, query: &FeedQuery) -> Result<Vec<Activity>> {
        bounded(self.timeout, "activity.read_feed", async {
            let rows = sqlx::query_as::<_, ActivityRow>(&format!(
                r#"
                SELECT {ACTIVITY_COLUMNS}
                FROM activity
                WHERE NOT $2 OR user_id <> $1
                ORDER BY created_at DESC, id DESC
                LIMIT $3
                "#
            ))
            .bind(query.viewer)
            .bind(query.exclude_self)
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

            Ok(decode_rows(rows))
        })
        .await
    }

    async fn read_by_actor(&self, user_id: UserId, limit: usize) -> Result<Vec<Activity>> {
        bounded(self.timeout, "activity.read_by_actor", async {
            let rows = sqlx::query_as::<_, ActivityRow>(&format!(
                r#"
                SELECT {ACTIVITY_COLUMNS}
                FROM activity
                WHERE user_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
                "#
            ))
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

            Ok(decode_rows(rows))
        })
        .await
    }

    async fn read_by_target(&self, target: Target, limit: usize) -> Result<Vec<Activity>> {
        bounded(self.timeout, "activity.read_by_target", async {
            let rows = sqlx::query_as::<_, ActivityRow>(&format!(
                r#"
                SELECT {ACTIVITY_COLUMNS}
                FROM activity
                WHERE hoop_id IS NOT DISTINCT FROM $1
                  AND story_id IS NOT DISTINCT FROM $2
                ORDER BY created_at DESC, id DESC
                LIMIT $3
                "#
            ))
            .bind(target.place_id())
            .bind(target.story_id())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

            Ok(decode_rows(rows))
        })
        .await
    }

    async fn count_by_targets(
        &self,
        kind: ActivityKind,
        target_ids: &[i64],
    ) -> Result<HashMap<i64, i64>> {
        if target_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let column = match kind.target_type() {
            TargetType::Place => "hoop_id",
            TargetType::Story => "story_id",
        };
        bounded(self.timeout, "activity.count_by_targets", async {
            let rows = sqlx::query_as::<_, (i64, i64)>(&format!(
                r#"
                SELECT {column}, COUNT(*)
                FROM activity
                WHERE type = $1 AND {column} = ANY($2)
                GROUP BY {column}
                "#
            ))
            .bind(kind.tag())
            .bind(target_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

            Ok(rows.into_iter().collect())
        })
        .await
    }

    async fn count_since(&self, query: &FeedQuery, since: Option<DateTime<Utc>>) -> Result<i64> {
        bounded(self.timeout, "activity.count_since", async {
            let row = sqlx::query_as::<_, (i64,)>(
                r#"
                SELECT COUNT(*) FROM (
                    SELECT 1
                    FROM activity
                    WHERE (NOT $2 OR user_id <> $1)
                      AND ($3::timestamptz IS NULL OR created_at > $3)
                    LIMIT $4
                ) window_rows
                "#,
            )
            .bind(query.viewer)
            .bind(query.exclude_self)
            .bind(since)
            .bind(query.limit as i64)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;

            Ok(row.0)
        })
        .await
    }
}
