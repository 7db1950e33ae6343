//! Postgres fixtures for entity tests. Reuses the activity container from
//! `hoopfeed-events` and layers the content tables on top.

use sqlx::PgPool;
use testcontainers::{ContainerAsync, GenericImage};

use hoopfeed_common::UserId;
use hoopfeed_events::testutil::{apply, postgres_container as activity_container};

/// DDL for users, places, stories, featured-image links and comments.
pub const ENTITY_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS "user" (
        id                      BIGSERIAL    PRIMARY KEY,
        firstname               TEXT,
        lastname                TEXT,
        description             TEXT,
        image_url               TEXT,
        last_activity_check_at  TIMESTAMPTZ,
        created_at              TIMESTAMPTZ  NOT NULL DEFAULT now(),
        updated_at              TIMESTAMPTZ  NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS hoop (
        id           BIGSERIAL         PRIMARY KEY,
        user_id      BIGINT            NOT NULL REFERENCES "user"(id),
        name         TEXT              NOT NULL,
        description  TEXT              NOT NULL,
        latitude     DOUBLE PRECISION  NOT NULL,
        longitude    DOUBLE PRECISION  NOT NULL,
        created_at   TIMESTAMPTZ       NOT NULL DEFAULT now(),
        updated_at   TIMESTAMPTZ       NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS story (
        id           BIGSERIAL    PRIMARY KEY,
        hoop_id      BIGINT       NOT NULL REFERENCES hoop(id),
        user_id      BIGINT       NOT NULL REFERENCES "user"(id),
        name         TEXT         NOT NULL,
        description  TEXT         NOT NULL,
        image_url    TEXT         NOT NULL,
        created_at   TIMESTAMPTZ  NOT NULL DEFAULT clock_timestamp(),
        updated_at   TIMESTAMPTZ  NOT NULL DEFAULT clock_timestamp()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS hoop_featured_story (
        hoop_id   BIGINT  NOT NULL REFERENCES hoop(id),
        story_id  BIGINT  NOT NULL REFERENCES story(id),
        role      TEXT    NOT NULL,
        PRIMARY KEY (hoop_id, role)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comment (
        id          BIGSERIAL    PRIMARY KEY,
        user_id     BIGINT       NOT NULL REFERENCES "user"(id),
        hoop_id     BIGINT       REFERENCES hoop(id),
        story_id    BIGINT       REFERENCES story(id),
        text        TEXT         NOT NULL,
        created_at  TIMESTAMPTZ  NOT NULL DEFAULT clock_timestamp(),
        updated_at  TIMESTAMPTZ  NOT NULL DEFAULT clock_timestamp(),
        CHECK ((hoop_id IS NULL) <> (story_id IS NULL))
    )
    "#,
];

/// Postgres with both the activity and entity schemas applied. Hold the
/// container for the duration of the test.
pub async fn postgres_container() -> (ContainerAsync<GenericImage>, PgPool) {
    let (container, pool) = activity_container().await;
    apply(&pool, ENTITY_SCHEMA).await;
    (container, pool)
}

pub async fn insert_user(pool: &PgPool, firstname: &str) -> UserId {
    let (id,): (i64,) = sqlx::query_as(r#"INSERT INTO "user" (firstname) VALUES ($1) RETURNING id"#)
        .bind(firstname)
        .fetch_one(pool)
        .await
        .expect("Failed to insert user");
    id
}

/// Make every activity insert fail so the surrounding transaction aborts.
pub async fn reject_activity_inserts(pool: &PgPool) {
    apply(
        pool,
        &[
            r#"
            CREATE OR REPLACE FUNCTION reject_activity() RETURNS trigger AS $$
            BEGIN
                RAISE EXCEPTION 'activity writes disabled';
            END;
            $$ LANGUAGE plpgsql
            "#,
            r#"
            CREATE TRIGGER activity_reject
                BEFORE INSERT ON activity
                FOR EACH ROW EXECUTE FUNCTION reject_activity()
            "#,
        ],
    )
    .await;
}
