//! `hoopfeed`: run engagement engine operations against Postgres and Redis.
//!
//! Every command prints JSON on stdout. Bad input exits with code 2 and a
//! "bad request" message; store failures exit with code 1 and "internal error".

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use hoopfeed_common::{
    require_user, Config, EngagementError, FeaturedImage, NewComment, NewPlace, NewStory,
    StorySort, Target,
};
use hoopfeed_counters::{CounterStore, MemoryCounterStore, RedisCounterStore};
use hoopfeed_engine::{EngagementEngine, EngineDeps};
use hoopfeed_entities::PgEntities;
use hoopfeed_events::PgActivityLog;

#[derive(Parser)]
#[command(name = "hoopfeed", about = "Likes, comments, views and activity feeds")]
#[command(version)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[arg(
        long,
        env = "REDIS_URL",
        default_value = "redis://127.0.0.1:6379",
        hide_env_values = true
    )]
    redis_url: String,

    /// Upper bound on each store round trip
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 2000)]
    store_timeout_ms: u64,

    #[arg(long, env = "FEED_PAGE_SIZE", default_value_t = 100)]
    feed_page_size: usize,

    /// Entity lookups in flight while hydrating a feed
    #[arg(long, env = "HYDRATE_CONCURRENCY", default_value_t = 8)]
    hydrate_concurrency: usize,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            database_url: self.database_url.clone(),
            redis_url: self.redis_url.clone(),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            feed_page_size: self.feed_page_size,
            hydrate_concurrency: self.hydrate_concurrency.max(1),
        }
    }
}

/// A place (`hoop`) or story by id.
#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// `hoop` (or `place`) or `story`
    #[arg(long = "type")]
    target_type: String,

    #[arg(long)]
    id: i64,
}

impl TargetArgs {
    fn target(&self) -> Result<Target, EngagementError> {
        Target::parse(&self.target_type, self.id)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Hydrated activity feed for a user, newest first
    Feed {
        #[arg(long)]
        user: i64,
        /// Include the user's own activity
        #[arg(long)]
        include_self: bool,
    },

    /// Toggle a like
    Like {
        #[arg(long)]
        user: i64,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Whether a user currently likes a target
    Liked {
        #[arg(long)]
        user: i64,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Number of likes on a target
    Likes {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Post a comment
    Comment {
        #[arg(long)]
        user: i64,
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        text: String,
    },

    /// Comments on a target, oldest first
    Comments {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Record a view
    View {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Current view count
    Views {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Stories at a place
    Stories {
        #[arg(long)]
        place: i64,
        /// latest, mostviewed, mostliked or mostcommented
        #[arg(long, default_value = "latest")]
        sort: String,
    },

    /// Post a story at a place
    PostStory {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        place: i64,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        image_url: String,
    },

    /// Post a place with optional featured images
    PostPlace {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,
        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,
        /// `role=url`, role one of hoop, court, crew. Repeatable.
        #[arg(long = "featured")]
        featured: Vec<String>,
    },

    /// Record that a user looked at their feed
    Check {
        #[arg(long)]
        user: i64,
        /// RFC 3339 timestamp; defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Feed events since the user's last check
    Unseen {
        #[arg(long)]
        user: i64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hoopfeed=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(e) => match e.downcast_ref::<EngagementError>() {
            Some(engagement) if engagement.is_client_error() => {
                eprintln!("bad request: {engagement}");
                ExitCode::from(2)
            }
            _ => {
                eprintln!("internal error: {e:#}");
                ExitCode::from(1)
            }
        },
    }
}

async fn run(cli: Cli) -> Result<Value> {
    let config = cli.config();
    config.log_redacted();

    // Parse caller input before opening any connection.
    let command = Request::try_from(cli.command)?;

    let engine = connect(&config).await?;
    let output = command.execute(&engine).await?;
    Ok(output)
}

async fn connect(config: &Config) -> Result<EngagementEngine> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(config.store_timeout)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;

    let counters: Arc<dyn CounterStore> =
        match RedisCounterStore::connect(&config.redis_url, config.store_timeout).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                // Counters are best-effort; everything else still works.
                tracing::warn!(error = %e, "Counter store unreachable, view counts unavailable");
                let offline = MemoryCounterStore::new();
                offline.set_offline(true);
                Arc::new(offline)
            }
        };

    let entities = Arc::new(PgEntities::new(pool.clone(), config.store_timeout));
    let deps = EngineDeps {
        log: Arc::new(PgActivityLog::new(pool, config.store_timeout)),
        counters,
        entities: entities.clone(),
        writer: entities,
    };
    Ok(EngagementEngine::new(deps, config))
}

/// A validated command, ready to run.
#[derive(Debug)]
enum Request {
    Feed { user: i64, exclude_self: bool },
    Like { user: i64, target: Target },
    Liked { user: i64, target: Target },
    Likes { target: Target },
    Comment { user: i64, target: Target, text: String },
    Comments { target: Target },
    View { target: Target },
    Views { target: Target },
    Stories { place: i64, sort: StorySort },
    PostStory(NewStory),
    PostPlace(NewPlace),
    Check { user: i64, at: DateTime<Utc> },
    Unseen { user: i64 },
}

impl TryFrom<Command> for Request {
    type Error = EngagementError;

    fn try_from(command: Command) -> Result<Self, EngagementError> {
        Ok(match command {
            Command::Feed { user, include_self } => {
                require_user(user)?;
                Request::Feed {
                    user,
                    exclude_self: !include_self,
                }
            }
            Command::Like { user, target } => Request::Like {
                user,
                target: target.target()?,
            },
            Command::Liked { user, target } => Request::Liked {
                user,
                target: target.target()?,
            },
            Command::Likes { target } => Request::Likes {
                target: target.target()?,
            },
            Command::Comment { user, target, text } => {
                let comment = NewComment::new(user, target.target()?, &text)?;
                Request::Comment {
                    user,
                    target: comment.target,
                    text: comment.text,
                }
            }
            Command::Comments { target } => Request::Comments {
                target: target.target()?,
            },
            Command::View { target } => Request::View {
                target: target.target()?,
            },
            Command::Views { target } => Request::Views {
                target: target.target()?,
            },
            Command::Stories { place, sort } => {
                Target::Place(place).validate()?;
                Request::Stories {
                    place,
                    sort: sort.parse()?,
                }
            }
            Command::PostStory {
                user,
                place,
                name,
                description,
                image_url,
            } => {
                let story = NewStory {
                    user_id: user,
                    place_id: place,
                    name,
                    description,
                    image_url,
                };
                story.validate()?;
                Request::PostStory(story)
            }
            Command::PostPlace {
                user,
                name,
                description,
                latitude,
                longitude,
                featured,
            } => {
                let place = NewPlace {
                    user_id: user,
                    name,
                    description,
                    latitude,
                    longitude,
                    featured: featured
                        .iter()
                        .map(|raw| parse_featured(raw))
                        .collect::<Result<_, _>>()?,
                };
                place.validate()?;
                Request::PostPlace(place)
            }
            Command::Check { user, at } => {
                require_user(user)?;
                Request::Check {
                    user,
                    at: at.unwrap_or_else(Utc::now),
                }
            }
            Command::Unseen { user } => {
                require_user(user)?;
                Request::Unseen { user }
            }
        })
    }
}

impl Request {
    async fn execute(self, engine: &EngagementEngine) -> Result<Value, EngagementError> {
        Ok(match self {
            Request::Feed { user, exclude_self } => {
                json!(engine.get_feed(user, exclude_self).await?)
            }
            Request::Like { user, target } => {
                let outcome = engine.toggle_like(user, target).await?;
                json!({ "target": target.to_string(), "outcome": outcome })
            }
            Request::Liked { user, target } => {
                let liked = engine.is_liked(user, target).await?;
                json!({ "target": target.to_string(), "liked": liked })
            }
            Request::Likes { target } => {
                let likes = engine.like_count(target).await?;
                json!({ "target": target.to_string(), "likes": likes })
            }
            Request::Comment { user, target, text } => {
                let posted = engine.insert_comment(user, target, &text).await?;
                json!({ "comment": posted.content, "activity": posted.activity })
            }
            Request::Comments { target } => json!(engine.comments(target).await?),
            Request::View { target } => {
                let count = engine.record_view(target).await?;
                json!({ "target": target.to_string(), "view_count": count })
            }
            Request::Views { target } => {
                let count = engine.get_view_count(target).await?;
                json!({
                    "target": target.to_string(),
                    "view_count": count.unwrap_or(0),
                    "found": count.is_some(),
                })
            }
            Request::Stories { place, sort } => {
                json!(engine.stories_for_place(place, sort).await?)
            }
            Request::PostStory(story) => {
                let posted = engine.insert_story(story).await?;
                json!({ "story": posted.content, "activity": posted.activity })
            }
            Request::PostPlace(place) => {
                let posted = engine.insert_place(place).await?;
                let featured: Vec<Value> = posted
                    .content
                    .featured
                    .iter()
                    .map(|(role, story)| json!({ "role": role, "story": story }))
                    .collect();
                json!({
                    "hoop": posted.content.place,
                    "featured": featured,
                    "activity": posted.activity,
                })
            }
            Request::Check { user, at } => {
                engine.mark_activity_checked(user, at).await?;
                json!({ "user_id": user, "checked_at": at })
            }
            Request::Unseen { user } => {
                let unseen = engine.unseen_activity_count(user).await?;
                json!({ "user_id": user, "unseen": unseen })
            }
        })
    }
}

fn parse_featured(raw: &str) -> Result<FeaturedImage, EngagementError> {
    let (role, url) = raw.split_once('=').ok_or_else(|| {
        EngagementError::InvalidInput(format!("featured image must be role=url, got {raw:?}"))
    })?;
    Ok(FeaturedImage {
        role: role.parse()?,
        image_url: url.trim().to_string(),
    })
}
