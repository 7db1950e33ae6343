//! In-memory entity repository for tests. Shares a `MemoryActivityLog` so
//! content writes and their events stay atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use hoopfeed_common::{
    ActivityKind, Comment, EngagementError, FeaturedRole, NewActivity, NewComment, NewPlace,
    NewStory, Place, PlaceId, Result, Story, StoryId, Target, TargetType, User, UserId,
};
use hoopfeed_events::{ActivityLog, MemoryActivityLog};

use crate::repository::{ContentWriter, EntityRepository, PlaceWithFeatured, Posted};

struct State {
    next_id: i64,
    users: BTreeMap<UserId, User>,
    places: BTreeMap<PlaceId, Place>,
    stories: BTreeMap<StoryId, Story>,
    featured: Vec<(PlaceId, StoryId, FeaturedRole)>,
    comments: Vec<Comment>,
    checked_at: HashMap<UserId, DateTime<Utc>>,
    offline: bool,
    fail_content_writes: bool,
}

pub struct MemoryEntities {
    log: Arc<MemoryActivityLog>,
    state: Mutex<State>,
}

impl MemoryEntities {
    pub fn new(log: Arc<MemoryActivityLog>) -> Self {
        Self {
            log,
            state: Mutex::new(State {
                next_id: 1,
                users: BTreeMap::new(),
                places: BTreeMap::new(),
                stories: BTreeMap::new(),
                featured: Vec::new(),
                comments: Vec::new(),
                checked_at: HashMap::new(),
                offline: false,
                fail_content_writes: false,
            }),
        }
    }

    /// The log content writes append to.
    pub fn log(&self) -> &Arc<MemoryActivityLog> {
        &self.log
    }

    /// Make every read fail with `StoreUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Make the content-row half of every write fail.
    pub fn fail_content_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_content_writes = fail;
    }

    /// Create a user fixture. Signup lives outside this crate.
    pub fn add_user(&self, firstname: &str) -> User {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let user = User {
            id: next_id(&mut state),
            firstname: Some(firstname.to_string()),
            lastname: None,
            description: None,
            image_url: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        user
    }

    /// Create a place fixture without an activity event.
    pub fn add_place(&self, user_id: UserId, name: &str) -> Place {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let place = Place {
            id: next_id(&mut state),
            user_id,
            name: name.to_string(),
            description: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            created_at: now,
            updated_at: now,
        };
        state.places.insert(place.id, place.clone());
        place
    }

    /// Create a story fixture without an activity event.
    pub fn add_story(&self, user_id: UserId, place_id: PlaceId, name: &str) -> Story {
        self.add_story_at(user_id, place_id, name, Utc::now())
    }

    pub fn add_story_at(
        &self,
        user_id: UserId,
        place_id: PlaceId,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Story {
        let mut state = self.state.lock().unwrap();
        let story = Story {
            id: next_id(&mut state),
            place_id,
            user_id,
            name: name.to_string(),
            description: String::new(),
            image_url: format!("{name}.jpg"),
            created_at,
            updated_at: created_at,
        };
        state.stories.insert(story.id, story.clone());
        story
    }

    pub fn remove_user(&self, id: UserId) {
        self.state.lock().unwrap().users.remove(&id);
    }

    pub fn remove_place(&self, id: PlaceId) {
        self.state.lock().unwrap().places.remove(&id);
    }

    pub fn remove_story(&self, id: StoryId) {
        self.state.lock().unwrap().stories.remove(&id);
    }

    /// All stored comments (for test assertions).
    pub fn comments(&self) -> Vec<Comment> {
        self.state.lock().unwrap().comments.clone()
    }

    /// All stored stories (for test assertions).
    pub fn stories(&self) -> Vec<Story> {
        self.state.lock().unwrap().stories.values().cloned().collect()
    }

    /// All stored places (for test assertions).
    pub fn places(&self) -> Vec<Place> {
        self.state.lock().unwrap().places.values().cloned().collect()
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> Result<T> {
        let state = self.state.lock().unwrap();
        if state.offline {
            return Err(EngagementError::StoreUnavailable("entity store offline".into()));
        }
        Ok(f(&state))
    }

    fn begin_write(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        let state = self.state.lock().unwrap();
        if state.offline || state.fail_content_writes {
            return Err(EngagementError::TransactionAborted(
                "content write failed".into(),
            ));
        }
        Ok(state)
    }

    /// Append the event; the caller only commits content rows on success.
    async fn append_event(&self, activity: NewActivity) -> Result<hoopfeed_common::Activity> {
        self.log.append(activity).await.map_err(|e| match e {
            EngagementError::TransactionAborted(_) => e,
            other => EngagementError::TransactionAborted(other.to_string()),
        })
    }
}

fn next_id(state: &mut State) -> i64 {
    let id = state.next_id;
    state.next_id += 1;
    id
}

#[async_trait]
impl EntityRepository for MemoryEntities {
    async fn user(&self, id: UserId) -> Result<Option<User>> {
        self.read(|s| s.users.get(&id).cloned())
    }

    async fn place(&self, id: PlaceId) -> Result<Option<Place>> {
        self.read(|s| s.places.get(&id).cloned())
    }

    async fn story(&self, id: StoryId) -> Result<Option<Story>> {
        self.read(|s| s.stories.get(&id).cloned())
    }

    async fn stories_for_place(&self, place_id: PlaceId) -> Result<Vec<Story>> {
        self.read(|s| {
            let mut stories: Vec<Story> = s
                .stories
                .values()
                .filter(|story| story.place_id == place_id)
                .cloned()
                .collect();
            stories.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            stories
        })
    }

    async fn comments_for(&self, target: Target) -> Result<Vec<Comment>> {
        self.read(|s| {
            s.comments
                .iter()
                .filter(|c| c.target == target)
                .cloned()
                .collect()
        })
    }

    async fn last_activity_check(&self, user_id: UserId) -> Result<Option<DateTime<Utc>>> {
        self.read(|s| {
            s.users
                .contains_key(&user_id)
                .then(|| s.checked_at.get(&user_id).copied())
        })?
        .ok_or_else(|| EngagementError::NotFound(format!("user {user_id}")))
    }

    async fn mark_activity_checked(&self, user_id: UserId, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return Err(EngagementError::StoreUnavailable("entity store offline".into()));
        }
        if !state.users.contains_key(&user_id) {
            return Err(EngagementError::NotFound(format!("user {user_id}")));
        }
        state.checked_at.insert(user_id, at);
        Ok(())
    }
}

#[async_trait]
impl ContentWriter for MemoryEntities {
    async fn insert_comment(&self, comment: NewComment) -> Result<Posted<Comment>> {
        let activity = NewActivity::new(
            comment.user_id,
            ActivityKind::commented(comment.target.target_type()),
            comment.target,
        )?;

        let row = {
            let mut state = self.begin_write()?;
            let now = Utc::now();
            Comment {
                id: next_id(&mut state),
                user_id: comment.user_id,
                target: comment.target,
                text: comment.text,
                created_at: now,
                updated_at: now,
            }
        };

        let stored = self.append_event(activity).await?;
        self.state.lock().unwrap().comments.push(row.clone());

        Ok(Posted {
            content: row,
            activity: stored,
        })
    }

    async fn insert_story(&self, story: NewStory) -> Result<Posted<Story>> {
        story.validate()?;

        let row = {
            let mut state = self.begin_write()?;
            let now = Utc::now();
            Story {
                id: next_id(&mut state),
                place_id: story.place_id,
                user_id: story.user_id,
                name: story.name,
                description: story.description,
                image_url: story.image_url,
                created_at: now,
                updated_at: now,
            }
        };

        let activity = NewActivity::new(
            row.user_id,
            ActivityKind::posted(TargetType::Story),
            Target::Story(row.id),
        )?;
        let stored = self.append_event(activity).await?;
        self.state.lock().unwrap().stories.insert(row.id, row.clone());

        Ok(Posted {
            content: row,
            activity: stored,
        })
    }

    async fn insert_place(&self, place: NewPlace) -> Result<Posted<PlaceWithFeatured>> {
        place.validate()?;

        let (row, featured) = {
            let mut state = self.begin_write()?;
            let now = Utc::now();
            let row = Place {
                id: next_id(&mut state),
                user_id: place.user_id,
                name: place.name.clone(),
                description: place.description.clone(),
                latitude: place.latitude,
                longitude: place.longitude,
                created_at: now,
                updated_at: now,
            };
            let featured: Vec<(FeaturedRole, Story)> = place
                .featured_stories(row.id)
                .into_iter()
                .map(|(role, story)| {
                    let story = Story {
                        id: next_id(&mut state),
                        place_id: story.place_id,
                        user_id: story.user_id,
                        name: story.name,
                        description: story.description,
                        image_url: story.image_url,
                        created_at: now,
                        updated_at: now,
                    };
                    (role, story)
                })
                .collect();
            (row, featured)
        };

        let activity = NewActivity::new(
            row.user_id,
            ActivityKind::posted(TargetType::Place),
            Target::Place(row.id),
        )?;
        let stored = self.append_event(activity).await?;

        {
            let mut state = self.state.lock().unwrap();
            state.places.insert(row.id, row.clone());
            for (role, story) in &featured {
                state.stories.insert(story.id, story.clone());
                state.featured.push((row.id, story.id, *role));
            }
        }

        Ok(Posted {
            content: PlaceWithFeatured {
                place: row,
                featured,
            },
            activity: stored,
        })
    }
}
