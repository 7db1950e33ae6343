//! Comment, story and place posting, plus comment listings.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use hoopfeed_common::{Comment, NewComment, NewPlace, NewStory, Result, Story, Target, User, UserId};
use hoopfeed_entities::{ContentWriter, EntityRepository, PlaceWithFeatured, Posted};

/// A comment with its author, when the author still resolves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

pub struct ContentService {
    writer: Arc<dyn ContentWriter>,
    entities: Arc<dyn EntityRepository>,
}

impl ContentService {
    pub fn new(writer: Arc<dyn ContentWriter>, entities: Arc<dyn EntityRepository>) -> Self {
        Self { writer, entities }
    }

    /// Insert the comment row and its `CommentedOn*` event atomically. Blank
    /// text is rejected before the store is touched.
    pub async fn insert_comment(
        &self,
        user_id: UserId,
        target: Target,
        text: &str,
    ) -> Result<Posted<Comment>> {
        let comment = NewComment::new(user_id, target, text)?;
        self.writer.insert_comment(comment).await
    }

    pub async fn insert_story(&self, story: NewStory) -> Result<Posted<Story>> {
        story.validate()?;
        self.writer.insert_story(story).await
    }

    pub async fn insert_place(&self, place: NewPlace) -> Result<Posted<PlaceWithFeatured>> {
        place.validate()?;
        self.writer.insert_place(place).await
    }

    /// Comments on `target`, oldest first. An author that fails to load is
    /// left off that comment only.
    pub async fn comments(&self, target: Target) -> Result<Vec<CommentView>> {
        target.validate()?;
        let comments = self.entities.comments_for(target).await?;

        let mut authors: HashMap<UserId, Option<User>> = HashMap::new();
        let mut views = Vec::with_capacity(comments.len());
        for comment in comments {
            if !authors.contains_key(&comment.user_id) {
                let author = match self.entities.user(comment.user_id).await {
                    Ok(user) => user,
                    Err(e) => {
                        warn!(
                            comment_id = comment.id,
                            user_id = comment.user_id,
                            error = %e,
                            "Failed to load comment author"
                        );
                        None
                    }
                };
                authors.insert(comment.user_id, author);
            }
            let user = authors.get(&comment.user_id).cloned().flatten();
            views.push(CommentView { comment, user });
        }
        Ok(views)
    }
}
