//! Story listings for a place, in each supported sort order.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use hoopfeed_common::{ActivityKind, PlaceId, Result, Story, StorySort, Target};
use hoopfeed_entities::EntityRepository;
use hoopfeed_events::ActivityLog;

use crate::views::ViewTracker;

/// A listed item with the value it was sorted by.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    #[serde(flatten)]
    pub item: T,
    pub score: i64,
}

/// Highest score first. `sort_by` is stable, so ties keep their input order.
pub fn rank_desc<T>(scored: impl IntoIterator<Item = (T, i64)>) -> Vec<Ranked<T>> {
    let mut ranked: Vec<Ranked<T>> = scored
        .into_iter()
        .map(|(item, score)| Ranked { item, score })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

pub struct StoryRankings {
    entities: Arc<dyn EntityRepository>,
    log: Arc<dyn ActivityLog>,
    views: Arc<ViewTracker>,
}

impl StoryRankings {
    pub fn new(
        entities: Arc<dyn EntityRepository>,
        log: Arc<dyn ActivityLog>,
        views: Arc<ViewTracker>,
    ) -> Self {
        Self {
            entities,
            log,
            views,
        }
    }

    /// Stories posted at `place_id`. `Latest` scores by creation time in epoch
    /// seconds; the other orders score by their count.
    pub async fn stories_for_place(
        &self,
        place_id: PlaceId,
        sort: StorySort,
    ) -> Result<Vec<Ranked<Story>>> {
        Target::Place(place_id).validate()?;
        let stories = self.entities.stories_for_place(place_id).await?;

        match sort {
            StorySort::Latest => Ok(stories
                .into_iter()
                .map(|story| {
                    let score = story.created_at.timestamp();
                    Ranked { item: story, score }
                })
                .collect()),
            StorySort::MostViewed => Ok(self
                .views
                .most_viewed(stories, |story| Target::Story(story.id))
                .await),
            StorySort::MostLiked => self.by_event_count(stories, ActivityKind::LikedStory).await,
            StorySort::MostCommented => {
                self.by_event_count(stories, ActivityKind::CommentedOnStory)
                    .await
            }
        }
    }

    async fn by_event_count(
        &self,
        stories: Vec<Story>,
        kind: ActivityKind,
    ) -> Result<Vec<Ranked<Story>>> {
        let ids: Vec<i64> = stories.iter().map(|s| s.id).collect();
        let counts: HashMap<i64, i64> = self.log.count_by_targets(kind, &ids).await?;

        Ok(rank_desc(stories.into_iter().map(|story| {
            let score = counts.get(&story.id).copied().unwrap_or(0);
            (story, score)
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_keep_input_order() {
        let ranked = rank_desc(vec![("a", 1), ("b", 3), ("c", 1), ("d", 3)]);
        let order: Vec<&str> = ranked.iter().map(|r| r.item).collect();
        assert_eq!(order, ["b", "d", "a", "c"]);
    }
}
