use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{FeedError, FeedResult};
use crate::metrics::record_operation;
use crate::profiles::ProfileResolver;
use crate::repository::FeedGraphStore;

/// Engagement Manager.
///
/// A like drops whatever LIKE edges the user already has on the post and
/// writes a fresh one, so liking twice only refreshes the timestamp. The two
/// steps are separate transactions.
#[derive(Clone)]
pub struct LikeService {
    store: Arc<dyn FeedGraphStore>,
    profiles: Arc<dyn ProfileResolver>,
    clock: Arc<dyn Clock>,
}

impl LikeService {
    pub fn new(
        store: Arc<dyn FeedGraphStore>,
        profiles: Arc<dyn ProfileResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            profiles,
            clock,
        }
    }

    pub async fn like_post(&self, post_id: i64, acting_user: Uuid) -> FeedResult<()> {
        record_operation("like_post", self.like(post_id, acting_user).await)
    }

    async fn like(&self, post_id: i64, acting_user: Uuid) -> FeedResult<()> {
        self.profiles.resolve(acting_user).await?;

        let removed = self.store.remove_like(post_id, acting_user).await?;
        if !self
            .store
            .add_like(post_id, acting_user, self.clock.now())
            .await?
        {
            return Err(FeedError::not_found("Post"));
        }

        debug!(post_id, user_id = %acting_user, removed, "Like refreshed");
        Ok(())
    }
}
