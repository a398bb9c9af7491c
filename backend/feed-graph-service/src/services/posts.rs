use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{clamp_page, load_post};
use crate::clock::Clock;
use crate::domain::post::{PaginatedPosts, Post, PostInput, PostProperties};
use crate::error::{FeedError, FeedResult};
use crate::metrics::record_operation;
use crate::profiles::ProfileResolver;
use crate::repository::FeedGraphStore;

/// Post Manager: create/read/update/delete over every post subtype
#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn FeedGraphStore>,
    profiles: Arc<dyn ProfileResolver>,
    clock: Arc<dyn Clock>,
    list_max_limit: i64,
}

impl PostService {
    pub fn new(
        store: Arc<dyn FeedGraphStore>,
        profiles: Arc<dyn ProfileResolver>,
        clock: Arc<dyn Clock>,
        list_max_limit: i64,
    ) -> Self {
        Self {
            store,
            profiles,
            clock,
            list_max_limit,
        }
    }

    /// Create a post authored by `acting_user`. The author's display fields
    /// are copied onto the node as they are right now.
    pub async fn create_post(&self, input: PostInput, acting_user: Uuid) -> FeedResult<Post> {
        record_operation("create_post", self.create(input, acting_user).await)
    }

    /// Fetch one post; poll results are computed for `viewer`
    pub async fn get_post(&self, post_id: i64, viewer: Uuid) -> FeedResult<Post> {
        record_operation("get_post", self.fetch(post_id, viewer).await)
    }

    /// Newest first. `count` is the number of posts in the store, or 0 when
    /// the requested page is empty.
    pub async fn list_posts(
        &self,
        offset: i64,
        limit: i64,
        viewer: Uuid,
    ) -> FeedResult<PaginatedPosts> {
        record_operation("list_posts", self.list(offset, limit, viewer).await)
    }

    /// Merge `input` onto the caller's post. The post type cannot change;
    /// a different type, a foreign post and a missing post are all NotFound.
    pub async fn update_post(
        &self,
        post_id: i64,
        input: PostInput,
        acting_user: Uuid,
    ) -> FeedResult<Post> {
        record_operation("update_post", self.update(post_id, input, acting_user).await)
    }

    /// Delete the caller's post together with all of its comments
    pub async fn delete_post(&self, post_id: i64, acting_user: Uuid) -> FeedResult<()> {
        record_operation("delete_post", self.delete(post_id, acting_user).await)
    }

    async fn create(&self, input: PostInput, acting_user: Uuid) -> FeedResult<Post> {
        input.validate()?;
        let profile = self.profiles.resolve(acting_user).await?;

        let props = PostProperties::from_input(&input, &profile, self.clock.now());
        let node = self.store.create_post(&props).await?;

        info!(
            post_id = node.id,
            post_type = props.post_type.as_label(),
            user_id = %acting_user,
            "Post created"
        );
        load_post(self.store.as_ref(), node, acting_user).await
    }

    async fn fetch(&self, post_id: i64, viewer: Uuid) -> FeedResult<Post> {
        let node = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| FeedError::not_found("Post"))?;
        load_post(self.store.as_ref(), node, viewer).await
    }

    async fn list(&self, offset: i64, limit: i64, viewer: Uuid) -> FeedResult<PaginatedPosts> {
        let (offset, limit) = clamp_page(offset, limit, self.list_max_limit)?;
        let (nodes, count) = self.store.list_posts(offset, limit).await?;

        let mut data = Vec::with_capacity(nodes.len());
        for node in nodes {
            data.push(load_post(self.store.as_ref(), node, viewer).await?);
        }

        Ok(PaginatedPosts { data, count })
    }

    async fn update(&self, post_id: i64, input: PostInput, acting_user: Uuid) -> FeedResult<Post> {
        input.validate()?;
        let profile = self.profiles.resolve(acting_user).await?;

        let props = PostProperties::from_input(&input, &profile, self.clock.now());
        let node = self
            .store
            .merge_post(post_id, acting_user, &props)
            .await?
            .ok_or_else(|| FeedError::not_found("Post"))?;

        info!(post_id, user_id = %acting_user, "Post updated");
        load_post(self.store.as_ref(), node, acting_user).await
    }

    async fn delete(&self, post_id: i64, acting_user: Uuid) -> FeedResult<()> {
        if !self.store.delete_post(post_id, acting_user).await? {
            return Err(FeedError::not_found("Post"));
        }
        info!(post_id, user_id = %acting_user, "Post deleted");
        Ok(())
    }
}
