use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::comment::{CommentNode, CommentProperties};
use crate::domain::poll::PollBallots;
use crate::domain::post::{PostNode, PostProperties};

/// Graph Store Client contract used by every feed manager.
///
/// Each method is exactly one transaction against the store. Flows that
/// call several methods in a row (like = remove + add, vote = check + write,
/// reply = create + link) are not atomic as a whole.
///
/// Match-then-act methods return `None`/`false` when nothing matched.
#[async_trait::async_trait]
pub trait FeedGraphStore: Send + Sync {
    // Posts

    /// Create a `POST:<type>` node linked CREATED_BY its author
    async fn create_post(&self, props: &PostProperties) -> Result<PostNode>;

    async fn get_post(&self, post_id: i64) -> Result<Option<PostNode>>;

    /// Like `get_post` but only matches `POST:POLL` nodes
    async fn get_poll(&self, post_id: i64) -> Result<Option<PostNode>>;

    /// Newest first. Returns (page, total); total travels on the page rows,
    /// so an empty page reports 0.
    async fn list_posts(&self, offset: i64, limit: i64) -> Result<(Vec<PostNode>, i64)>;

    /// Merge `props` onto the post matched by id, owner and type label
    async fn merge_post(
        &self,
        post_id: i64,
        owner: Uuid,
        props: &PostProperties,
    ) -> Result<Option<PostNode>>;

    /// Detach-delete the post matched by id + owner and every comment
    /// belonging to it
    async fn delete_post(&self, post_id: i64, owner: Uuid) -> Result<bool>;

    // Likes

    /// Delete LIKE edges from user to post, decrementing `likes_count` once
    /// per deleted edge. Returns the number of edges removed.
    async fn remove_like(&self, post_id: i64, user_id: Uuid) -> Result<u64>;

    /// Create a LIKE edge and increment `likes_count`. False if the post
    /// does not exist.
    async fn add_like(&self, post_id: i64, user_id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    // Votes

    /// Selected options of the user's VOTED edge on the poll, if any
    async fn find_vote(&self, post_id: i64, user_id: Uuid) -> Result<Option<Vec<String>>>;

    /// Drop any VOTED edge from user to poll and write a new one
    async fn replace_vote(
        &self,
        post_id: i64,
        user_id: Uuid,
        selected: &[String],
        at: DateTime<Utc>,
    ) -> Result<Option<PostNode>>;

    /// All ballots on the poll plus the viewer's own selection
    async fn poll_ballots(&self, post_id: i64, viewer: Uuid) -> Result<PollBallots>;

    // Comments

    /// Create a COMMENT linked BELONGS_TO the post and to its author, and
    /// increment the post's `comments_count`. None if the post is missing.
    async fn create_comment(&self, props: &CommentProperties) -> Result<Option<CommentNode>>;

    /// Write REPLY_ON from child to parent. Only matches when both comments
    /// belong to the same post.
    async fn link_reply(&self, child_id: i64, parent_id: i64) -> Result<bool>;

    async fn find_parent_id(&self, comment_id: i64) -> Result<Option<i64>>;

    /// Comments of one post, newest first. The total counts every comment
    /// in the store and, as for posts, is 0 on an empty page.
    async fn list_comments(
        &self,
        post_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<CommentNode>, i64)>;

    /// Detach-delete the comment matched by id + owner and its direct
    /// replies; decrement the post's `comments_count` by one.
    async fn delete_comment(&self, comment_id: i64, owner: Uuid) -> Result<bool>;

    // Maintenance

    /// Constraints and indexes (idempotent)
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
