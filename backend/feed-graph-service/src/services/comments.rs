use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::clamp_page;
use crate::clock::Clock;
use crate::domain::comment::{Comment, CommentInput, CommentProperties, PaginatedComments};
use crate::error::{FeedError, FeedResult};
use crate::metrics::{record_operation, record_reply_link_failure};
use crate::profiles::ProfileResolver;
use crate::repository::FeedGraphStore;

/// Comment Thread Manager
#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn FeedGraphStore>,
    profiles: Arc<dyn ProfileResolver>,
    clock: Arc<dyn Clock>,
    list_max_limit: i64,
}

impl CommentService {
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

    /// Comment on a post, optionally as a reply.
    ///
    /// The reply edge is written in a second transaction. When it cannot be
    /// written (parent missing, on another post, or gone meanwhile) the
    /// comment is kept as a top-level comment.
    pub async fn create_comment(
        &self,
        input: CommentInput,
        acting_user: Uuid,
    ) -> FeedResult<Comment> {
        record_operation("create_comment", self.create(input, acting_user).await)
    }

    /// Comments of one post, newest first. `count` is taken over every
    /// comment in the store, and is 0 for an empty page.
    pub async fn list_comments(
        &self,
        post_id: i64,
        offset: i64,
        limit: i64,
    ) -> FeedResult<PaginatedComments> {
        record_operation("list_comments", self.list(post_id, offset, limit).await)
    }

    /// Delete the caller's comment and its direct replies. Deeper replies
    /// stay in place with a dangling `parent_id`.
    pub async fn delete_comment(&self, comment_id: i64, acting_user: Uuid) -> FeedResult<()> {
        record_operation("delete_comment", self.delete(comment_id, acting_user).await)
    }

    /// Parent of a reply; None for top-level comments and orphans
    pub async fn find_parent_id(&self, comment_id: i64) -> FeedResult<Option<i64>> {
        Ok(self.store.find_parent_id(comment_id).await?)
    }

    async fn create(&self, input: CommentInput, acting_user: Uuid) -> FeedResult<Comment> {
        let profile = self.profiles.resolve(acting_user).await?;

        let props = CommentProperties {
            post_id: input.post_id,
            content: input.content,
            author: profile.comment_author(),
            created_at: self.clock.now(),
        };

        let mut comment = self
            .store
            .create_comment(&props)
            .await?
            .ok_or_else(|| FeedError::not_found("Post"))?;

        if let Some(parent_id) = input.parent_id {
            if self.store.link_reply(comment.id, parent_id).await? {
                comment.parent_id = Some(parent_id);
            } else {
                record_reply_link_failure();
                warn!(
                    comment_id = comment.id,
                    parent_id,
                    post_id = comment.post_id,
                    "Reply parent not found on this post, comment left top-level"
                );
            }
        }

        info!(
            comment_id = comment.id,
            post_id = comment.post_id,
            user_id = %acting_user,
            "Comment created"
        );
        Ok(comment.into_comment())
    }

    async fn list(&self, post_id: i64, offset: i64, limit: i64) -> FeedResult<PaginatedComments> {
        let (offset, limit) = clamp_page(offset, limit, self.list_max_limit)?;
        let (nodes, count) = self.store.list_comments(post_id, offset, limit).await?;

        Ok(PaginatedComments {
            data: nodes.into_iter().map(|node| node.into_comment()).collect(),
            count,
        })
    }

    async fn delete(&self, comment_id: i64, acting_user: Uuid) -> FeedResult<()> {
        if !self.store.delete_comment(comment_id, acting_user).await? {
            return Err(FeedError::not_found("Comment"));
        }
        info!(comment_id, user_id = %acting_user, "Comment deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::post::{PostInput, PostProperties};
    use crate::domain::profile::Profile;
    use crate::profiles::StaticProfileResolver;
    use crate::repository::InMemoryFeedStore;
    use chrono::{Duration, Utc};

    struct Fixture {
        store: Arc<InMemoryFeedStore>,
        clock: Arc<ManualClock>,
        service: CommentService,
        user: Uuid,
    }

    fn fixture() -> Fixture {
        let user = Uuid::new_v4();
        let profiles = StaticProfileResolver::new().with_profile(Profile::personal(
            user,
            "Edsger",
            "Dijkstra",
            None,
            Some("ewd.png".to_string()),
        ));
        let store = Arc::new(InMemoryFeedStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = CommentService::new(store.clone(), Arc::new(profiles), clock.clone(), 50);
        Fixture {
            store,
            clock,
            service,
            user,
        }
    }

    async fn post(f: &Fixture) -> i64 {
        let props = PostProperties::from_input(
            &PostInput::text("root"),
            &Profile::personal(f.user, "Edsger", "Dijkstra", None, None),
            f.clock.now(),
        );
        f.store.create_post(&props).await.unwrap().id
    }

    #[tokio::test]
    async fn test_comment_copies_author_and_counts() {
        let f = fixture();
        let post_id = post(&f).await;

        let comment = f
            .service
            .create_comment(CommentInput::new(post_id, "nice"), f.user)
            .await
            .unwrap();

        assert_eq!(comment.author.user_display_name, "Edsger Dijkstra");
        assert_eq!(comment.author.user_avatar.as_deref(), Some("ewd.png"));
        assert_eq!(comment.parent_id, None);
        assert_eq!(f.store.post_node(post_id).await.unwrap().comments_count, 1);
    }

    #[tokio::test]
    async fn test_comment_on_missing_post() {
        let f = fixture();
        let err = f
            .service
            .create_comment(CommentInput::new(999, "hello?"), f.user)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_user_cannot_comment() {
        let f = fixture();
        let post_id = post(&f).await;
        let err = f
            .service
            .create_comment(CommentInput::new(post_id, "hi"), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(f.store.post_node(post_id).await.unwrap().comments_count, 0);
    }

    #[tokio::test]
    async fn test_reply_to_comment_on_other_post_stays_top_level() {
        let f = fixture();
        let first = post(&f).await;
        let second = post(&f).await;

        let foreign = f
            .service
            .create_comment(CommentInput::new(second, "elsewhere"), f.user)
            .await
            .unwrap();
        let reply = f
            .service
            .create_comment(CommentInput::reply(first, foreign.id, "lost"), f.user)
            .await
            .unwrap();

        assert_eq!(reply.parent_id, None);
        assert_eq!(f.service.find_parent_id(reply.id).await.unwrap(), None);
        assert_eq!(f.store.post_node(first).await.unwrap().comments_count, 1);
    }

    #[tokio::test]
    async fn test_reply_links_parent() {
        let f = fixture();
        let post_id = post(&f).await;

        let parent = f
            .service
            .create_comment(CommentInput::new(post_id, "question"), f.user)
            .await
            .unwrap();
        let reply = f
            .service
            .create_comment(CommentInput::reply(post_id, parent.id, "answer"), f.user)
            .await
            .unwrap();

        assert_eq!(reply.parent_id, Some(parent.id));
        assert_eq!(f.service.find_parent_id(reply.id).await.unwrap(), Some(parent.id));
    }

    #[tokio::test]
    async fn test_list_comments_newest_first_with_global_count() {
        let f = fixture();
        let post_id = post(&f).await;
        let other = post(&f).await;

        for content in ["one", "two", "three"] {
            f.service
                .create_comment(CommentInput::new(post_id, content), f.user)
                .await
                .unwrap();
            f.clock.advance(Duration::seconds(1));
        }
        f.service
            .create_comment(CommentInput::new(other, "other"), f.user)
            .await
            .unwrap();

        let page = f.service.list_comments(post_id, 0, 2).await.unwrap();
        let contents: Vec<&str> = page.data.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["three", "two"]);
        // Counted across every post
        assert_eq!(page.count, 4);

        let empty = f.service.list_comments(post_id, 10, 2).await.unwrap();
        assert!(empty.data.is_empty());
        assert_eq!(empty.count, 0);
    }

    #[tokio::test]
    async fn test_delete_comment_requires_owner() {
        let f = fixture();
        let post_id = post(&f).await;
        let comment = f
            .service
            .create_comment(CommentInput::new(post_id, "mine"), f.user)
            .await
            .unwrap();

        let err = f
            .service
            .delete_comment(comment.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        f.service.delete_comment(comment.id, f.user).await.unwrap();
        assert!(!f.store.comment_exists(comment.id).await);
        assert_eq!(f.store.post_node(post_id).await.unwrap().comments_count, 0);
    }
}
