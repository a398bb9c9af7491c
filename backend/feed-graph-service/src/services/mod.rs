//! Feed managers. Each one resolves the acting user where an operation is
//! attributed to someone, then talks to the graph store one transaction at
//! a time.

mod comments;
mod likes;
mod polls;
mod posts;

pub use comments::CommentService;
pub use likes::LikeService;
pub use polls::PollService;
pub use posts::PostService;

use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::post::{Post, PostNode};
use crate::error::{FeedError, FeedResult};
use crate::profiles::ProfileResolver;
use crate::repository::FeedGraphStore;

/// Every manager wired over one store, one resolver and one clock
#[derive(Clone)]
pub struct FeedServices {
    pub posts: PostService,
    pub comments: CommentService,
    pub likes: LikeService,
    pub polls: PollService,
}

impl FeedServices {
    pub fn new(
        store: Arc<dyn FeedGraphStore>,
        profiles: Arc<dyn ProfileResolver>,
        clock: Arc<dyn Clock>,
        list_max_limit: i64,
    ) -> Self {
        let polls = PollService::new(store.clone(), profiles.clone(), clock.clone());

        Self {
            posts: PostService::new(
                store.clone(),
                profiles.clone(),
                clock.clone(),
                list_max_limit,
            ),
            comments: CommentService::new(
                store.clone(),
                profiles.clone(),
                clock.clone(),
                list_max_limit,
            ),
            likes: LikeService::new(store, profiles, clock),
            polls,
        }
    }
}

/// Validate `offset` and clamp `limit` into `[1, max_limit]`
pub(crate) fn clamp_page(offset: i64, limit: i64, max_limit: i64) -> FeedResult<(i64, i64)> {
    if offset < 0 {
        return Err(FeedError::validation("offset must not be negative"));
    }
    Ok((offset, limit.clamp(1, max_limit.max(1))))
}

/// Rebuild a typed post from its stored node. A node that does not fit the
/// domain model is reported as missing, the details only go to the log.
pub(crate) fn reconstruct_post(
    node: PostNode,
    ballots: Option<&crate::domain::poll::PollBallots>,
) -> FeedResult<Post> {
    let post_id = node.id;
    node.into_post(ballots).map_err(|e| {
        error!(post_id, error = ?e, "Stored post cannot be reconstructed");
        FeedError::not_found("Post")
    })
}

/// Typed post for `viewer`, with poll results recounted when it is a poll
pub(crate) async fn load_post(
    store: &dyn FeedGraphStore,
    node: PostNode,
    viewer: Uuid,
) -> FeedResult<Post> {
    if node.is_poll() {
        let ballots = store.poll_ballots(node.id, viewer).await?;
        reconstruct_post(node, Some(&ballots))
    } else {
        reconstruct_post(node, None)
    }
}
