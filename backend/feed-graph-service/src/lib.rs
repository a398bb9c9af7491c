pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod health;
pub mod metrics;
pub mod profiles;
pub mod repository;
pub mod services;

pub use domain::comment::{Comment, CommentInput, PaginatedComments};
pub use domain::post::{
    PaginatedPosts, PollDuration, PollOption, PollSettings, Post, PostInput, PostKind, PostType,
    VotingType,
};
pub use error::{FeedError, FeedResult};
pub use repository::{FeedGraphStore, InMemoryFeedStore, Neo4jFeedStore};
pub use services::FeedServices;
