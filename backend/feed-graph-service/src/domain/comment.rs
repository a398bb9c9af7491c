use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Create payload for a comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentInput {
    pub post_id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub content: String,
}

impl CommentInput {
    pub fn new(post_id: i64, content: impl Into<String>) -> Self {
        Self {
            post_id,
            parent_id: None,
            content: content.into(),
        }
    }

    pub fn reply(post_id: i64, parent_id: i64, content: impl Into<String>) -> Self {
        Self {
            post_id,
            parent_id: Some(parent_id),
            content: content.into(),
        }
    }
}

/// Owner snapshot copied onto the comment node at write time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub user_id: Uuid,
    pub user_display_name: String,
    pub user_avatar: Option<String>,
}

/// Property map written to a new comment node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentProperties {
    pub post_id: i64,
    pub content: String,
    pub author: CommentAuthor,
    pub created_at: DateTime<Utc>,
}

/// Comment node as stored in the graph. `parent_id` is only set once the
/// REPLY_ON edge has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentNode {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub author: CommentAuthor,
    pub created_at: DateTime<Utc>,
}

impl CommentNode {
    pub fn from_properties(id: i64, props: &CommentProperties) -> Self {
        Self {
            id,
            post_id: props.post_id,
            parent_id: None,
            content: props.content.clone(),
            author: props.author.clone(),
            created_at: props.created_at,
        }
    }

    pub fn into_comment(self) -> Comment {
        Comment {
            id: self.id,
            post_id: self.post_id,
            parent_id: self.parent_id,
            content: self.content,
            author: self.author,
            created_at: self.created_at,
        }
    }
}

/// Comment as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    #[serde(flatten)]
    pub author: CommentAuthor,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatedComments {
    pub data: Vec<Comment>,
    pub count: i64,
}
