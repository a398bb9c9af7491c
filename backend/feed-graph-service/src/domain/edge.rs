use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Node labels used by the feed graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeLabel {
    User,
    Post,
    Comment,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::User => "USER",
            NodeLabel::Post => "POST",
            NodeLabel::Comment => "COMMENT",
        }
    }
}

/// Relationship types between feed nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// (POST)-[:CREATED_BY]->(USER)
    CreatedBy,
    /// (COMMENT)-[:BELONGS_TO]->(POST)
    BelongsTo,
    /// (USER)-[:COMMENTED_ON]->(POST)
    CommentedOn,
    /// (COMMENT)-[:COMMENT_BY]->(USER)
    CommentBy,
    /// (COMMENT)-[:REPLY_ON]->(COMMENT)
    ReplyOn,
    /// (USER)-[:LIKE]->(POST)
    Like,
    /// (USER)-[:VOTED]->(POST:POLL)
    Voted,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::CreatedBy => "CREATED_BY",
            EdgeType::BelongsTo => "BELONGS_TO",
            EdgeType::CommentedOn => "COMMENTED_ON",
            EdgeType::CommentBy => "COMMENT_BY",
            EdgeType::ReplyOn => "REPLY_ON",
            EdgeType::Like => "LIKE",
            EdgeType::Voted => "VOTED",
        }
    }
}

/// Endpoint of an edge. Users are keyed by their account id, posts and
/// comments by the identifier the graph store assigned them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRef {
    User(Uuid),
    Post(i64),
    Comment(i64),
}

/// Typed directed edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeRef,
    pub to: NodeRef,
    pub edge_type: EdgeType,
    pub created_at: Option<DateTime<Utc>>,
    /// Only carried by VOTED edges
    pub selected_options: Option<Vec<String>>,
}

impl Edge {
    fn plain(from: NodeRef, to: NodeRef, edge_type: EdgeType) -> Self {
        Self {
            from,
            to,
            edge_type,
            created_at: None,
            selected_options: None,
        }
    }

    pub fn created_by(post_id: i64, user_id: Uuid) -> Self {
        Self::plain(NodeRef::Post(post_id), NodeRef::User(user_id), EdgeType::CreatedBy)
    }

    pub fn belongs_to(comment_id: i64, post_id: i64) -> Self {
        Self::plain(
            NodeRef::Comment(comment_id),
            NodeRef::Post(post_id),
            EdgeType::BelongsTo,
        )
    }

    pub fn commented_on(user_id: Uuid, post_id: i64) -> Self {
        Self::plain(NodeRef::User(user_id), NodeRef::Post(post_id), EdgeType::CommentedOn)
    }

    pub fn comment_by(comment_id: i64, user_id: Uuid) -> Self {
        Self::plain(
            NodeRef::Comment(comment_id),
            NodeRef::User(user_id),
            EdgeType::CommentBy,
        )
    }

    pub fn reply_on(child_id: i64, parent_id: i64) -> Self {
        Self::plain(
            NodeRef::Comment(child_id),
            NodeRef::Comment(parent_id),
            EdgeType::ReplyOn,
        )
    }

    pub fn like(user_id: Uuid, post_id: i64, at: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(at),
            ..Self::plain(NodeRef::User(user_id), NodeRef::Post(post_id), EdgeType::Like)
        }
    }

    pub fn voted(user_id: Uuid, post_id: i64, selected: Vec<String>, at: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(at),
            selected_options: Some(selected),
            ..Self::plain(NodeRef::User(user_id), NodeRef::Post(post_id), EdgeType::Voted)
        }
    }

    /// True when either endpoint is `node`
    pub fn touches(&self, node: NodeRef) -> bool {
        self.from == node || self.to == node
    }

    pub fn is(&self, edge_type: EdgeType, from: NodeRef, to: NodeRef) -> bool {
        self.edge_type == edge_type && self.from == from && self.to == to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_type_as_str() {
        assert_eq!(EdgeType::CreatedBy.as_str(), "CREATED_BY");
        assert_eq!(EdgeType::BelongsTo.as_str(), "BELONGS_TO");
        assert_eq!(EdgeType::ReplyOn.as_str(), "REPLY_ON");
        assert_eq!(EdgeType::Like.as_str(), "LIKE");
        assert_eq!(EdgeType::Voted.as_str(), "VOTED");
        assert_eq!(NodeLabel::Comment.as_str(), "COMMENT");
    }

    #[test]
    fn test_vote_edge_carries_selection() {
        let voter = Uuid::new_v4();
        let edge = Edge::voted(voter, 7, vec!["Rust".to_string()], Utc::now());

        assert!(edge.is(EdgeType::Voted, NodeRef::User(voter), NodeRef::Post(7)));
        assert_eq!(edge.selected_options.as_deref(), Some(&["Rust".to_string()][..]));
        assert!(edge.touches(NodeRef::Post(7)));
        assert!(!edge.touches(NodeRef::Comment(7)));
    }
}
