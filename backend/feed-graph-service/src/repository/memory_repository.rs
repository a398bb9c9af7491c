use super::FeedGraphStore;
use crate::domain::comment::{CommentNode, CommentProperties};
use crate::domain::edge::{Edge, EdgeType, NodeRef};
use crate::domain::poll::PollBallots;
use crate::domain::post::{PostNode, PostProperties, PostType};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Nodes and edges of the feed graph. Edges form a multigraph: nothing
/// stops two LIKE edges between the same pair, as in the real store.
#[derive(Debug, Default)]
struct GraphState {
    next_id: i64,
    users: HashSet<Uuid>,
    posts: HashMap<i64, PostNode>,
    comments: HashMap<i64, CommentNode>,
    edges: Vec<Edge>,
}

impl GraphState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn detach(&mut self, node: NodeRef) {
        self.edges.retain(|edge| !edge.touches(node));
    }

    fn count_edges(&self, edge_type: EdgeType, from: NodeRef, to: NodeRef) -> usize {
        self.edges
            .iter()
            .filter(|edge| edge.is(edge_type, from, to))
            .count()
    }
}

fn page<T: Clone>(items: Vec<&T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

/// In-process feed graph used by tests and local runs without Neo4j.
///
/// Every method takes the lock once, so each call is atomic the same way a
/// single Cypher transaction is.
#[derive(Clone, Default)]
pub struct InMemoryFeedStore {
    state: Arc<RwLock<GraphState>>,
}

impl InMemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn post_node(&self, post_id: i64) -> Option<PostNode> {
        self.state.read().await.posts.get(&post_id).cloned()
    }

    pub async fn comment_exists(&self, comment_id: i64) -> bool {
        self.state.read().await.comments.contains_key(&comment_id)
    }

    pub async fn comment_node(&self, comment_id: i64) -> Option<CommentNode> {
        self.state.read().await.comments.get(&comment_id).cloned()
    }

    pub async fn like_edges(&self, post_id: i64, user_id: Uuid) -> usize {
        self.state.read().await.count_edges(
            EdgeType::Like,
            NodeRef::User(user_id),
            NodeRef::Post(post_id),
        )
    }

    pub async fn vote_edges(&self, post_id: i64, user_id: Uuid) -> usize {
        self.state.read().await.count_edges(
            EdgeType::Voted,
            NodeRef::User(user_id),
            NodeRef::Post(post_id),
        )
    }

    pub async fn reply_edges(&self, child_id: i64, parent_id: i64) -> usize {
        self.state.read().await.count_edges(
            EdgeType::ReplyOn,
            NodeRef::Comment(child_id),
            NodeRef::Comment(parent_id),
        )
    }

    pub async fn edge_count(&self) -> usize {
        self.state.read().await.edges.len()
    }

    pub async fn has_user(&self, user_id: Uuid) -> bool {
        self.state.read().await.users.contains(&user_id)
    }
}

#[async_trait::async_trait]
impl FeedGraphStore for InMemoryFeedStore {
    async fn create_post(&self, props: &PostProperties) -> Result<PostNode> {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        let post = PostNode::from_properties(id, props);

        state.users.insert(props.author.user_id);
        state.posts.insert(id, post.clone());
        state.edges.push(Edge::created_by(id, props.author.user_id));

        debug!(
            "Created {} post {} by {}",
            props.post_type.as_label(),
            id,
            props.author.user_id
        );
        Ok(post)
    }

    async fn get_post(&self, post_id: i64) -> Result<Option<PostNode>> {
        Ok(self.state.read().await.posts.get(&post_id).cloned())
    }

    async fn get_poll(&self, post_id: i64) -> Result<Option<PostNode>> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .get(&post_id)
            .filter(|post| post.post_type == PostType::Poll)
            .cloned())
    }

    async fn list_posts(&self, offset: i64, limit: i64) -> Result<(Vec<PostNode>, i64)> {
        let state = self.state.read().await;

        let mut posts: Vec<&PostNode> = state.posts.values().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = posts.len() as i64;
        let data = page(posts, offset, limit);
        let count = if data.is_empty() { 0 } else { total };
        Ok((data, count))
    }

    async fn merge_post(
        &self,
        post_id: i64,
        owner: Uuid,
        props: &PostProperties,
    ) -> Result<Option<PostNode>> {
        let mut state = self.state.write().await;

        let Some(post) = state.posts.get_mut(&post_id).filter(|post| {
            post.author.user_id == owner && post.post_type == props.post_type
        }) else {
            return Ok(None);
        };

        post.merge(props);
        debug!("Merged post {} for {}", post_id, owner);
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, post_id: i64, owner: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;

        match state.posts.get(&post_id) {
            Some(post) if post.author.user_id == owner => {}
            _ => return Ok(false),
        }

        let comment_ids: Vec<i64> = state
            .edges
            .iter()
            .filter(|edge| {
                edge.edge_type == EdgeType::BelongsTo && edge.to == NodeRef::Post(post_id)
            })
            .filter_map(|edge| match edge.from {
                NodeRef::Comment(id) => Some(id),
                _ => None,
            })
            .collect();

        for comment_id in &comment_ids {
            state.comments.remove(comment_id);
            state.detach(NodeRef::Comment(*comment_id));
        }
        state.posts.remove(&post_id);
        state.detach(NodeRef::Post(post_id));

        debug!("Deleted post {} and {} comments", post_id, comment_ids.len());
        Ok(true)
    }

    async fn remove_like(&self, post_id: i64, user_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;

        let before = state.edges.len();
        state
            .edges
            .retain(|edge| !edge.is(EdgeType::Like, NodeRef::User(user_id), NodeRef::Post(post_id)));
        let removed = (before - state.edges.len()) as u64;

        if let Some(post) = state.posts.get_mut(&post_id) {
            post.likes_count -= removed as i64;
        }

        debug!("Removed {} LIKE edges: {} -> {}", removed, user_id, post_id);
        Ok(removed)
    }

    async fn add_like(&self, post_id: i64, user_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.write().await;

        let Some(post) = state.posts.get_mut(&post_id) else {
            return Ok(false);
        };
        post.likes_count += 1;

        state.users.insert(user_id);
        state.edges.push(Edge::like(user_id, post_id, at));

        debug!("Created LIKE: {} -> {}", user_id, post_id);
        Ok(true)
    }

    async fn find_vote(&self, post_id: i64, user_id: Uuid) -> Result<Option<Vec<String>>> {
        let state = self.state.read().await;
        Ok(state
            .edges
            .iter()
            .find(|edge| edge.is(EdgeType::Voted, NodeRef::User(user_id), NodeRef::Post(post_id)))
            .and_then(|edge| edge.selected_options.clone()))
    }

    async fn replace_vote(
        &self,
        post_id: i64,
        user_id: Uuid,
        selected: &[String],
        at: DateTime<Utc>,
    ) -> Result<Option<PostNode>> {
        let mut state = self.state.write().await;

        let Some(poll) = state
            .posts
            .get(&post_id)
            .filter(|post| post.post_type == PostType::Poll)
            .cloned()
        else {
            return Ok(None);
        };

        state
            .edges
            .retain(|edge| !edge.is(EdgeType::Voted, NodeRef::User(user_id), NodeRef::Post(post_id)));
        state.users.insert(user_id);
        state
            .edges
            .push(Edge::voted(user_id, post_id, selected.to_vec(), at));

        debug!("Created VOTED: {} -> {} {:?}", user_id, post_id, selected);
        Ok(Some(poll))
    }

    async fn poll_ballots(&self, post_id: i64, viewer: Uuid) -> Result<PollBallots> {
        let state = self.state.read().await;

        let mut ballots = PollBallots::default();
        for edge in &state.edges {
            if edge.edge_type != EdgeType::Voted || edge.to != NodeRef::Post(post_id) {
                continue;
            }
            let Some(selected) = &edge.selected_options else {
                continue;
            };
            ballots.ballots.push(selected.clone());
            if edge.from == NodeRef::User(viewer) && ballots.chosen.is_none() {
                ballots.chosen = Some(selected.clone());
            }
        }
        Ok(ballots)
    }

    async fn create_comment(&self, props: &CommentProperties) -> Result<Option<CommentNode>> {
        let mut state = self.state.write().await;

        if !state.posts.contains_key(&props.post_id) {
            return Ok(None);
        }

        let id = state.allocate_id();
        let comment = CommentNode::from_properties(id, props);
        let user_id = props.author.user_id;

        state.users.insert(user_id);
        state.comments.insert(id, comment.clone());
        state.edges.push(Edge::belongs_to(id, props.post_id));
        state.edges.push(Edge::commented_on(user_id, props.post_id));
        state.edges.push(Edge::comment_by(id, user_id));
        if let Some(post) = state.posts.get_mut(&props.post_id) {
            post.comments_count += 1;
        }

        debug!("Created comment {} on post {}", id, props.post_id);
        Ok(Some(comment))
    }

    async fn link_reply(&self, child_id: i64, parent_id: i64) -> Result<bool> {
        let mut state = self.state.write().await;

        if child_id == parent_id {
            return Ok(false);
        }
        let same_post = match (state.comments.get(&child_id), state.comments.get(&parent_id)) {
            (Some(child), Some(parent)) => child.post_id == parent.post_id,
            _ => false,
        };
        if !same_post {
            return Ok(false);
        }

        state.edges.push(Edge::reply_on(child_id, parent_id));
        if let Some(child) = state.comments.get_mut(&child_id) {
            child.parent_id = Some(parent_id);
        }

        debug!("Linked REPLY_ON: {} -> {}", child_id, parent_id);
        Ok(true)
    }

    async fn find_parent_id(&self, comment_id: i64) -> Result<Option<i64>> {
        let state = self.state.read().await;
        Ok(state
            .edges
            .iter()
            .filter(|edge| {
                edge.edge_type == EdgeType::ReplyOn && edge.from == NodeRef::Comment(comment_id)
            })
            .find_map(|edge| match edge.to {
                NodeRef::Comment(parent) => Some(parent),
                _ => None,
            }))
    }

    async fn list_comments(
        &self,
        post_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<CommentNode>, i64)> {
        let state = self.state.read().await;

        let mut comments: Vec<&CommentNode> = state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        // Counted over the whole store
        let total = state.comments.len() as i64;
        let data = page(comments, offset, limit);
        let count = if data.is_empty() { 0 } else { total };
        Ok((data, count))
    }

    async fn delete_comment(&self, comment_id: i64, owner: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;

        let post_id = match state.comments.get(&comment_id) {
            Some(comment) if comment.author.user_id == owner => comment.post_id,
            _ => return Ok(false),
        };

        let replies: Vec<i64> = state
            .edges
            .iter()
            .filter(|edge| {
                edge.edge_type == EdgeType::ReplyOn && edge.to == NodeRef::Comment(comment_id)
            })
            .filter_map(|edge| match edge.from {
                NodeRef::Comment(id) => Some(id),
                _ => None,
            })
            .collect();

        for reply in &replies {
            state.comments.remove(reply);
            state.detach(NodeRef::Comment(*reply));
        }
        state.comments.remove(&comment_id);
        state.detach(NodeRef::Comment(comment_id));

        if let Some(post) = state.posts.get_mut(&post_id) {
            post.comments_count -= 1;
        }

        debug!(
            "Deleted comment {} and {} direct replies",
            comment_id,
            replies.len()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::profile::Profile;
    use crate::domain::post::{PollDuration, PollSettings, PostInput, VotingType};

    fn props(owner: Uuid, at: DateTime<Utc>) -> PostProperties {
        let profile = Profile::personal(owner, "Ada", "Lovelace", None, None);
        PostProperties::from_input(&PostInput::text("hello"), &profile, at)
    }

    fn comment(post_id: i64, owner: Uuid) -> CommentProperties {
        let profile = Profile::personal(owner, "Ada", "Lovelace", None, None);
        CommentProperties {
            post_id,
            content: "hi".to_string(),
            author: profile.comment_author(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_post_links_author() {
        let store = InMemoryFeedStore::new();
        let owner = Uuid::new_v4();

        let post = store.create_post(&props(owner, Utc::now())).await.unwrap();

        assert!(store.has_user(owner).await);
        assert_eq!(post.likes_count, 0);
        assert_eq!(store.edge_count().await, 1);
    }

    #[tokio::test]
    async fn test_list_posts_empty_page_reports_zero() {
        let store = InMemoryFeedStore::new();
        let owner = Uuid::new_v4();
        store.create_post(&props(owner, Utc::now())).await.unwrap();

        let (page, total) = store.list_posts(5, 10).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 0);

        let (page, total) = store.list_posts(0, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_remove_like_decrements_per_edge() {
        let store = InMemoryFeedStore::new();
        let owner = Uuid::new_v4();
        let post = store.create_post(&props(owner, Utc::now())).await.unwrap();

        // Two concurrent likes can both land
        store.add_like(post.id, owner, Utc::now()).await.unwrap();
        store.add_like(post.id, owner, Utc::now()).await.unwrap();
        assert_eq!(store.post_node(post.id).await.unwrap().likes_count, 2);

        assert_eq!(store.remove_like(post.id, owner).await.unwrap(), 2);
        assert_eq!(store.post_node(post.id).await.unwrap().likes_count, 0);
        assert_eq!(store.like_edges(post.id, owner).await, 0);
    }

    #[tokio::test]
    async fn test_link_reply_requires_same_post() {
        let store = InMemoryFeedStore::new();
        let owner = Uuid::new_v4();
        let first = store.create_post(&props(owner, Utc::now())).await.unwrap();
        let second = store.create_post(&props(owner, Utc::now())).await.unwrap();

        let a = store.create_comment(&comment(first.id, owner)).await.unwrap().unwrap();
        let b = store.create_comment(&comment(second.id, owner)).await.unwrap().unwrap();
        let c = store.create_comment(&comment(first.id, owner)).await.unwrap().unwrap();

        assert!(!store.link_reply(b.id, a.id).await.unwrap());
        assert!(!store.link_reply(a.id, a.id).await.unwrap());
        assert!(store.link_reply(c.id, a.id).await.unwrap());

        assert_eq!(store.find_parent_id(c.id).await.unwrap(), Some(a.id));
        assert_eq!(store.find_parent_id(b.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_comment_on_missing_post() {
        let store = InMemoryFeedStore::new();
        let created = store
            .create_comment(&comment(42, Uuid::new_v4()))
            .await
            .unwrap();
        assert!(created.is_none());
    }

    #[tokio::test]
    async fn test_replace_vote_drops_existing_edge() {
        let store = InMemoryFeedStore::new();
        let owner = Uuid::new_v4();
        let voter = Uuid::new_v4();
        let profile = Profile::personal(owner, "Ada", "Lovelace", None, None);
        let input = PostInput::poll(
            "pick",
            PollSettings::new(VotingType::MultiVote, PollDuration::OneDay, &["a", "b", "c"]),
        );
        let poll = store
            .create_post(&PostProperties::from_input(&input, &profile, Utc::now()))
            .await
            .unwrap();

        let first = vec!["a".to_string()];
        let second = vec!["b".to_string(), "c".to_string()];
        store.replace_vote(poll.id, voter, &first, Utc::now()).await.unwrap();
        store.replace_vote(poll.id, voter, &second, Utc::now()).await.unwrap();

        assert_eq!(store.vote_edges(poll.id, voter).await, 1);
        assert_eq!(store.find_vote(poll.id, voter).await.unwrap(), Some(second.clone()));

        let ballots = store.poll_ballots(poll.id, voter).await.unwrap();
        assert_eq!(ballots.ballots, vec![second.clone()]);
        assert_eq!(ballots.chosen, Some(second));
    }

    #[tokio::test]
    async fn test_replace_vote_on_text_post_matches_nothing() {
        let store = InMemoryFeedStore::new();
        let owner = Uuid::new_v4();
        let post = store.create_post(&props(owner, Utc::now())).await.unwrap();

        let written = store
            .replace_vote(post.id, owner, &["a".to_string()], Utc::now())
            .await
            .unwrap();
        assert!(written.is_none());
        assert_eq!(store.vote_edges(post.id, owner).await, 0);
    }
}
