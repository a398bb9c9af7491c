use super::{from_millis, to_millis, FeedGraphStore};
use crate::domain::comment::{CommentAuthor, CommentNode, CommentProperties};
use crate::domain::edge::NodeLabel;
use crate::domain::poll::PollBallots;
use crate::domain::post::{PollDuration, PostAuthor, PostNode, PostProperties, PostType, VotingType};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use neo4rs::{query, ConfigBuilder, Graph, Node, Query, Row};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Feed graph backed by Neo4j
#[derive(Clone)]
pub struct Neo4jFeedStore {
    graph: Arc<Graph>,
}

impl Neo4jFeedStore {
    pub async fn new(uri: &str, user: &str, password: &str, max_connections: usize) -> Result<Self> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .max_connections(max_connections)
            .build()
            .context("Invalid Neo4j configuration")?;

        let graph = Graph::connect(config)
            .await
            .context("Failed to connect to Neo4j")?;

        Ok(Self {
            graph: Arc::new(graph),
        })
    }

    /// Run a side-effect-free query and collect its rows
    async fn read_rows(&self, q: Query, what: &'static str) -> Result<Vec<Row>> {
        let mut result = self
            .graph
            .execute(q)
            .await
            .with_context(|| format!("Failed to {}", what))?;

        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Run a mutating query inside an explicit transaction and collect its rows
    async fn write_rows(&self, q: Query, what: &'static str) -> Result<Vec<Row>> {
        let mut txn = self
            .graph
            .start_txn()
            .await
            .context("Failed to open write transaction")?;

        let mut result = txn
            .execute(q)
            .await
            .with_context(|| format!("Failed to {}", what))?;

        let mut rows = Vec::new();
        while let Some(row) = result.next(txn.handle()).await? {
            rows.push(row);
        }

        txn.commit()
            .await
            .with_context(|| format!("Failed to commit {}", what))?;
        Ok(rows)
    }
}

fn bind_post_properties(q: Query, props: &PostProperties) -> Query {
    q.param("post_type", props.post_type.as_label())
        .param("content", props.content.clone())
        .param("image_url", props.image_url.clone())
        .param("video_url", props.video_url.clone())
        .param("voting_type", props.voting_type.map(|v| v.as_str()))
        .param("duration", props.duration.map(|d| d.days()))
        .param("options", props.options.clone())
        .param("user_id", props.author.user_id.to_string())
        .param("user_display_name", props.author.user_display_name.clone())
        .param("user_headline", props.author.user_headline.clone())
        .param("user_avatar", props.author.user_avatar.clone())
        .param("written_at", to_millis(props.written_at))
}

fn parse_user_id(node: &Node) -> Result<Uuid> {
    let raw: String = node.get("user_id").context("Missing user_id")?;
    Uuid::parse_str(&raw).with_context(|| format!("Invalid user_id '{}'", raw))
}

fn post_from_row(row: &Row) -> Result<PostNode> {
    let id: i64 = row.get("id").context("Missing post id")?;
    let node: Node = row.get("p").context("Missing post node")?;

    let label: String = node.get("post_type").context("Missing post_type")?;
    let post_type =
        PostType::from_label(&label).with_context(|| format!("Unknown post_type '{}'", label))?;

    let voting_type = match node.get::<String>("voting_type").ok() {
        Some(raw) => Some(
            VotingType::parse(&raw).with_context(|| format!("Unknown voting_type '{}'", raw))?,
        ),
        None => None,
    };
    let duration = match node.get::<i64>("duration").ok() {
        Some(days) => Some(PollDuration::try_from(days).map_err(|e| anyhow!(e))?),
        None => None,
    };

    Ok(PostNode {
        id,
        post_type,
        content: node.get("content").unwrap_or_default(),
        image_url: node.get("image_url").ok(),
        video_url: node.get("video_url").ok(),
        voting_type,
        duration,
        options: node.get("options").ok(),
        author: PostAuthor {
            user_id: parse_user_id(&node)?,
            user_display_name: node.get("user_display_name").unwrap_or_default(),
            user_headline: node.get("user_headline").ok(),
            user_avatar: node.get("user_avatar").ok(),
        },
        likes_count: node.get("likes_count").unwrap_or(0),
        comments_count: node.get("comments_count").unwrap_or(0),
        created_at: from_millis(node.get("created_at").context("Missing created_at")?)?,
        updated_at: from_millis(node.get("updated_at").context("Missing updated_at")?)?,
    })
}

fn comment_from_row(row: &Row) -> Result<CommentNode> {
    let id: i64 = row.get("id").context("Missing comment id")?;
    let node: Node = row.get("c").context("Missing comment node")?;

    Ok(CommentNode {
        id,
        post_id: node.get("post_id").context("Missing post_id")?,
        parent_id: node.get("parent_id").ok(),
        content: node.get("content").unwrap_or_default(),
        author: CommentAuthor {
            user_id: parse_user_id(&node)?,
            user_display_name: node.get("user_display_name").unwrap_or_default(),
            user_avatar: node.get("user_avatar").ok(),
        },
        created_at: from_millis(node.get("created_at").context("Missing created_at")?)?,
    })
}

/// Pull the shared `total` column off the first row of a page
fn page_total(rows: &[Row]) -> i64 {
    rows.first()
        .and_then(|row| row.get::<i64>("total").ok())
        .unwrap_or(0)
}

#[async_trait::async_trait]
impl FeedGraphStore for Neo4jFeedStore {
    async fn create_post(&self, props: &PostProperties) -> Result<PostNode> {
        // Label comes from a closed enum, never from caller input
        let cypher = format!(
            r#"
            MERGE (u:USER {{user_id: $user_id}})
            CREATE (p:{post}:{label} {{
                post_type: $post_type,
                content: $content,
                image_url: $image_url,
                video_url: $video_url,
                voting_type: $voting_type,
                duration: $duration,
                options: $options,
                user_id: $user_id,
                user_display_name: $user_display_name,
                user_headline: $user_headline,
                user_avatar: $user_avatar,
                likes_count: 0,
                comments_count: 0,
                created_at: $written_at,
                updated_at: $written_at
            }})
            CREATE (p)-[:CREATED_BY]->(u)
            RETURN ID(p) AS id, p
            "#,
            post = NodeLabel::Post.as_str(),
            label = props.post_type.as_label()
        );

        let rows = self
            .write_rows(bind_post_properties(query(&cypher), props), "create post")
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| anyhow!("Create post returned no rows"))?;
        let post = post_from_row(row)?;

        debug!(
            "Created {} post {} by {}",
            props.post_type.as_label(),
            post.id,
            props.author.user_id
        );
        Ok(post)
    }

    async fn get_post(&self, post_id: i64) -> Result<Option<PostNode>> {
        let cypher = r#"
            MATCH (p:POST)
            WHERE ID(p) = $post_id
            RETURN ID(p) AS id, p
        "#;

        let rows = self
            .read_rows(query(cypher).param("post_id", post_id), "get post")
            .await?;
        rows.first().map(post_from_row).transpose()
    }

    async fn get_poll(&self, post_id: i64) -> Result<Option<PostNode>> {
        let cypher = r#"
            MATCH (p:POST:POLL)
            WHERE ID(p) = $post_id
            RETURN ID(p) AS id, p
        "#;

        let rows = self
            .read_rows(query(cypher).param("post_id", post_id), "get poll")
            .await?;
        rows.first().map(post_from_row).transpose()
    }

    async fn list_posts(&self, offset: i64, limit: i64) -> Result<(Vec<PostNode>, i64)> {
        let cypher = r#"
            MATCH (counted:POST)
            WITH count(counted) AS total
            MATCH (p:POST)
            WITH p, total
            ORDER BY p.created_at DESC
            RETURN ID(p) AS id, p, total
            SKIP $offset
            LIMIT $limit
        "#;

        let rows = self
            .read_rows(
                query(cypher)
                    .param("offset", offset)
                    .param("limit", limit),
                "list posts",
            )
            .await?;

        let total = page_total(&rows);
        let posts = rows.iter().map(post_from_row).collect::<Result<Vec<_>>>()?;

        debug!("Listed {} posts (offset: {}, total: {})", posts.len(), offset, total);
        Ok((posts, total))
    }

    async fn merge_post(
        &self,
        post_id: i64,
        owner: Uuid,
        props: &PostProperties,
    ) -> Result<Option<PostNode>> {
        let cypher = format!(
            r#"
            MATCH (p:{post}:{label})
            WHERE ID(p) = $post_id AND p.user_id = $owner
            SET p += {{
                content: $content,
                image_url: $image_url,
                video_url: $video_url,
                voting_type: $voting_type,
                duration: $duration,
                options: $options,
                user_display_name: $user_display_name,
                user_headline: $user_headline,
                user_avatar: $user_avatar,
                updated_at: $written_at
            }}
            RETURN ID(p) AS id, p
            "#,
            post = NodeLabel::Post.as_str(),
            label = props.post_type.as_label()
        );

        let q = bind_post_properties(query(&cypher), props)
            .param("post_id", post_id)
            .param("owner", owner.to_string());
        let rows = self.write_rows(q, "update post").await?;

        debug!("Merged post {} for {} (matched: {})", post_id, owner, !rows.is_empty());
        rows.first().map(post_from_row).transpose()
    }

    async fn delete_post(&self, post_id: i64, owner: Uuid) -> Result<bool> {
        let cypher = r#"
            MATCH (p:POST)
            WHERE ID(p) = $post_id AND p.user_id = $owner
            OPTIONAL MATCH (c:COMMENT)-[:BELONGS_TO]->(p)
            WITH p, collect(c) AS comments
            FOREACH (comment IN comments | DETACH DELETE comment)
            DETACH DELETE p
            RETURN size(comments) AS removed_comments
        "#;

        let rows = self
            .write_rows(
                query(cypher)
                    .param("post_id", post_id)
                    .param("owner", owner.to_string()),
                "delete post",
            )
            .await?;

        if let Some(row) = rows.first() {
            let removed: i64 = row.get("removed_comments").unwrap_or(0);
            debug!("Deleted post {} and {} comments", post_id, removed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn remove_like(&self, post_id: i64, user_id: Uuid) -> Result<u64> {
        // One row per deleted edge; SET runs once per row
        let cypher = r#"
            MATCH (u:USER {user_id: $user_id})-[l:LIKE]->(p:POST)
            WHERE ID(p) = $post_id
            DELETE l
            SET p.likes_count = p.likes_count - 1
            RETURN p.likes_count AS likes_count
        "#;

        let rows = self
            .write_rows(
                query(cypher)
                    .param("post_id", post_id)
                    .param("user_id", user_id.to_string()),
                "remove like",
            )
            .await?;

        debug!("Removed {} LIKE edges: {} -> {}", rows.len(), user_id, post_id);
        Ok(rows.len() as u64)
    }

    async fn add_like(&self, post_id: i64, user_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let cypher = r#"
            MATCH (p:POST)
            WHERE ID(p) = $post_id
            MERGE (u:USER {user_id: $user_id})
            CREATE (u)-[:LIKE {created_at: $created_at}]->(p)
            SET p.likes_count = p.likes_count + 1
            RETURN p.likes_count AS likes_count
        "#;

        let rows = self
            .write_rows(
                query(cypher)
                    .param("post_id", post_id)
                    .param("user_id", user_id.to_string())
                    .param("created_at", to_millis(at)),
                "add like",
            )
            .await?;

        debug!("Created LIKE: {} -> {}", user_id, post_id);
        Ok(!rows.is_empty())
    }

    async fn find_vote(&self, post_id: i64, user_id: Uuid) -> Result<Option<Vec<String>>> {
        let cypher = r#"
            MATCH (u:USER {user_id: $user_id})-[v:VOTED]->(p:POST:POLL)
            WHERE ID(p) = $post_id
            RETURN v.selected_options AS selected_options
            LIMIT 1
        "#;

        let rows = self
            .read_rows(
                query(cypher)
                    .param("post_id", post_id)
                    .param("user_id", user_id.to_string()),
                "check existing vote",
            )
            .await?;

        rows.first()
            .map(|row| {
                row.get::<Vec<String>>("selected_options")
                    .context("Malformed VOTED edge")
            })
            .transpose()
    }

    async fn replace_vote(
        &self,
        post_id: i64,
        user_id: Uuid,
        selected: &[String],
        at: DateTime<Utc>,
    ) -> Result<Option<PostNode>> {
        let cypher = r#"
            MATCH (p:POST:POLL)
            WHERE ID(p) = $post_id
            MERGE (u:USER {user_id: $user_id})
            WITH p, u
            OPTIONAL MATCH (u)-[old:VOTED]->(p)
            DELETE old
            WITH DISTINCT p, u
            CREATE (u)-[:VOTED {selected_options: $selected_options, created_at: $created_at}]->(p)
            RETURN ID(p) AS id, p
        "#;

        let rows = self
            .write_rows(
                query(cypher)
                    .param("post_id", post_id)
                    .param("user_id", user_id.to_string())
                    .param("selected_options", selected.to_vec())
                    .param("created_at", to_millis(at)),
                "write vote",
            )
            .await?;

        debug!("Created VOTED: {} -> {} {:?}", user_id, post_id, selected);
        rows.first().map(post_from_row).transpose()
    }

    async fn poll_ballots(&self, post_id: i64, viewer: Uuid) -> Result<PollBallots> {
        let cypher = r#"
            MATCH (p:POST:POLL)
            WHERE ID(p) = $post_id
            OPTIONAL MATCH (:USER)-[v:VOTED]->(p)
            WITH p, collect(v.selected_options) AS ballots
            OPTIONAL MATCH (:USER {user_id: $user_id})-[mine:VOTED]->(p)
            RETURN ballots, mine.selected_options AS chosen
        "#;

        let rows = self
            .read_rows(
                query(cypher)
                    .param("post_id", post_id)
                    .param("user_id", viewer.to_string()),
                "aggregate poll votes",
            )
            .await?;

        let Some(row) = rows.first() else {
            return Ok(PollBallots::default());
        };

        Ok(PollBallots {
            ballots: row.get("ballots").context("Malformed ballots")?,
            chosen: row.get::<Option<Vec<String>>>("chosen").unwrap_or(None),
        })
    }

    async fn create_comment(&self, props: &CommentProperties) -> Result<Option<CommentNode>> {
        let cypher = r#"
            MATCH (p:POST)
            WHERE ID(p) = $post_id
            MERGE (u:USER {user_id: $user_id})
            CREATE (c:COMMENT {
                post_id: $post_id,
                content: $content,
                user_id: $user_id,
                user_display_name: $user_display_name,
                user_avatar: $user_avatar,
                created_at: $created_at
            })
            CREATE (c)-[:BELONGS_TO]->(p)<-[:COMMENTED_ON]-(u),
                   (c)-[:COMMENT_BY]->(u)
            SET p.comments_count = p.comments_count + 1
            RETURN ID(c) AS id, c
        "#;

        let rows = self
            .write_rows(
                query(cypher)
                    .param("post_id", props.post_id)
                    .param("content", props.content.clone())
                    .param("user_id", props.author.user_id.to_string())
                    .param("user_display_name", props.author.user_display_name.clone())
                    .param("user_avatar", props.author.user_avatar.clone())
                    .param("created_at", to_millis(props.created_at)),
                "create comment",
            )
            .await?;

        let comment = rows.first().map(comment_from_row).transpose()?;
        if let Some(c) = &comment {
            debug!("Created comment {} on post {}", c.id, c.post_id);
        }
        Ok(comment)
    }

    async fn link_reply(&self, child_id: i64, parent_id: i64) -> Result<bool> {
        let cypher = r#"
            MATCH (parent:COMMENT)-[:BELONGS_TO]->(p:POST)<-[:BELONGS_TO]-(child:COMMENT)
            WHERE ID(parent) = $parent_id AND ID(child) = $child_id AND parent <> child
            CREATE (child)-[:REPLY_ON]->(parent)
            SET child.parent_id = ID(parent)
            RETURN ID(parent) AS parent_id
        "#;

        let rows = self
            .write_rows(
                query(cypher)
                    .param("child_id", child_id)
                    .param("parent_id", parent_id),
                "link reply",
            )
            .await?;

        debug!("Linked REPLY_ON: {} -> {} (matched: {})", child_id, parent_id, !rows.is_empty());
        Ok(!rows.is_empty())
    }

    async fn find_parent_id(&self, comment_id: i64) -> Result<Option<i64>> {
        let cypher = r#"
            MATCH (child:COMMENT)-[:REPLY_ON]->(parent:COMMENT)
            WHERE ID(child) = $child_id
            RETURN ID(parent) AS parent_id
            LIMIT 1
        "#;

        let rows = self
            .read_rows(query(cypher).param("child_id", comment_id), "find reply parent")
            .await?;

        Ok(rows.first().and_then(|row| row.get::<i64>("parent_id").ok()))
    }

    async fn list_comments(
        &self,
        post_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<CommentNode>, i64)> {
        // total is taken over every COMMENT node, not just this post's
        let cypher = r#"
            MATCH (counted:COMMENT)
            WITH count(counted) AS total
            MATCH (c:COMMENT)-[:BELONGS_TO]->(p:POST)
            WHERE ID(p) = $post_id
            WITH c, total
            ORDER BY c.created_at DESC
            RETURN ID(c) AS id, c, total
            SKIP $offset
            LIMIT $limit
        "#;

        let rows = self
            .read_rows(
                query(cypher)
                    .param("post_id", post_id)
                    .param("offset", offset)
                    .param("limit", limit),
                "list comments",
            )
            .await?;

        let total = page_total(&rows);
        let comments = rows
            .iter()
            .map(comment_from_row)
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Listed {} comments for post {} (offset: {}, total: {})",
            comments.len(),
            post_id,
            offset,
            total
        );
        Ok((comments, total))
    }

    async fn delete_comment(&self, comment_id: i64, owner: Uuid) -> Result<bool> {
        // Direct replies only; their own replies lose the REPLY_ON edge
        let cypher = r#"
            MATCH (c:COMMENT)-[:BELONGS_TO]->(p:POST)
            WHERE ID(c) = $comment_id AND c.user_id = $owner
            OPTIONAL MATCH (c)<-[:REPLY_ON]-(reply:COMMENT)
            WITH c, p, collect(reply) AS replies
            FOREACH (r IN replies | DETACH DELETE r)
            DETACH DELETE c
            SET p.comments_count = p.comments_count - 1
            RETURN ID(p) AS post_id, size(replies) AS removed_replies
        "#;

        let rows = self
            .write_rows(
                query(cypher)
                    .param("comment_id", comment_id)
                    .param("owner", owner.to_string()),
                "delete comment",
            )
            .await?;

        if let Some(row) = rows.first() {
            let removed: i64 = row.get("removed_replies").unwrap_or(0);
            debug!("Deleted comment {} and {} direct replies", comment_id, removed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            "CREATE CONSTRAINT feed_user_id IF NOT EXISTS FOR (u:USER) REQUIRE u.user_id IS UNIQUE",
            "CREATE INDEX feed_post_created_at IF NOT EXISTS FOR (p:POST) ON (p.created_at)",
            "CREATE INDEX feed_comment_created_at IF NOT EXISTS FOR (c:COMMENT) ON (c.created_at)",
        ];

        for statement in statements {
            self.graph
                .run(query(statement))
                .await
                .with_context(|| format!("Failed to apply schema statement: {}", statement))?;
        }

        debug!("Feed graph schema ensured");
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let rows = self
            .read_rows(query("RETURN 1 AS health"), "run health check")
            .await?;

        let healthy = rows
            .first()
            .and_then(|row| row.get::<i64>("health").ok())
            .map(|h| h == 1)
            .unwrap_or(false);

        if !healthy {
            anyhow::bail!("Neo4j health check failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::post::{PollSettings, PostInput};
    use crate::domain::profile::Profile;

    // NOTE: These tests require a running Neo4j instance
    // Run with: docker run -p 7687:7687 -e NEO4J_AUTH=neo4j/password neo4j:5

    async fn store() -> Neo4jFeedStore {
        Neo4jFeedStore::new("bolt://localhost:7687", "neo4j", "password", 4)
            .await
            .expect("Failed to connect to Neo4j")
    }

    fn props(input: &PostInput, owner: Uuid) -> PostProperties {
        let profile = Profile::personal(owner, "Test", "User", None, None);
        PostProperties::from_input(input, &profile, Utc::now())
    }

    #[tokio::test]
    #[ignore] // Ignore by default, run manually with: cargo test -- --ignored
    async fn test_like_twice_keeps_single_edge() {
        let store = store().await;
        let owner = Uuid::new_v4();
        let post = store
            .create_post(&props(&PostInput::text("hello"), owner))
            .await
            .expect("Failed to create post");

        for _ in 0..2 {
            store.remove_like(post.id, owner).await.expect("remove like");
            store
                .add_like(post.id, owner, Utc::now())
                .await
                .expect("add like");
        }

        let reloaded = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(reloaded.likes_count, 1);

        // Cleanup
        assert!(store.delete_post(post.id, owner).await.unwrap());
    }

    #[tokio::test]
    #[ignore]
    async fn test_vote_round_trip() {
        let store = store().await;
        let owner = Uuid::new_v4();
        let input = PostInput::poll(
            "?",
            PollSettings::new(
                VotingType::MultiVote,
                PollDuration::OneDay,
                &["a", "b"],
            ),
        );
        let poll = store.create_post(&props(&input, owner)).await.unwrap();

        let selected = vec!["a".to_string(), "b".to_string()];
        store
            .replace_vote(poll.id, owner, &selected, Utc::now())
            .await
            .unwrap()
            .expect("poll matched");

        assert_eq!(store.find_vote(poll.id, owner).await.unwrap(), Some(selected.clone()));
        let ballots = store.poll_ballots(poll.id, owner).await.unwrap();
        assert_eq!(ballots.ballots, vec![selected.clone()]);
        assert_eq!(ballots.chosen, Some(selected));

        // Cleanup
        store.delete_post(poll.id, owner).await.ok();
    }
}
