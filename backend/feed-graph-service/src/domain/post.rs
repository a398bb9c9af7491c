use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::poll::{poll_state, PollBallots, PollState};
use super::profile::Profile;
use crate::error::{FeedError, FeedResult};

/// Post subtype. Doubles as the type-specific node label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PostType {
    Text,
    Image,
    Video,
    Poll,
}

impl PostType {
    pub fn as_label(&self) -> &'static str {
        match self {
            PostType::Text => "TEXT",
            PostType::Image => "IMAGE",
            PostType::Video => "VIDEO",
            PostType::Poll => "POLL",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "TEXT" => Some(PostType::Text),
            "IMAGE" => Some(PostType::Image),
            "VIDEO" => Some(PostType::Video),
            "POLL" => Some(PostType::Poll),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VotingType {
    SingleVote,
    MultiVote,
}

impl VotingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingType::SingleVote => "SINGLE_VOTE",
            VotingType::MultiVote => "MULTI_VOTE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SINGLE_VOTE" => Some(VotingType::SingleVote),
            "MULTI_VOTE" => Some(VotingType::MultiVote),
            _ => None,
        }
    }
}

/// Allowed poll lifetimes, serialized as a number of days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum PollDuration {
    OneDay,
    ThreeDays,
    OneWeek,
    TwoWeeks,
}

impl PollDuration {
    pub fn days(&self) -> i64 {
        match self {
            PollDuration::OneDay => 1,
            PollDuration::ThreeDays => 3,
            PollDuration::OneWeek => 7,
            PollDuration::TwoWeeks => 14,
        }
    }

    pub fn as_chrono(&self) -> chrono::Duration {
        chrono::Duration::days(self.days())
    }
}

impl TryFrom<i64> for PollDuration {
    type Error = String;

    fn try_from(days: i64) -> Result<Self, Self::Error> {
        match days {
            1 => Ok(PollDuration::OneDay),
            3 => Ok(PollDuration::ThreeDays),
            7 => Ok(PollDuration::OneWeek),
            14 => Ok(PollDuration::TwoWeeks),
            other => Err(format!(
                "unsupported poll duration {} (expected 1, 3, 7 or 14 days)",
                other
            )),
        }
    }
}

impl From<PollDuration> for i64 {
    fn from(duration: PollDuration) -> Self {
        duration.days()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub title: String,
}

impl PollOption {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// Poll configuration supplied when a poll post is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PollSettings {
    pub voting_type: VotingType,
    pub duration: PollDuration,
    #[validate(
        length(min = 1, message = "a poll needs at least one option"),
        custom(function = "validate_option_titles")
    )]
    pub options: Vec<PollOption>,
}

impl PollSettings {
    pub fn new(voting_type: VotingType, duration: PollDuration, titles: &[&str]) -> Self {
        Self {
            voting_type,
            duration,
            options: titles.iter().map(|t| PollOption::new(*t)).collect(),
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.options.iter().map(|o| o.title.clone()).collect()
    }
}

fn validate_option_titles(options: &[PollOption]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for option in options {
        if option.title.trim().is_empty() {
            return Err(ValidationError::new("empty_option_title"));
        }
        if !seen.insert(option.title.as_str()) {
            let mut err = ValidationError::new("duplicate_option_title");
            err.add_param("title".into(), &option.title);
            return Err(err);
        }
    }
    Ok(())
}

/// Subtype-specific part of a post write, keyed by `post_type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "post_type", rename_all = "UPPERCASE")]
pub enum PostKind {
    Text,
    Image { image_url: String },
    Video { video_url: String },
    Poll { poll_settings: PollSettings },
}

impl PostKind {
    pub fn post_type(&self) -> PostType {
        match self {
            PostKind::Text => PostType::Text,
            PostKind::Image { .. } => PostType::Image,
            PostKind::Video { .. } => PostType::Video,
            PostKind::Poll { .. } => PostType::Poll,
        }
    }
}

/// Create/update payload for a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostInput {
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub kind: PostKind,
}

impl PostInput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: PostKind::Text,
        }
    }

    pub fn image(content: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: PostKind::Image {
                image_url: image_url.into(),
            },
        }
    }

    pub fn video(content: impl Into<String>, video_url: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: PostKind::Video {
                video_url: video_url.into(),
            },
        }
    }

    pub fn poll(content: impl Into<String>, poll_settings: PollSettings) -> Self {
        Self {
            content: content.into(),
            kind: PostKind::Poll { poll_settings },
        }
    }

    pub fn post_type(&self) -> PostType {
        self.kind.post_type()
    }

    pub fn validate(&self) -> FeedResult<()> {
        match &self.kind {
            PostKind::Text => Ok(()),
            PostKind::Image { image_url } if image_url.trim().is_empty() => {
                Err(FeedError::validation("image post requires an image_url"))
            }
            PostKind::Video { video_url } if video_url.trim().is_empty() => {
                Err(FeedError::validation("video post requires a video_url"))
            }
            PostKind::Image { .. } | PostKind::Video { .. } => Ok(()),
            PostKind::Poll { poll_settings } => Ok(poll_settings.validate()?),
        }
    }
}

/// Owner snapshot copied onto the post node at write time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAuthor {
    pub user_id: Uuid,
    pub user_display_name: String,
    pub user_headline: Option<String>,
    pub user_avatar: Option<String>,
}

/// Property map written to a post node by create and update
#[derive(Debug, Clone, PartialEq)]
pub struct PostProperties {
    pub post_type: PostType,
    pub content: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub voting_type: Option<VotingType>,
    pub duration: Option<PollDuration>,
    /// Bare titles; tallies are never persisted
    pub options: Option<Vec<String>>,
    pub author: PostAuthor,
    /// `created_at` + `updated_at` on create, `updated_at` only on merge
    pub written_at: DateTime<Utc>,
}

impl PostProperties {
    pub fn from_input(input: &PostInput, profile: &Profile, now: DateTime<Utc>) -> Self {
        let mut props = Self {
            post_type: input.post_type(),
            content: input.content.clone(),
            image_url: None,
            video_url: None,
            voting_type: None,
            duration: None,
            options: None,
            author: profile.post_author(),
            written_at: now,
        };

        match &input.kind {
            PostKind::Text => {}
            PostKind::Image { image_url } => props.image_url = Some(image_url.clone()),
            PostKind::Video { video_url } => props.video_url = Some(video_url.clone()),
            PostKind::Poll { poll_settings } => {
                props.voting_type = Some(poll_settings.voting_type);
                props.duration = Some(poll_settings.duration);
                props.options = Some(poll_settings.titles());
            }
        }

        props
    }
}

/// Post node as stored in the graph
#[derive(Debug, Clone, PartialEq)]
pub struct PostNode {
    pub id: i64,
    pub post_type: PostType,
    pub content: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub voting_type: Option<VotingType>,
    pub duration: Option<PollDuration>,
    pub options: Option<Vec<String>>,
    pub author: PostAuthor,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostNode {
    /// Fresh node for `props`, counters at zero
    pub fn from_properties(id: i64, props: &PostProperties) -> Self {
        Self {
            id,
            post_type: props.post_type,
            content: props.content.clone(),
            image_url: props.image_url.clone(),
            video_url: props.video_url.clone(),
            voting_type: props.voting_type,
            duration: props.duration,
            options: props.options.clone(),
            author: props.author.clone(),
            likes_count: 0,
            comments_count: 0,
            created_at: props.written_at,
            updated_at: props.written_at,
        }
    }

    /// `SET p += props`: counters, type and `created_at` are left alone
    pub fn merge(&mut self, props: &PostProperties) {
        self.content = props.content.clone();
        self.image_url = props.image_url.clone();
        self.video_url = props.video_url.clone();
        self.voting_type = props.voting_type;
        self.duration = props.duration;
        self.options = props.options.clone();
        self.author = props.author.clone();
        self.updated_at = props.written_at;
    }

    pub fn is_poll(&self) -> bool {
        self.post_type == PostType::Poll
    }

    /// Voting settings of a poll node; errors when the node is not a
    /// well-formed poll.
    pub fn poll_settings(&self) -> Result<(VotingType, PollDuration, &[String])> {
        if !self.is_poll() {
            bail!("post {} is not a poll", self.id);
        }
        let voting_type = self
            .voting_type
            .with_context(|| format!("poll {} has no voting_type", self.id))?;
        let duration = self
            .duration
            .with_context(|| format!("poll {} has no duration", self.id))?;
        let options = self
            .options
            .as_deref()
            .filter(|o| !o.is_empty())
            .with_context(|| format!("poll {} has no options", self.id))?;
        Ok((voting_type, duration, options))
    }

    pub fn poll_state(&self, now: DateTime<Utc>) -> Result<PollState> {
        let (_, duration, _) = self.poll_settings()?;
        Ok(poll_state(self.created_at, duration, now))
    }

    fn ensure_no_poll_fields(&self) -> Result<()> {
        if self.voting_type.is_some() || self.duration.is_some() || self.options.is_some() {
            return Err(anyhow!(
                "{} post {} carries poll fields",
                self.post_type.as_label(),
                self.id
            ));
        }
        Ok(())
    }

    /// Rebuild the typed post. Poll fields must be present exactly when the
    /// node is a poll; `ballots` is the aggregated vote view (None = no votes).
    pub fn into_post(self, ballots: Option<&PollBallots>) -> Result<Post> {
        let body = match self.post_type {
            PostType::Poll => {
                let (voting_type, duration, options) = self.poll_settings()?;
                let results = ballots
                    .map(|b| b.tally(options))
                    .unwrap_or_else(|| PollBallots::default().tally(options));
                PostBody::Poll {
                    poll_settings: PollView {
                        voting_type,
                        duration,
                        options: results,
                    },
                }
            }
            PostType::Text => {
                self.ensure_no_poll_fields()?;
                PostBody::Text
            }
            PostType::Image => {
                self.ensure_no_poll_fields()?;
                PostBody::Image {
                    image_url: self.image_url.clone().unwrap_or_default(),
                }
            }
            PostType::Video => {
                self.ensure_no_poll_fields()?;
                PostBody::Video {
                    video_url: self.video_url.clone().unwrap_or_default(),
                }
            }
        };

        Ok(Post {
            id: self.id,
            author: self.author,
            content: self.content,
            body,
            likes_count: self.likes_count,
            comments_count: self.comments_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Per-option result for the viewing user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptionResult {
    pub title: String,
    pub count: i64,
    pub chosen: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollView {
    pub voting_type: VotingType,
    pub duration: PollDuration,
    pub options: Vec<PollOptionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "post_type", rename_all = "UPPERCASE")]
pub enum PostBody {
    Text,
    Image { image_url: String },
    Video { video_url: String },
    Poll { poll_settings: PollView },
}

/// Post as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    #[serde(flatten)]
    pub author: PostAuthor,
    pub content: String,
    #[serde(flatten)]
    pub body: PostBody,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn post_type(&self) -> PostType {
        match self.body {
            PostBody::Text => PostType::Text,
            PostBody::Image { .. } => PostType::Image,
            PostBody::Video { .. } => PostType::Video,
            PostBody::Poll { .. } => PostType::Poll,
        }
    }

    pub fn poll(&self) -> Option<&PollView> {
        match &self.body {
            PostBody::Poll { poll_settings } => Some(poll_settings),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedPosts {
    pub data: Vec<Post>,
    pub count: i64,
}
