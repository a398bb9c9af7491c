//! Profile Resolver: turns an account id into the display fields copied onto
//! posts and comments. Individuals are looked up first, organisations second.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::domain::profile::Profile;
use crate::error::{FeedError, FeedResult};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProfileResolver: Send + Sync {
    /// NotFound("User") when the id matches neither kind of profile
    async fn resolve(&self, user_id: Uuid) -> FeedResult<Profile>;
}

#[derive(Debug, sqlx::FromRow)]
struct PersonalProfileRow {
    user_id: Uuid,
    name: String,
    family: String,
    headline: Option<String>,
    avatar: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct CompanyProfileRow {
    user_id: Uuid,
    company_name: String,
    avatar: Option<String>,
}

/// Reads profiles from the account database
#[derive(Clone)]
pub struct PgProfileResolver {
    pool: PgPool,
}

impl PgProfileResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to profile database")?;
        Ok(Self::new(pool))
    }

    async fn personal(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        let row = sqlx::query_as::<_, PersonalProfileRow>(
            r#"
            SELECT user_id, name, family, headline, avatar
            FROM personal_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query personal profile")?;

        Ok(row.map(|r| Profile::personal(r.user_id, &r.name, &r.family, r.headline, r.avatar)))
    }

    async fn company(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        let row = sqlx::query_as::<_, CompanyProfileRow>(
            r#"
            SELECT user_id, company_name, avatar
            FROM company_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query company profile")?;

        Ok(row.map(|r| Profile::organization(r.user_id, &r.company_name, r.avatar)))
    }
}

#[async_trait::async_trait]
impl ProfileResolver for PgProfileResolver {
    async fn resolve(&self, user_id: Uuid) -> FeedResult<Profile> {
        if let Some(profile) = self.personal(user_id).await? {
            debug!("Resolved personal profile {}", user_id);
            return Ok(profile);
        }
        if let Some(profile) = self.company(user_id).await? {
            debug!("Resolved company profile {}", user_id);
            return Ok(profile);
        }
        Err(FeedError::not_found("User"))
    }
}

/// Fixed set of profiles, for tests and deployments without an account database
#[derive(Debug, Clone, Default)]
pub struct StaticProfileResolver {
    profiles: HashMap<Uuid, Profile>,
}

impl StaticProfileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profiles.insert(profile.user_id, profile);
        self
    }

    pub fn insert(&mut self, profile: Profile) {
        self.profiles.insert(profile.user_id, profile);
    }
}

#[async_trait::async_trait]
impl ProfileResolver for StaticProfileResolver {
    async fn resolve(&self, user_id: Uuid) -> FeedResult<Profile> {
        self.profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| FeedError::not_found("User"))
    }
}
