use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub neo4j: Neo4jConfig,
    pub profiles: ProfileDbConfig,
    pub feed: FeedConfig,
}

/// Health and metrics HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    /// Neo4j bolt URI, e.g. bolt://neo4j:7687
    pub uri: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub max_connections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDbConfig {
    /// None runs with an empty in-process resolver
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Upper bound applied to every page `limit`
    pub list_max_limit: i64,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let app = AppConfig {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 8090),
        };

        // Missing NEO4J_* falls back to defaults so the service starts and
        // reports not-ready instead of crash looping.
        let neo4j = Neo4jConfig {
            uri: env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://neo4j:7687".to_string()),
            user: env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string()),
            password: env::var("NEO4J_PASSWORD").unwrap_or_else(|_| "CHANGE_ME".to_string()),
            max_connections: parse_or("NEO4J_MAX_CONNECTIONS", 16),
        };

        let profiles = ProfileDbConfig {
            database_url: env::var("PROFILE_DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            max_connections: parse_or("PROFILE_DB_MAX_CONNECTIONS", 10),
        };

        let list_max_limit: i64 = parse_or("LIST_MAX_LIMIT", 100);
        if list_max_limit < 1 {
            anyhow::bail!("LIST_MAX_LIMIT must be at least 1, got {}", list_max_limit);
        }

        Ok(Self {
            app,
            neo4j,
            profiles,
            feed: FeedConfig { list_max_limit },
        })
    }
}
