use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use feed_graph_service::clock::SystemClock;
use feed_graph_service::config::Config;
use feed_graph_service::health::{self, HealthState};
use feed_graph_service::profiles::{PgProfileResolver, ProfileResolver, StaticProfileResolver};
use feed_graph_service::{FeedGraphStore, FeedServices, Neo4jFeedStore};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feed_graph_service=info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Feed Graph Service");

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;

    info!(
        "Configuration loaded: env = {}, port = {}, Neo4j URI = {}, profile DB = {}",
        config.app.env,
        config.app.port,
        config.neo4j.uri,
        config.profiles.database_url.is_some()
    );

    let neo4j = Neo4jFeedStore::new(
        &config.neo4j.uri,
        &config.neo4j.user,
        &config.neo4j.password,
        config.neo4j.max_connections,
    )
    .await
    .context("Failed to initialize Neo4j feed store")?;

    match neo4j.health_check().await {
        Ok(()) => info!("Connected to Neo4j"),
        Err(e) => error!("Neo4j health check failed: {:#}", e),
    }
    if let Err(e) = neo4j.ensure_schema().await {
        warn!("Could not ensure feed graph schema: {:#}", e);
    }

    let store: Arc<dyn FeedGraphStore> = Arc::new(neo4j);

    let profiles: Arc<dyn ProfileResolver> = match &config.profiles.database_url {
        Some(url) => Arc::new(
            PgProfileResolver::connect(url, config.profiles.max_connections)
                .await
                .context("Failed to initialize profile resolver")?,
        ),
        None => {
            warn!("PROFILE_DATABASE_URL not set, every profile lookup will be NotFound");
            Arc::new(StaticProfileResolver::new())
        }
    };

    let services = web::Data::new(FeedServices::new(
        store.clone(),
        profiles,
        Arc::new(SystemClock),
        config.feed.list_max_limit,
    ));
    let health_state = web::Data::new(HealthState::new(store));

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    info!("Health and metrics listening on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(services.clone())
            .app_data(health_state.clone())
            .configure(health::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run()
    .await
    .context("HTTP server error")?;

    info!("Feed Graph Service stopped");
    Ok(())
}
