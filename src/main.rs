use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clob_matching_engine::api::{self, AppState};
use clob_matching_engine::cache::CacheManager;
use clob_matching_engine::config::AppConfig;
use clob_matching_engine::db::Database;
use clob_matching_engine::services::matching::MatchingEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;

    let db = Database::connect(&config.database_url).await?;
    tracing::info!("database connected, migrations applied");

    let cache = Arc::new(CacheManager::connect(&config.redis_url).await?);
    tracing::info!("redis connected");

    cache.orderbook.restore_all(&db.pool).await?;
    tracing::info!("order-book cache warmed from storage");

    let engine = Arc::new(MatchingEngine::new(
        db,
        cache,
        config.lock_ttl_secs,
        config.matching.clone(),
    ));

    let state = Arc::new(AppState { engine });

    let app = api::router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from_str(&config.bind_addr)?;
    tracing::info!(%addr, "matching engine listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
