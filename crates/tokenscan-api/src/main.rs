use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{routing::get, Router};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokenscan_common::store::{PgPortfolioStore, PgTokenStore, PgTransferStore};

mod cache;
mod error;
mod handlers;
mod services;

use cache::RedisCache;
use services::{HoldersService, PortfolioService, StatsService, TokenService, TransferService};

pub struct AppState {
    pub transfers: TransferService,
    pub tokens: TokenService,
    pub stats: StatsService,
    pub holders: HoldersService,
    pub portfolio: PortfolioService,
    pub pool: PgPool,
    pub cache: Option<RedisCache>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tokenscan_api=info,tower_http=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting tokenscan API server");

    // Load configuration
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let redis_url = std::env::var("REDIS_URL").ok();
    let host = std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("API_PORT")
        .unwrap_or_else(|_| "8081".to_string())
        .parse()
        .expect("Invalid API_PORT");
    let db_max_connections: u32 = std::env::var("DB_MAX_CONNECTIONS")
        .unwrap_or_else(|_| "20".to_string())
        .parse()
        .expect("Invalid DB_MAX_CONNECTIONS");
    let db_statement_timeout = Duration::from_millis(
        std::env::var("DB_STATEMENT_TIMEOUT_MS")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .expect("Invalid DB_STATEMENT_TIMEOUT_MS"),
    );

    // Create database pool
    let pool = tokenscan_common::db::create_pool(
        &database_url,
        db_max_connections,
        db_statement_timeout,
    )
    .await?;

    // Run migrations
    tracing::info!("Running database migrations");
    tokenscan_common::db::run_migrations(&pool).await?;

    // Cache is optional; a missing or unreachable Redis degrades to
    // uncached reads.
    let cache = match redis_url {
        Some(url) => match RedisCache::connect(&url).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, running without cache");
                None
            }
        },
        None => None,
    };

    let transfer_store = Arc::new(PgTransferStore::new(pool.clone()));
    let token_store = Arc::new(PgTokenStore::new(pool.clone()));
    let portfolio_store = Arc::new(PgPortfolioStore::new(pool.clone()));

    let state = Arc::new(AppState {
        transfers: TransferService::new(transfer_store.clone(), cache.clone()),
        tokens: TokenService::new(token_store.clone(), cache.clone()),
        stats: StatsService::new(transfer_store.clone(), token_store.clone(), cache.clone()),
        holders: HoldersService::new(transfer_store, token_store, cache.clone()),
        portfolio: PortfolioService::new(portfolio_store, cache.clone()),
        pool,
        cache,
    });

    // Build router
    let app = Router::new()
        // Transfers
        .route("/api/v1/transfers", get(handlers::transfers::list_transfers))
        .route(
            "/api/v1/transfers/address/{address}",
            get(handlers::transfers::get_transfers_by_address),
        )
        // Tokens
        .route("/api/v1/tokens", get(handlers::tokens::list_tokens))
        .route("/api/v1/tokens/{address}", get(handlers::tokens::get_token))
        .route(
            "/api/v1/tokens/{address}/transfers",
            get(handlers::transfers::get_token_transfers),
        )
        .route(
            "/api/v1/tokens/{address}/stats",
            get(handlers::stats::get_token_stats),
        )
        // Holders
        .route(
            "/api/v1/tokens/{address}/holders/count",
            get(handlers::stats::get_holder_count),
        )
        .route(
            "/api/v1/tokens/{address}/holders/top",
            get(handlers::holders::get_top_holders),
        )
        .route(
            "/api/v1/tokens/{address}/holders/{holder}",
            get(handlers::holders::get_holder_balance),
        )
        // Portfolio
        .route(
            "/api/v1/portfolio/{wallet}",
            get(handlers::portfolio::get_portfolio),
        )
        .route(
            "/api/v1/portfolio/{wallet}/summary",
            get(handlers::portfolio::get_wallet_summary),
        )
        .route(
            "/api/v1/portfolio/{wallet}/tokens/{token}",
            get(handlers::portfolio::get_portfolio_by_token),
        )
        // Health
        .route("/health", get(handlers::status::health))
        .route("/ready", get(handlers::status::ready))
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{host}:{port}");
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
