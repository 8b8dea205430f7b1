use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use tokenscan_common::store::{PgStateStore, PgTokenStore, PgTransferStore, TokenStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod config;
mod fetcher;
mod indexer;
mod metadata;
mod metrics;
mod parser;

use client::ChainClient;
use config::Config;
use fetcher::Fetcher;
use indexer::{IndexerService, IndexerSettings};
use metadata::MetadataProvider;
use metrics::IndexerMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tokenscan_indexer=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting tokenscan indexer");

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Create database pool
    let pool = tokenscan_common::db::create_pool(
        &config.database_url,
        config.db_max_connections,
        config.db_statement_timeout,
    )
    .await?;

    // Run migrations
    tracing::info!("Running database migrations");
    tokenscan_common::db::run_migrations(&pool).await?;

    // Connect to the chain node (validates the chain id)
    let client = Arc::new(ChainClient::connect(&config).await?);
    let fetcher = Arc::new(Fetcher::new(
        Arc::clone(&client),
        config.block_confirmations,
        config.worker_count,
    ));

    let transfers = Arc::new(PgTransferStore::new(pool.clone()));
    let tokens: Arc<dyn TokenStore> = Arc::new(PgTokenStore::new(pool.clone()));
    let state = Arc::new(PgStateStore::new(pool.clone()));

    let metrics = Arc::new(IndexerMetrics::new());
    let cancel = CancellationToken::new();

    let service = IndexerService::new(
        fetcher,
        transfers,
        Arc::clone(&tokens),
        state,
        IndexerSettings::from(&config),
        Arc::clone(&metrics),
        cancel.clone(),
    );

    service.initialize_tokens().await?;

    // Refresh placeholder metadata in the background; indexing never waits
    // on RPC metadata.
    let metadata_provider = MetadataProvider::new(Arc::clone(&client));
    let metadata_tokens = Arc::clone(&tokens);
    let metadata_addresses = config.token_addresses.clone();
    tokio::spawn(async move {
        metadata_provider.refresh(metadata_tokens, &metadata_addresses).await;
    });

    // Ops endpoint: Prometheus metrics + health
    tokio::spawn(serve_ops(config.metrics_port, Arc::clone(&metrics)));

    // One-shot backfill requested through the environment; runs alongside
    // the live loop.
    if let Some(job) = config.backfill.clone() {
        let backfill_service = service.clone();
        tokio::spawn(async move {
            if let Err(e) = backfill_service
                .backfill(&job.token_address, job.from_block, job.to_block)
                .await
            {
                tracing::error!(token = %job.token_address, error = %e, "Backfill failed");
            }
        });
    }

    let runner = tokio::spawn(async move { service.run().await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal, stopping indexer");
    cancel.cancel();
    runner.await?;

    tracing::info!("Indexer stopped");
    Ok(())
}

async fn serve_ops(port: u16, metrics: Arc<IndexerMetrics>) {
    let app = Router::new()
        .route("/metrics", get(render_metrics))
        .route("/health", get(|| async { "OK" }))
        .with_state(metrics);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "Starting ops server");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Failed to bind ops server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Ops server error");
    }
}

async fn render_metrics(State(metrics): State<Arc<IndexerMetrics>>) -> String {
    metrics.render()
}
