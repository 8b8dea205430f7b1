use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};

/// Open the shared connection pool.
///
/// Every connection gets a server-side statement timeout so a runaway
/// holder ranking or stats aggregation cannot pin the pool. The pool is
/// pinged before it is handed out: an unreachable database fails startup,
/// not the first query.
pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
    statement_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    let set_timeout = format!(
        "SET statement_timeout = '{}ms'",
        statement_timeout.as_millis()
    );

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .after_connect(move |conn, _meta| {
            let set_timeout = set_timeout.clone();
            Box::pin(async move {
                conn.execute(set_timeout.as_str()).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    Ok(pool)
}

/// Apply the workspace migrations (tokens, the transfers hypertable,
/// indexer_state), embedded at compile time. Both binaries run this at
/// startup so either can be deployed first.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}
