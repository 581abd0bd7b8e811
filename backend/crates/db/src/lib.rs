pub mod crm;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod source;

use mca_common::error::{McaError, McaResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> McaResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| McaError::Database(e.to_string()))
}

/// Apply the embedded schema migrations.
pub async fn migrate(pool: &PgPool) -> McaResult<()> {
    sqlx::migrate!()
        .run(pool)
        .await
        .map_err(|e| McaError::Database(format!("migration failed: {e}")))
}
