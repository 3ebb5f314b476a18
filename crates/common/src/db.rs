//! Database connection pool management
//!
//! SQLite connection pooling via sqlx, integrated with the tokio runtime.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::Result;

/// Create a SQLite connection pool.
///
/// The database file is created if missing. In-memory databases
/// (`sqlite::memory:`) must use `max_connections = 1` so every handle sees
/// the same database.
///
/// ```rust,no_run
/// # async fn run() -> forgehook_common::Result<()> {
/// let pool = forgehook_common::create_pool("sqlite://forgehook.db", 10).await?;
/// # Ok(())
/// # }
/// ```
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    info!(
        "Creating database pool: url={} max_connections={}",
        database_url, max_connections
    );

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(sqlx::Error::from)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await?;

    health_check(&pool).await?;

    Ok(pool)
}

/// Check if the database is reachable.
pub async fn health_check(pool: &SqlitePool) -> Result<()> {
    let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;

    if row.0 == 1 {
        Ok(())
    } else {
        Err(crate::error::Error::Database(sqlx::Error::Protocol(
            "Health check failed".into(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool() {
        let pool = create_pool("sqlite::memory:", 1).await.unwrap();
        health_check(&pool).await.unwrap();
    }
}
