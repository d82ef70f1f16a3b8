//! Connection pool built from the `database` settings section.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::settings::Database;

/// Open the pool and verify one connection.
pub async fn connect(settings: &Database) -> Result<PgPool, sqlx::Error> {
    options(settings).connect(&settings.url()).await
}

/// A pool that only opens connections on first use.
pub fn connect_lazy(settings: &Database) -> Result<PgPool, sqlx::Error> {
    options(settings).connect_lazy(&settings.url())
}

fn options(settings: &Database) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(settings.pool.max(1))
        .acquire_timeout(Duration::from_secs(5))
}

/// Delete OAuth state rows whose ten minutes have run out.
pub async fn purge_expired_oauth_states(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM oauth_states WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
