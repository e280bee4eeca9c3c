use std::sync::Arc;

use sqlx::pool::PoolOptions;
use tracing::info;

use crate::{
    backend::{Backend, MySqlBackend, SqliteBackend},
    config::{BackendKind, DatabaseConfig},
    Result,
};

/// Bounded pool settings shared by both drivers.
pub(crate) fn pool_options<DB: sqlx::Database>(config: &DatabaseConfig) -> PoolOptions<DB> {
    PoolOptions::<DB>::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
}

/// Open a connection pool for the configured backend.
///
/// The schema is not touched here; see [`crate::Database::connect`] for the
/// handle that migrates before serving queries.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Backend>> {
    config.validate()?;

    let backend: Arc<dyn Backend> = match config.backend {
        BackendKind::MySql => Arc::new(MySqlBackend::connect(config).await?),
        BackendKind::Sqlite => Arc::new(SqliteBackend::connect(config).await?),
    };

    info!(
        backend = ?config.backend,
        max_connections = config.max_connections,
        "Connected to job state database"
    );

    Ok(backend)
}
