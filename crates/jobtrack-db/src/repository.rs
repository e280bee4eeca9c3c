use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    backend::Backend,
    codec::{DocumentCodec, TimestampCodec},
    config::DatabaseConfig,
    migrator::{MigrationReport, SchemaMigrator},
    pool, Error, Result,
};

/// Handle to a migrated job state database.
///
/// Only obtainable through [`Database::connect`] or [`Database::open`], both of
/// which finish migrating the schema first. Cloning shares the pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) timestamps: TimestampCodec,
    pub(crate) documents: DocumentCodec,
    query_timeout: Duration,
    migration: MigrationReport,
}

impl Database {
    /// Create new database connection and bring the schema up to date
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let backend = pool::connect(config).await?;
        Self::open(backend, &SchemaMigrator::default(), config.query_timeout()).await
    }

    /// Migrate an already connected backend and wrap it
    pub async fn open(
        backend: Arc<dyn Backend>,
        migrator: &SchemaMigrator,
        query_timeout: Duration,
    ) -> Result<Self> {
        let migration = migrator.run(backend.as_ref()).await?;

        Ok(Self {
            backend,
            timestamps: TimestampCodec,
            documents: DocumentCodec,
            query_timeout,
            migration,
        })
    }

    /// Same handle with a different per-operation deadline
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// What the startup migration did
    pub fn migration_report(&self) -> &MigrationReport {
        &self.migration
    }

    pub async fn schema_version(&self) -> Result<i64> {
        self.bounded("schema_version", self.backend.schema_version())
            .await
    }

    pub async fn close(&self) {
        self.backend.close().await;
    }

    /// Run one operation under the query deadline.
    ///
    /// Dropping the future on timeout returns its connection to the pool and
    /// rolls back any open transaction.
    pub(crate) async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "{} did not finish within {:?}",
                operation, self.query_timeout
            ))),
        }
    }
}
