use std::time::Duration;

use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlConnectOptions, MySqlConnection},
    MySql, MySqlPool,
};
use tracing::debug;

use super::{
    Backend, COUNT_PAUSED_JOB, DELETE_PAUSED_JOB, INSERT_EXECUTION, INSERT_PAUSED_JOB,
    INSERT_SCHEMA_VERSION, MIGRATION_LOCK, SELECT_EXECUTIONS_BY_OUTCOME,
    SELECT_EXECUTIONS_FOR_JOB, SELECT_EXECUTION_STATS, SELECT_PAUSED_JOB_IDS,
    SELECT_SCHEMA_VERSION,
};
use crate::{
    config::DatabaseConfig,
    migration::Dialect,
    migrator::{MigrationPlan, MigrationTarget},
    models::{ExecutionRow, JobStatsRow},
    pool::pool_options,
    Error, Result,
};

pub struct MySqlBackend {
    pool: MySqlPool,
    lock_timeout: Duration,
}

impl MySqlBackend {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(config.database.as_deref().unwrap_or_default())
            .username(config.user.as_deref().unwrap_or_default())
            .password(config.password.as_deref().unwrap_or_default());

        let pool = pool_options::<MySql>(config)
            .connect_with(options)
            .await
            .map_err(Error::Connection)?;

        Ok(Self {
            pool,
            lock_timeout: config.acquire_timeout(),
        })
    }
}

/// Apply pending steps on a connection holding the migration lock.
///
/// DDL commits implicitly on MySQL, so there is no enclosing transaction:
/// each step commits on its own, statement first and version row second.
/// Every shipped step is one `CREATE TABLE IF NOT EXISTS`, so a step whose
/// version row was lost is replayed as a no-op on the next start.
async fn apply_locked(conn: &mut MySqlConnection, plan: &MigrationPlan) -> Result<Vec<i16>> {
    let current: Option<i16> = sqlx::query_scalar(SELECT_SCHEMA_VERSION)
        .fetch_optional(&mut *conn)
        .await?;
    let current = current.unwrap_or(0);

    let mut applied = Vec::new();
    for step in plan.steps.iter().filter(|step| step.version > current) {
        for statement in &step.statements {
            sqlx::query(statement)
                .execute(&mut *conn)
                .await
                .map_err(|source| Error::Migration {
                    version: step.version,
                    source,
                })?;
        }

        sqlx::query(INSERT_SCHEMA_VERSION)
            .bind(step.version)
            .bind(plan.applied_at)
            .execute(&mut *conn)
            .await
            .map_err(|source| Error::Migration {
                version: step.version,
                source,
            })?;

        debug!(version = step.version, "Schema step committed");
        applied.push(step.version);
    }

    Ok(applied)
}

#[async_trait]
impl MigrationTarget for MySqlBackend {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn execute(&self, statement: &str) -> Result<()> {
        sqlx::query(statement).execute(&self.pool).await?;
        Ok(())
    }

    async fn schema_version(&self) -> Result<i64> {
        let version: Option<i16> = sqlx::query_scalar(SELECT_SCHEMA_VERSION)
            .fetch_optional(&self.pool)
            .await?;

        Ok(version.map(i64::from).unwrap_or(0))
    }

    async fn apply_migrations(&self, plan: &MigrationPlan) -> Result<Vec<i16>> {
        let mut conn = self.pool.acquire().await?;

        let granted: Option<i64> = sqlx::query_scalar("SELECT GET_LOCK(?, ?)")
            .bind(MIGRATION_LOCK)
            .bind(self.lock_timeout.as_secs().max(1))
            .fetch_one(&mut *conn)
            .await?;

        if granted != Some(1) {
            return Err(Error::MigrationLock(format!(
                "{} not granted within {:?}",
                MIGRATION_LOCK, self.lock_timeout
            )));
        }

        let outcome = apply_locked(&mut conn, plan).await;

        // The lock belongs to the session, so release it before the
        // connection goes back to the pool.
        let released = sqlx::query("SELECT RELEASE_LOCK(?)")
            .bind(MIGRATION_LOCK)
            .execute(&mut *conn)
            .await;

        let applied = outcome?;
        released?;
        Ok(applied)
    }
}

#[async_trait]
impl Backend for MySqlBackend {
    async fn insert_execution(&self, row: &ExecutionRow) -> Result<()> {
        sqlx::query(INSERT_EXECUTION)
            .bind(&row.id)
            .bind(&row.job)
            .bind(row.start_time)
            .bind(row.end_time)
            .bind(&row.context)
            .bind(row.success)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn executions_by_outcome(&self, success: bool) -> Result<Vec<ExecutionRow>> {
        let rows = sqlx::query_as::<_, ExecutionRow>(SELECT_EXECUTIONS_BY_OUTCOME)
            .bind(success)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn executions_for_job(&self, job: &str) -> Result<Vec<ExecutionRow>> {
        let rows = sqlx::query_as::<_, ExecutionRow>(SELECT_EXECUTIONS_FOR_JOB)
            .bind(job)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn execution_stats(&self) -> Result<Vec<JobStatsRow>> {
        let rows = sqlx::query_as::<_, JobStatsRow>(SELECT_EXECUTION_STATS)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn replace_paused_job(&self, job: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(DELETE_PAUSED_JOB)
            .bind(job)
            .execute(&mut *tx)
            .await?;

        sqlx::query(INSERT_PAUSED_JOB)
            .bind(job)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_paused_job(&self, job: &str) -> Result<u64> {
        let result = sqlx::query(DELETE_PAUSED_JOB)
            .bind(job)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn paused_job_ids(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(SELECT_PAUSED_JOB_IDS)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    async fn is_job_paused(&self, job: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(COUNT_PAUSED_JOB)
            .bind(job)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
