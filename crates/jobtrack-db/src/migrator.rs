use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::{
    codec::TimestampCodec,
    migration::{Dialect, Migration, MIGRATIONS, SCHEMA_EVOLUTIONS},
    Error, Result,
};

/// What the migrator needs from a database: raw statements, the recorded
/// version, and a guarded apply.
#[async_trait]
pub trait MigrationTarget: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn execute(&self, statement: &str) -> Result<()>;

    /// Highest recorded version, or 0 when nothing has been applied.
    async fn schema_version(&self) -> Result<i64>;

    /// Apply every step newer than the version re-read under the target's
    /// migration guard, recording each one.
    ///
    /// A failed run must leave the recorded version at the last step whose
    /// structure is in place. Transactional DDL gets this from a single
    /// commit at the end; MySQL gets it from committing step by step.
    ///
    /// Returns the versions that were actually applied, in order.
    async fn apply_migrations(&self, plan: &MigrationPlan) -> Result<Vec<i16>>;
}

#[derive(Debug, Clone)]
pub struct PendingMigration {
    pub version: i16,
    pub description: &'static str,
    pub statements: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub applied_at: NaiveDateTime,
    pub steps: Vec<PendingMigration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub previous_version: i64,
    pub current_version: i64,
    pub applied: Vec<i16>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchemaMigrator {
    migrations: &'static [Migration],
    timestamps: TimestampCodec,
}

impl Default for SchemaMigrator {
    fn default() -> Self {
        Self::new(MIGRATIONS)
    }
}

impl SchemaMigrator {
    pub fn new(migrations: &'static [Migration]) -> Self {
        Self {
            migrations,
            timestamps: TimestampCodec,
        }
    }

    pub fn latest_version(&self) -> i64 {
        self.migrations.len() as i64
    }

    /// Bring the target up to the latest version
    pub async fn run<T>(&self, target: &T) -> Result<MigrationReport>
    where
        T: MigrationTarget + ?Sized,
    {
        let dialect = target.dialect();
        target
            .execute(&SCHEMA_EVOLUTIONS.create_sql(dialect, true))
            .await?;

        let current = target.schema_version().await?;
        let latest = self.latest_version();

        if current > latest {
            return Err(Error::UnsupportedSchemaVersion {
                found: current,
                supported: latest,
            });
        }

        if current == latest {
            info!(version = current, "Database schema is up to date");
            return Ok(MigrationReport {
                previous_version: current,
                current_version: current,
                applied: Vec::new(),
            });
        }

        let plan = self.plan(current, dialect)?;
        info!(
            from = current,
            to = latest,
            "Applying {} schema migration(s)",
            plan.steps.len()
        );

        let applied = target.apply_migrations(&plan).await?;
        for step in plan.steps.iter().filter(|s| applied.contains(&s.version)) {
            info!(version = step.version, "Applied schema migration: {}", step.description);
        }

        Ok(MigrationReport {
            previous_version: current,
            current_version: latest,
            applied,
        })
    }

    fn plan(&self, current: i64, dialect: Dialect) -> Result<MigrationPlan> {
        let mut steps = Vec::new();

        for (index, migration) in self.migrations.iter().enumerate() {
            let version = i16::try_from(index + 1).map_err(|_| {
                Error::Config(format!("migration list exceeds {} entries", i16::MAX))
            })?;

            if i64::from(version) > current {
                steps.push(PendingMigration {
                    version,
                    description: migration.description,
                    statements: migration.statements(dialect),
                });
            }
        }

        Ok(MigrationPlan {
            applied_at: self.timestamps.encode(&Utc::now()),
            steps,
        })
    }
}
