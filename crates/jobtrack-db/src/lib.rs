pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
mod executions;
pub mod migration;
pub mod migrator;
pub mod models;
mod paused;
pub mod pool;
pub mod repository;

// Re-exports
pub use backend::Backend;
pub use codec::{DocumentCodec, TimestampCodec};
pub use config::{BackendKind, DatabaseConfig};
pub use error::{Error, Result};
pub use migration::{Dialect, Migration, MIGRATIONS};
pub use migrator::{MigrationReport, MigrationTarget, SchemaMigrator};
pub use models::JobExecutionStats;
pub use repository::Database;

pub use jobtrack_core::ExecutionRecord;
