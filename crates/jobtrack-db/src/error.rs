use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Migration to schema version {version} failed: {source}")]
    Migration {
        version: i16,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database schema version {found} is newer than the latest known version {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },

    #[error("Could not acquire the schema migration lock: {0}")]
    MigrationLock(String),

    #[error("Stored context of execution {id} is not valid JSON: {source}")]
    CorruptDocument {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Execution already recorded: {0}")]
    DuplicateExecution(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Validation(#[from] jobtrack_core::Error),

    #[error("SQLx error: {0}")]
    Sqlx(#[source] sqlx::Error),
}

impl Error {
    /// Whether the caller may retry the operation after backing off.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::Timeout(_) | Error::Connection(_) => true,
            Error::Sqlx(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }

    pub(crate) fn is_unique_violation(&self) -> bool {
        match self {
            Error::Sqlx(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => {
                Error::Timeout("no pooled connection became available".to_string())
            }
            other => Error::Sqlx(other),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_maps_to_retriable_timeout() {
        let err = Error::from(sqlx::Error::PoolTimedOut);

        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.is_retriable());
    }

    #[test]
    fn test_fatal_kinds_are_not_retriable() {
        assert!(!Error::Config("missing user".into()).is_retriable());
        assert!(!Error::DuplicateExecution("e1".into()).is_retriable());
        assert!(!Error::Sqlx(sqlx::Error::RowNotFound).is_retriable());
        assert!(!Error::UnsupportedSchemaVersion { found: 3, supported: 2 }.is_retriable());
    }
}
