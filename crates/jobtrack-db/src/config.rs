use std::fmt;
use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::{Error, Result};

/// Environment variables are read as `JOBTRACK_DB_<FIELD>`, e.g. `JOBTRACK_DB_USER`.
pub const ENV_PREFIX: &str = "JOBTRACK_DB";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    MySql,
    Sqlite,
}

/// Connection settings for the job-state database.
///
/// For the SQLite backend `database` is a file path, or `:memory:`; host,
/// port and credentials are ignored.
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub min_connections: u32,
    #[serde(default = "default_timeout_ms")]
    pub acquire_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub query_timeout_ms: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_connections() -> u32 {
    10
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl DatabaseConfig {
    pub fn mysql(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: Some(database.into()),
            user: Some(user.into()),
            password: Some(password.into()),
            ..Self::empty(BackendKind::MySql)
        }
    }

    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            database: Some(path.into()),
            ..Self::empty(BackendKind::Sqlite)
        }
    }

    fn empty(backend: BackendKind) -> Self {
        Self {
            backend,
            host: default_host(),
            port: default_port(),
            database: None,
            user: None,
            password: None,
            max_connections: default_max_connections(),
            min_connections: 0,
            acquire_timeout_ms: default_timeout_ms(),
            query_timeout_ms: default_timeout_ms(),
        }
    }

    /// Load and validate settings from `JOBTRACK_DB_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(source: Environment) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn with_pool_size(mut self, min_connections: u32, max_connections: u32) -> Self {
        self.min_connections = min_connections;
        self.max_connections = max_connections;
        self
    }

    pub fn with_timeouts(mut self, acquire: Duration, query: Duration) -> Self {
        self.acquire_timeout_ms = millis(acquire);
        self.query_timeout_ms = millis(query);
        self
    }

    pub fn validate(&self) -> Result<()> {
        require(&self.database, "DATABASE")?;

        if self.backend == BackendKind::MySql {
            require(&self.user, "USER")?;
            require(&self.password, "PASSWORD")?;
        }

        if self.max_connections == 0 {
            return Err(Error::Config(format!(
                "{}_MAX_CONNECTIONS must be at least 1",
                ENV_PREFIX
            )));
        }

        for (value, name) in [
            (self.acquire_timeout_ms, "ACQUIRE_TIMEOUT_MS"),
            (self.query_timeout_ms, "QUERY_TIMEOUT_MS"),
        ] {
            if value == 0 {
                return Err(Error::Config(format!(
                    "{}_{} must be at least 1",
                    ENV_PREFIX, name
                )));
            }
        }

        if self.min_connections > self.max_connections {
            return Err(Error::Config(format!(
                "{prefix}_MIN_CONNECTIONS ({}) exceeds {prefix}_MAX_CONNECTIONS ({})",
                self.min_connections,
                self.max_connections,
                prefix = ENV_PREFIX
            )));
        }

        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn require(value: &Option<String>, name: &str) -> Result<()> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(Error::Config(format!(
            "missing required setting {}_{}",
            ENV_PREFIX, name
        ))),
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .field("query_timeout_ms", &self.query_timeout_ms)
            .finish()
    }
}
