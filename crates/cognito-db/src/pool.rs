//! Database connection pool management.

use std::str::FromStr;
use std::time::{Duration, Instant};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

use cognito_core::{Error, Result};

/// Default maximum number of connections in the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// How long a writer waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 5;

/// Pool configuration options.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections to maintain.
    pub min_connections: u32,
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Idle connection timeout (`None` keeps idle connections forever).
    pub idle_timeout: Option<Duration>,
    /// Maximum connection lifetime.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 1,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)),
            max_lifetime: Some(Duration::from_secs(1800)), // 30 minutes
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for `sqlite::memory:` databases.
    ///
    /// Every SQLite connection to `:memory:` opens a separate database, so the
    /// pool holds exactly one connection that never expires.
    pub fn in_memory() -> Self {
        Self {
            max_connections: 1,
            min_connections: 1,
            idle_timeout: None,
            max_lifetime: None,
            ..Self::default()
        }
    }

    /// Read overrides from `DB_MAX_CONNECTIONS`, `DB_MIN_CONNECTIONS` and
    /// `DB_ACQUIRE_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_parse::<u32>("DB_MAX_CONNECTIONS") {
            config.max_connections = n.max(1);
        }
        if let Some(n) = env_parse::<u32>("DB_MIN_CONNECTIONS") {
            config.min_connections = n;
        }
        if let Some(secs) = env_parse::<u64>("DB_ACQUIRE_TIMEOUT_SECS") {
            config.connect_timeout = Duration::from_secs(secs);
        }
        config
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    /// Set the minimum number of connections.
    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle connection timeout.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the maximum connection lifetime.
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Create a new SQLite connection pool with default configuration.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let config = if is_memory_url(database_url) {
        PoolConfig::in_memory()
    } else {
        PoolConfig::default()
    };
    create_pool_with_config(database_url, config).await
}

/// Create a new SQLite connection pool with custom configuration.
///
/// The database file and its parent directory are created when missing.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<SqlitePool> {
    let start = Instant::now();

    info!(
        subsystem = "database",
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connect_timeout_secs = config.connect_timeout.as_secs(),
        "Creating database connection pool"
    );

    let connect_options = SqliteConnectOptions::from_str(database_url)
        .map_err(Error::Database)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(DEFAULT_BUSY_TIMEOUT_SECS));

    if !is_memory_url(database_url) {
        if let Some(parent) = connect_options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect_with(connect_options)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "database",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Log current pool health metrics.
pub fn log_pool_metrics(pool: &SqlitePool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "database",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "database",
            component = "pool",
            pool_size = size,
            "Connection pool has no idle connections"
        );
    }
}
