//! Database connection pool management.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use chronicle_core::{Error, Result};

/// Default maximum number of connections in the pool.
///
/// Query handlers, the streaming export, and background ingest runs all
/// draw from the same pool; ten keeps ingestion from monopolizing it on a
/// single-node deployment.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default connection acquire timeout in seconds.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Pool configuration options.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections to maintain.
    pub min_connections: u32,
    /// How long an acquire may wait before failing with `PoolTimedOut`.
    pub acquire_timeout: Duration,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl PoolConfig {
    /// Read pool sizing from the environment, falling back to defaults.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `POOL_MAX_CONNECTIONS` | `10` |
    /// | `POOL_ACQUIRE_TIMEOUT_SECS` | `10` |
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("POOL_MAX_CONNECTIONS") {
            if let Ok(n) = v.parse::<u32>() {
                config.max_connections = n.max(1);
            }
        }
        if let Ok(v) = std::env::var("POOL_ACQUIRE_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse::<u64>() {
                config.acquire_timeout = Duration::from_secs(secs.max(1));
            }
        }
        config
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }
}

/// Create a new PostgreSQL connection pool with default configuration.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

/// Create a new PostgreSQL connection pool with custom configuration.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    let pool = pool_options(&config)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "established",
        max_connections = config.max_connections,
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

/// Create a pool without connecting. The first acquire establishes the
/// connection; until then the pool is inert. Used by tests that exercise
/// request validation and auth without a live database.
pub fn create_pool_lazy(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let pool = pool_options(&config)
        .connect_lazy(database_url)
        .map_err(Error::Database)?;
    Ok(pool)
}

fn pool_options(config: &PoolConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
}

/// Log current pool health; warns when no idle connections remain.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "db",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            "Connection pool has no idle connections"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(config.min_connections <= config.max_connections);
    }

    #[test]
    fn builder_overrides_max_connections() {
        let config = PoolConfig::default().max_connections(20);
        assert_eq!(config.max_connections, 20);
    }
}
