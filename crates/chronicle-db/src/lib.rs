//! # chronicle-db
//!
//! PostgreSQL + PostGIS persistence layer for chronicle.
//!
//! This crate provides:
//! - Connection pool management
//! - The entity repository (upsert, windowed queries, uniform-time
//!   resampling, streaming export)
//! - The place repository (listing, rename propagation)
//! - Source watermark state
//! - The location enrichment resolver over the GPS backbone
//!
//! ## Example
//!
//! ```rust,ignore
//! use chronicle_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/chronicle").await?;
//!     db.migrate().await?;
//!
//!     let places = db.places.list().await?;
//!     println!("{} places", places.len());
//!     Ok(())
//! }
//! ```

pub mod entities;
pub mod places;
pub mod pool;
pub mod resolver;
pub mod source_state;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

// Re-export core types
pub use chronicle_core::*;

pub use entities::PgEntityRepository;
pub use places::PgPlaceRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use resolver::PgLocationResolver;
pub use source_state::PgSourceStateRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Entity repository: upsert, queries, resample, export.
    pub entities: PgEntityRepository,
    /// Place repository: listing, detail, rename propagation.
    pub places: PgPlaceRepository,
    /// Per-source watermark state.
    pub source_state: PgSourceStateRepository,
    /// Location enrichment resolver over the GPS backbone.
    pub resolver: PgLocationResolver,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            entities: PgEntityRepository::new(pool.clone()),
            places: PgPlaceRepository::new(pool.clone()),
            source_state: PgSourceStateRepository::new(pool.clone()),
            resolver: PgLocationResolver::new(pool.clone()),
            pool,
        }
    }

    /// Connect to the given URL with default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Build a Database whose pool connects on first use. For tests that
    /// exercise validation and auth paths without a live server.
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = pool::create_pool_lazy(url, PoolConfig::default())?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations (forward-only).
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

/// The ingestion engine writes through the `IngestStore` seam so it can be
/// tested against in-memory stubs; the production store is this database.
#[async_trait]
impl IngestStore for Database {
    async fn upsert(&self, input: EntityInput) -> Result<UpsertOutcome> {
        self.entities.upsert(input).await
    }

    async fn get_watermark(&self, source: &str) -> Result<Option<SourceState>> {
        self.source_state.get(source).await
    }

    async fn set_watermark(
        &self,
        source: &str,
        last_run: DateTime<Utc>,
        count: i64,
    ) -> Result<()> {
        self.source_state.set(source, last_run, count).await
    }
}
