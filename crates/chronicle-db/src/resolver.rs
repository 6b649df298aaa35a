//! Location enrichment resolver.
//!
//! One backbone source (a GPS track) supplies a spatial baseline for every
//! other source: given a timestamp, the resolver returns the most recent
//! known fix at or before it. A step function, not an interpolation — a
//! timestamp earlier than the first fix resolves to nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use chronicle_core::{defaults, Error, GeoFix, LocationResolver, Result};

/// PostgreSQL-backed resolver over the `location.gps` backbone.
///
/// The lookup rides the `(type, t_start DESC)` index: one bounded probe per
/// call, regardless of track length.
#[derive(Clone)]
pub struct PgLocationResolver {
    pool: Pool<Postgres>,
    backbone_source: String,
}

impl PgLocationResolver {
    /// Create a resolver over the default backbone source (`arc`).
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            backbone_source: defaults::ENRICH_BACKBONE_SOURCE.to_string(),
        }
    }

    /// Override the backbone source.
    pub fn with_backbone(mut self, source: impl Into<String>) -> Self {
        self.backbone_source = source.into();
        self
    }

    /// The source currently used as the enrichment backbone.
    pub fn backbone(&self) -> &str {
        &self.backbone_source
    }
}

#[async_trait]
impl LocationResolver for PgLocationResolver {
    async fn resolve(&self, at: DateTime<Utc>) -> Result<Option<GeoFix>> {
        let row = sqlx::query(
            r#"
            SELECT lat, lon
            FROM entities
            WHERE type = $1
              AND source = $2
              AND t_start <= $3
              AND lat IS NOT NULL
              AND lon IS NOT NULL
            ORDER BY t_start DESC
            LIMIT 1
            "#,
        )
        .bind(defaults::GPS_TYPE)
        .bind(&self.backbone_source)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| GeoFix {
            lat: r.get("lat"),
            lon: r.get("lon"),
        }))
    }
}
