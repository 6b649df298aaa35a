//! Seam traits between the ingestion engine and the persistence layer.
//!
//! The engine only sees these traits, so its run protocol is testable
//! against in-memory stubs without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{EntityInput, GeoFix, SourceState, UpsertOutcome};

/// The slice of the store the ingestion engine writes through.
#[async_trait]
pub trait IngestStore: Send + Sync {
    /// Insert-or-replace keyed on `(source, external_id)`.
    async fn upsert(&self, input: EntityInput) -> Result<UpsertOutcome>;

    /// Load the watermark for a source, if one has been recorded.
    async fn get_watermark(&self, source: &str) -> Result<Option<SourceState>>;

    /// Record a successful run: the instant becomes the lower bound for the
    /// source's next run.
    async fn set_watermark(
        &self,
        source: &str,
        last_run: DateTime<Utc>,
        count: i64,
    ) -> Result<()>;
}

/// Supplies coordinates to timestamped entities that lack them.
///
/// The resolver is a step function from the most recent known fix: it never
/// extrapolates forward in time and never interpolates between fixes.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    /// The latest backbone fix at or before `at`, if any exists.
    async fn resolve(&self, at: DateTime<Utc>) -> Result<Option<GeoFix>>;
}
