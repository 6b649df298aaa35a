//! Centralized default constants for the chronicle service.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates reference these constants instead of defining their own magic
//! numbers. When adding new constants, place them in the appropriate section
//! and document the rationale for the chosen value.

// =============================================================================
// ENTITY TYPES
// =============================================================================

/// Entity type of raw GPS samples (the enrichment backbone).
pub const GPS_TYPE: &str = "location.gps";

/// Entity type of detected significant places.
pub const PLACE_TYPE: &str = "place";

/// Entity type of detected visits to a place.
pub const VISIT_TYPE: &str = "place.visit";

/// Source whose GPS track supplies inferred locations to other sources.
pub const ENRICH_BACKBONE_SOURCE: &str = "arc";

/// Color assigned to GPS-derived entities (places, visits).
pub const GPS_COLOR: &str = "#4CAF50";

// =============================================================================
// QUERY LIMITS
// =============================================================================

/// Default result limit for time-window queries.
pub const TIME_QUERY_LIMIT: i64 = 2000;

/// Default result limit for bounding-box queries.
pub const BBOX_QUERY_LIMIT: i64 = 5000;

/// Hard cap on any bounded query limit.
pub const QUERY_LIMIT_MAX: i64 = 10_000;

/// Maximum number of resample bins per request.
pub const RESAMPLE_MAX_BINS: i64 = 10_000;

/// Maximum entities per batch upsert request.
pub const BATCH_MAX_ENTITIES: usize = 1000;

/// Wall-clock budget for a single query endpoint, in seconds.
pub const QUERY_TIMEOUT_SECS: u64 = 30;

/// Recent visits returned with a place detail.
pub const PLACE_RECENT_VISITS: i64 = 50;

// =============================================================================
// EXPORT
// =============================================================================

/// Bounded channel capacity between the database cursor and the NDJSON
/// response body. Keeps resident memory independent of table size.
pub const EXPORT_CHANNEL_CAPACITY: usize = 512;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8000;

/// Maximum request body size in bytes (batch upserts of dense payloads).
pub const MAX_BODY_SIZE_BYTES: usize = 32 * 1024 * 1024;

// =============================================================================
// INGESTION
// =============================================================================

/// Watermark used for a source's first run when none is stored.
pub const INGEST_EPOCH: &str = "1970-01-01T00:00:00Z";

/// Default interval between ingest worker ticks, in seconds.
pub const INGEST_POLL_INTERVAL_SECS: u64 = 3600;

// =============================================================================
// PLACE DETECTION
// =============================================================================

/// DBSCAN neighborhood radius in meters.
pub const PLACE_EPSILON_M: f64 = 50.0;

/// DBSCAN minimum samples for a core point.
pub const PLACE_MIN_SAMPLES: usize = 5;

/// Minimum detected visits for a cluster to qualify as a place.
pub const PLACE_MIN_VISIT_COUNT: usize = 3;

/// Minimum cumulative dwell (hours) for a cluster to qualify as a place.
pub const PLACE_MIN_TOTAL_DWELL_HOURS: f64 = 2.0;

/// Percentile of member distance from centroid used as the place radius.
pub const PLACE_RADIUS_PERCENTILE: f64 = 0.95;

/// Maximum gap between consecutive in-radius samples within one visit.
pub const VISIT_MAX_GAP_MINUTES: i64 = 30;

/// Minimum dwell for a candidate visit to be kept.
pub const VISIT_MIN_DWELL_MINUTES: i64 = 10;

/// Mean earth radius in meters, for the haversine metric.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_limits_are_consistent() {
        const {
            assert!(TIME_QUERY_LIMIT <= QUERY_LIMIT_MAX);
            assert!(BBOX_QUERY_LIMIT <= QUERY_LIMIT_MAX);
            assert!(RESAMPLE_MAX_BINS == QUERY_LIMIT_MAX);
        }
    }

    #[test]
    fn detection_thresholds_are_positive() {
        const {
            assert!(PLACE_MIN_SAMPLES >= 1);
            assert!(VISIT_MIN_DWELL_MINUTES > 0);
            assert!(VISIT_MAX_GAP_MINUTES > 0);
        }
        assert!(PLACE_EPSILON_M > 0.0);
        assert!(PLACE_RADIUS_PERCENTILE > 0.0 && PLACE_RADIUS_PERCENTILE <= 1.0);
    }

    #[test]
    fn epoch_parses_as_rfc3339() {
        let parsed = chrono::DateTime::parse_from_rfc3339(INGEST_EPOCH);
        assert!(parsed.is_ok());
    }

    #[test]
    fn gps_color_is_well_formed() {
        assert_eq!(GPS_COLOR.len(), 7);
        assert!(GPS_COLOR.starts_with('#'));
    }
}
