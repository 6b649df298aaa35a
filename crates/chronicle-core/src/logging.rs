//! Structured logging field name constants for chronicle.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), run completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (samples, export rows) |

/// Correlation ID propagated across request handling. Format: UUIDv7.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "ingest", "detector"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "export", "engine", "worker", "resolver"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "upsert", "query_time", "resample", "run", "detect_visits"
pub const OPERATION: &str = "op";

/// Source plugin name being ingested.
pub const SOURCE: &str = "source";

/// Entity type being operated on.
pub const ENTITY_TYPE: &str = "entity_type";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a query or emitted by a stream.
pub const RESULT_COUNT: &str = "result_count";

/// Number of entities upserted during an ingest run.
pub const UPSERT_COUNT: &str = "upsert_count";
