//! Core data models for chronicle.
//!
//! These types are shared across all chronicle crates and represent the
//! unified entity record, the query request/response surface, and the
//! per-source watermark state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// ENTITIES
// =============================================================================

/// Provenance of an entity's coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocSource {
    /// The originating source supplied the coordinates (EXIF GPS, device GPS).
    Native,
    /// The resolver filled the coordinates in from the GPS backbone.
    Inferred,
}

impl LocSource {
    /// Stable string form used in the database column.
    pub fn as_str(&self) -> &'static str {
        match self {
            LocSource::Native => "native",
            LocSource::Inferred => "inferred",
        }
    }

    /// Parse the database column form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "native" => Some(LocSource::Native),
            "inferred" => Some(LocSource::Inferred),
            _ => None,
        }
    }
}

/// A single timestamped, optionally located record of any type.
///
/// This is the response-side surface: coordinates are scalars projected back
/// from the stored geometry; the derived `geom`/`t_range` columns are never
/// exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub t_start: DateTime<Utc>,
    pub t_end: Option<DateTime<Utc>>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub name: Option<String>,
    pub color: Option<String>,
    pub render_offset: f64,
    pub source: Option<String>,
    pub external_id: Option<String>,
    pub loc_source: Option<LocSource>,
    pub payload: Option<EntityPayload>,
}

/// Input model for creating or updating an entity.
///
/// Derived fields (`geom`, `t_range`, timestamps) have no representation
/// here; the store maintains them on every write. `id` is accepted so that
/// exported lines can be piped back in unchanged, but upserts key on
/// `(source, external_id)`, never on `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub t_start: DateTime<Utc>,
    #[serde(default)]
    pub t_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub render_offset: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub loc_source: Option<LocSource>,
    #[serde(default)]
    pub payload: Option<EntityPayload>,
}

impl EntityInput {
    /// Validate the invariants enforceable without database access:
    /// time ordering, coordinate pairing and ranges, color shape.
    pub fn validate(&self) -> Result<()> {
        if self.entity_type.trim().is_empty() {
            return Err(Error::Validation("type must be non-empty".into()));
        }
        if let Some(t_end) = self.t_end {
            if t_end < self.t_start {
                return Err(Error::Validation("t_end must be >= t_start".into()));
            }
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(Error::Validation("lat must be within [-90, 90]".into()));
                }
                if !(-180.0..=180.0).contains(&lon) {
                    return Err(Error::Validation("lon must be within [-180, 180]".into()));
                }
            }
            (None, None) => {}
            _ => {
                return Err(Error::Validation(
                    "lat and lon must both be provided or both be null".into(),
                ));
            }
        }
        if let Some(color) = &self.color {
            validate_color(color)?;
        }
        Ok(())
    }

    /// True when the `(source, external_id)` dedup key is fully present.
    pub fn has_dedup_key(&self) -> bool {
        self.source.is_some() && self.external_id.is_some()
    }
}

/// Validate a `#RRGGBB` color string.
pub fn validate_color(color: &str) -> Result<()> {
    let ok = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if ok {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "color must be #RRGGBB, got '{color}'"
        )))
    }
}

/// Outcome of a single upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertStatus {
    Inserted,
    Updated,
}

/// Response for single-entity upserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub id: Uuid,
    pub status: UpsertStatus,
}

/// Response for batch upserts. The batch is transactional, so `errors` is
/// zero on success; the field is kept for wire compatibility with clients
/// of the original API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub inserted: i64,
    pub updated: i64,
    pub errors: i64,
    pub total: i64,
}

// =============================================================================
// PAYLOAD
// =============================================================================

/// Type-specific extension document carried by an entity.
///
/// Known shapes are tagged by a `kind` field; anything else round-trips
/// untouched through the `Opaque` fallback, preserving forward
/// compatibility with payloads this build does not know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityPayload {
    Music(MusicMeta),
    Photo(PhotoMeta),
    Sleep(SleepMeta),
    Transaction(TransactionMeta),
    Calendar(CalendarMeta),
    Place(PlaceMeta),
    Visit(VisitMeta),
    #[serde(untagged)]
    Opaque(JsonValue),
}

/// Music listening event metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicMeta {
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

/// Photo capture metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoMeta {
    #[serde(default)]
    pub camera: Option<String>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub file: Option<String>,
}

/// Sleep session metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepMeta {
    #[serde(default)]
    pub duration_minutes: Option<f64>,
    #[serde(default)]
    pub quality: Option<f64>,
}

/// Financial transaction metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Calendar event metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarMeta {
    #[serde(default)]
    pub calendar: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Geometry and significance of a detected place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceMeta {
    /// Cluster ordinal assigned by the detector.
    pub cluster: i64,
    /// Number of GPS samples in the cluster.
    pub sample_count: i64,
    /// 95th-percentile haversine distance from centroid, meters.
    pub radius_m: f64,
    /// Detected visits at qualification time.
    pub visit_count: i64,
    /// Cumulative dwell across those visits, hours.
    pub total_dwell_hours: f64,
}

/// A detected stay inside a place's radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitMeta {
    /// Id of the `place` entity this visit belongs to.
    pub place_id: Uuid,
    pub dwell_minutes: f64,
    /// Gap since the previous visit to the same place, when known.
    #[serde(default)]
    pub gap_before_minutes: Option<f64>,
    /// Radius of the place at detection time, meters.
    pub radius_m: f64,
    pub entry_sample: GeoSample,
    pub exit_sample: GeoSample,
}

/// A single timestamped coordinate, as recorded in visit payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoSample {
    pub t: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
}

/// A resolved coordinate pair from the enrichment backbone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFix {
    pub lat: f64,
    pub lon: f64,
}

// =============================================================================
// QUERY REQUESTS
// =============================================================================

/// Sort order for time-window queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOrder {
    #[default]
    TStartAsc,
    TStartDesc,
}

/// Sort order for bounding-box queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BboxOrder {
    TStartAsc,
    #[default]
    TStartDesc,
    Random,
}

/// Sort order for the streaming export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportOrder {
    #[default]
    Newest,
    Oldest,
}

/// Resampling strategy. Only uniform-time binning is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleMethod {
    UniformTime,
}

/// Uniform-time resampling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResampleConfig {
    pub method: ResampleMethod,
    /// Number of bins over the query window.
    pub n: i64,
}

/// An inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Windows must be non-empty and forward.
    pub fn validate(&self) -> Result<()> {
        if self.end <= self.start {
            return Err(Error::Validation("end must be > start".into()));
        }
        Ok(())
    }
}

/// Request body for `POST /v1/query/time`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeQueryRequest {
    pub types: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub order: TimeOrder,
    #[serde(default)]
    pub resample: Option<ResampleConfig>,
}

impl TimeQueryRequest {
    /// Validate ranges, ordering, and the resample/limit exclusion.
    pub fn validate(&self) -> Result<()> {
        if self.types.is_empty() {
            return Err(Error::Validation("types must be non-empty".into()));
        }
        if self.end <= self.start {
            return Err(Error::Validation("end must be > start".into()));
        }
        if let Some(limit) = self.limit {
            validate_limit(limit)?;
        }
        if let Some(resample) = &self.resample {
            if !(1..=defaults::RESAMPLE_MAX_BINS).contains(&resample.n) {
                return Err(Error::Validation(format!(
                    "resample.n must be within [1, {}]",
                    defaults::RESAMPLE_MAX_BINS
                )));
            }
            if self.limit.is_some() {
                return Err(Error::Validation(
                    "limit and resample are mutually exclusive".into(),
                ));
            }
        }
        Ok(())
    }

    /// Effective limit after defaulting.
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(defaults::TIME_QUERY_LIMIT)
    }
}

/// Request body for `POST /v1/query/bbox`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BboxQueryRequest {
    pub types: Vec<String>,
    /// `[lonmin, latmin, lonmax, latmax]` in WGS84 degrees.
    pub bbox: [f64; 4],
    #[serde(default)]
    pub time: Option<TimeWindow>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub order: BboxOrder,
}

impl BboxQueryRequest {
    /// Validate envelope bounds, ordering, window, and limit.
    pub fn validate(&self) -> Result<()> {
        if self.types.is_empty() {
            return Err(Error::Validation("types must be non-empty".into()));
        }
        let [lonmin, latmin, lonmax, latmax] = self.bbox;
        if !(-180.0..=180.0).contains(&lonmin) || !(-180.0..=180.0).contains(&lonmax) {
            return Err(Error::Validation(
                "longitude must be within [-180, 180]".into(),
            ));
        }
        if !(-90.0..=90.0).contains(&latmin) || !(-90.0..=90.0).contains(&latmax) {
            return Err(Error::Validation("latitude must be within [-90, 90]".into()));
        }
        if lonmin >= lonmax {
            return Err(Error::Validation("lonmin must be < lonmax".into()));
        }
        if latmin >= latmax {
            return Err(Error::Validation("latmin must be < latmax".into()));
        }
        if let Some(window) = &self.time {
            window.validate()?;
        }
        if let Some(limit) = self.limit {
            validate_limit(limit)?;
        }
        Ok(())
    }

    /// Effective limit after defaulting.
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(defaults::BBOX_QUERY_LIMIT)
    }
}

fn validate_limit(limit: i64) -> Result<()> {
    if !(1..=defaults::QUERY_LIMIT_MAX).contains(&limit) {
        return Err(Error::Validation(format!(
            "limit must be within [1, {}]",
            defaults::QUERY_LIMIT_MAX
        )));
    }
    Ok(())
}

/// Response body shared by the time and bbox query endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub entities: Vec<Entity>,
}

// =============================================================================
// WATERMARKS
// =============================================================================

/// Per-source watermark row: the lower bound for the source's next run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceState {
    pub source: String,
    pub last_run: DateTime<Utc>,
    pub last_count: i64,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// PLACES
// =============================================================================

/// A detected place with visit statistics, as listed by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub color: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius_m: Option<f64>,
    pub visit_count: i64,
    pub total_dwell_hours: f64,
    pub last_visit: Option<DateTime<Utc>>,
}

/// Place detail with its most recent visits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceDetail {
    pub place: PlaceSummary,
    pub recent_visits: Vec<Entity>,
}

/// Request body for `PATCH /v1/places/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePlaceRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl UpdatePlaceRequest {
    /// At least one field must be set; colors must be `#RRGGBB`.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_none() && self.color.is_none() {
            return Err(Error::Validation(
                "at least one of name, color is required".into(),
            ));
        }
        if let Some(color) = &self.color {
            validate_color(color)?;
        }
        Ok(())
    }
}

/// Response body for the rename endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameOutcome {
    pub updated_visits: i64,
}

// =============================================================================
// STATS
// =============================================================================

/// Count of entities for one type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub count: i64,
}

/// Overall time coverage of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeCoverage {
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// On-disk footprint, megabytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSize {
    pub size_mb: f64,
    pub table_size_mb: f64,
    pub index_size_mb: f64,
}

/// Response body for `GET /stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_entities: i64,
    pub entities_by_type: Vec<TypeCount>,
    pub time_coverage: TimeCoverage,
    pub database: DatabaseSize,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn input(entity_type: &str) -> EntityInput {
        EntityInput {
            id: None,
            entity_type: entity_type.to_string(),
            t_start: Utc.with_ymd_and_hms(2026, 2, 16, 14, 30, 0).unwrap(),
            t_end: None,
            lat: None,
            lon: None,
            name: None,
            color: None,
            render_offset: None,
            source: None,
            external_id: None,
            loc_source: None,
            payload: None,
        }
    }

    #[test]
    fn input_accepts_instantaneous_entity() {
        assert!(input("music").validate().is_ok());
    }

    #[test]
    fn input_rejects_backwards_span() {
        let mut e = input("music");
        e.t_end = Some(e.t_start - chrono::Duration::seconds(1));
        assert!(matches!(e.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn input_rejects_half_coordinates() {
        let mut e = input("photo");
        e.lat = Some(34.05);
        assert!(e.validate().is_err());
        e.lat = None;
        e.lon = Some(-118.24);
        assert!(e.validate().is_err());
    }

    #[test]
    fn input_rejects_out_of_range_coordinates() {
        let mut e = input("photo");
        e.lat = Some(91.0);
        e.lon = Some(0.0);
        assert!(e.validate().is_err());
        e.lat = Some(0.0);
        e.lon = Some(-181.0);
        assert!(e.validate().is_err());
    }

    #[test]
    fn color_validation() {
        assert!(validate_color("#4CAF50").is_ok());
        assert!(validate_color("#fff").is_err());
        assert!(validate_color("4CAF50").is_err());
        assert!(validate_color("#GGGGGG").is_err());
    }

    #[test]
    fn naive_timestamps_are_rejected_at_deserialization() {
        let body = r#"{"type":"music","t_start":"2026-02-16T14:30:00"}"#;
        assert!(serde_json::from_str::<EntityInput>(body).is_err());
    }

    #[test]
    fn time_query_defaults() {
        let body = r#"{
            "types": ["location.gps"],
            "start": "2024-01-01T00:00:00Z",
            "end": "2024-01-02T00:00:00Z"
        }"#;
        let req: TimeQueryRequest = serde_json::from_str(body).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.effective_limit(), defaults::TIME_QUERY_LIMIT);
        assert_eq!(req.order, TimeOrder::TStartAsc);
    }

    #[test]
    fn time_query_rejects_empty_window() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let req = TimeQueryRequest {
            types: vec!["music".into()],
            start: t,
            end: t,
            limit: None,
            order: TimeOrder::TStartAsc,
            resample: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn time_query_rejects_limit_with_resample() {
        let req = TimeQueryRequest {
            types: vec!["location.gps".into()],
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            limit: Some(100),
            order: TimeOrder::TStartAsc,
            resample: Some(ResampleConfig {
                method: ResampleMethod::UniformTime,
                n: 10,
            }),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn time_query_rejects_zero_bins() {
        let req = TimeQueryRequest {
            types: vec!["location.gps".into()],
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            limit: None,
            order: TimeOrder::TStartAsc,
            resample: Some(ResampleConfig {
                method: ResampleMethod::UniformTime,
                n: 0,
            }),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn bbox_query_validation() {
        let mut req = BboxQueryRequest {
            types: vec!["photo".into()],
            bbox: [-118.6, 33.7, -118.1, 34.3],
            time: None,
            limit: None,
            order: BboxOrder::TStartDesc,
        };
        assert!(req.validate().is_ok());
        assert_eq!(req.effective_limit(), defaults::BBOX_QUERY_LIMIT);

        req.bbox = [-118.1, 33.7, -118.6, 34.3];
        assert!(req.validate().is_err(), "inverted longitudes");

        req.bbox = [-118.6, 34.3, -118.1, 33.7];
        assert!(req.validate().is_err(), "inverted latitudes");

        req.bbox = [-190.0, 33.7, -118.1, 34.3];
        assert!(req.validate().is_err(), "out-of-range longitude");
    }

    #[test]
    fn bbox_order_serde_forms() {
        assert_eq!(
            serde_json::from_str::<BboxOrder>("\"random\"").unwrap(),
            BboxOrder::Random
        );
        assert_eq!(
            serde_json::to_string(&BboxOrder::TStartDesc).unwrap(),
            "\"t_start_desc\""
        );
    }

    #[test]
    fn payload_round_trips_known_kind() {
        let payload = EntityPayload::Music(MusicMeta {
            artist: Some("Radiohead".into()),
            album: Some("OK Computer".into()),
            track: Some("Karma Police".into()),
            duration_secs: Some(204.0),
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "music");
        let back: EntityPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn payload_unknown_document_falls_back_to_opaque() {
        let json = serde_json::json!({"source_type": "arc_app", "speed": 1.2});
        let payload: EntityPayload = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(payload, EntityPayload::Opaque(json.clone()));
        assert_eq!(serde_json::to_value(&payload).unwrap(), json);
    }

    #[test]
    fn entity_serializes_type_field() {
        let entity = Entity {
            id: Uuid::new_v4(),
            entity_type: "location.gps".into(),
            t_start: Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
            t_end: None,
            lat: Some(34.1),
            lon: Some(-118.3),
            name: None,
            color: None,
            render_offset: 0.0,
            source: Some("arc".into()),
            external_id: Some("2024-01-15T09:00:00Z".into()),
            loc_source: Some(LocSource::Native),
            payload: None,
        };
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["type"], "location.gps");
        assert_eq!(json["loc_source"], "native");
        assert!(json.get("geom").is_none());
        assert!(json.get("t_range").is_none());
    }
}
