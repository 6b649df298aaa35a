//! Place and visit synthesis over the GPS backbone.
//!
//! Two passes, callable independently of the plugin system:
//!
//! 1. **Cluster discovery** — density-based clustering (DBSCAN under the
//!    haversine metric) over `location.gps` samples, filtered down to
//!    clusters significant enough to call places.
//! 2. **Visit detection** — a scan of the time-ordered track per place:
//!    a visit opens when a sample enters the place radius, extends while
//!    the gap between in-radius samples stays small, and is kept when the
//!    dwell is long enough.
//!
//! Both passes emit ordinary entities (`place`, `place.visit`) keyed so
//! that re-detection upserts over previous output instead of duplicating
//! it.

use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use tracing::{debug, info};

use chronicle_core::{
    defaults, EntityInput, EntityPayload, Error, GeoSample, PlaceMeta, Result, VisitMeta,
};
use chronicle_db::Database;

/// Source tag carried by detector-emitted entities.
pub const DETECTOR_SOURCE: &str = "places";

/// One GPS sample of the backbone track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub t: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
}

/// Cluster discovery parameters.
#[derive(Debug, Clone)]
pub struct ClusterParams {
    /// DBSCAN neighborhood radius, meters (great-circle).
    pub epsilon_m: f64,
    /// DBSCAN minimum neighborhood size for a core point.
    pub min_samples: usize,
    /// Significance: minimum detected visits to keep a cluster.
    pub min_visit_count: usize,
    /// Significance: minimum cumulative dwell in hours to keep a cluster.
    pub min_total_dwell_hours: f64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            epsilon_m: defaults::PLACE_EPSILON_M,
            min_samples: defaults::PLACE_MIN_SAMPLES,
            min_visit_count: defaults::PLACE_MIN_VISIT_COUNT,
            min_total_dwell_hours: defaults::PLACE_MIN_TOTAL_DWELL_HOURS,
        }
    }
}

/// Visit detection parameters.
#[derive(Debug, Clone)]
pub struct VisitParams {
    /// Maximum gap between consecutive in-radius samples within one visit.
    pub max_gap: Duration,
    /// Minimum dwell for a candidate visit to be kept.
    pub min_dwell: Duration,
}

impl Default for VisitParams {
    fn default() -> Self {
        Self {
            max_gap: Duration::minutes(defaults::VISIT_MAX_GAP_MINUTES),
            min_dwell: Duration::minutes(defaults::VISIT_MIN_DWELL_MINUTES),
        }
    }
}

/// Great-circle distance between two WGS84 coordinates, meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (dlon / 2.0).sin().powi(2);

    defaults::EARTH_RADIUS_M * 2.0 * a.sqrt().asin()
}

/// A density cluster of track points.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Indices into the source track.
    pub members: Vec<usize>,
    /// Mean of member coordinates.
    pub centroid_lat: f64,
    pub centroid_lon: f64,
    /// 95th-percentile haversine distance from the centroid, meters.
    pub radius_m: f64,
}

/// DBSCAN over the haversine metric. Returns per-point cluster
/// assignment; `None` marks noise. Neighbor search is exhaustive, which is
/// adequate for the sample counts a personal track produces.
fn dbscan(points: &[TrackPoint], epsilon_m: f64, min_samples: usize) -> Vec<Option<usize>> {
    let n = points.len();
    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut next_cluster = 0usize;

    let neighbors = |i: usize| -> Vec<usize> {
        (0..n)
            .filter(|&j| {
                haversine_m(points[i].lat, points[i].lon, points[j].lat, points[j].lon)
                    <= epsilon_m
            })
            .collect()
    };

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let seed = neighbors(i);
        if seed.len() < min_samples {
            continue; // noise unless later absorbed as a border point
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[i] = Some(cluster);

        let mut queue = seed;
        while let Some(j) = queue.pop() {
            if labels[j].is_none() {
                labels[j] = Some(cluster);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;
            let reach = neighbors(j);
            if reach.len() >= min_samples {
                queue.extend(reach);
            }
        }
    }

    labels
}

/// Group labeled points into clusters with centroid and percentile radius.
fn build_clusters(points: &[TrackPoint], labels: &[Option<usize>]) -> Vec<Cluster> {
    let cluster_count = labels.iter().flatten().copied().max().map_or(0, |m| m + 1);
    let mut clusters = Vec::with_capacity(cluster_count);

    for k in 0..cluster_count {
        let members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter_map(|(i, label)| (*label == Some(k)).then_some(i))
            .collect();
        if members.is_empty() {
            continue;
        }

        let centroid_lat =
            members.iter().map(|&i| points[i].lat).sum::<f64>() / members.len() as f64;
        let centroid_lon =
            members.iter().map(|&i| points[i].lon).sum::<f64>() / members.len() as f64;

        let mut distances: Vec<f64> = members
            .iter()
            .map(|&i| haversine_m(centroid_lat, centroid_lon, points[i].lat, points[i].lon))
            .collect();
        distances.sort_by(|a, b| a.total_cmp(b));
        let rank = ((distances.len() as f64 * defaults::PLACE_RADIUS_PERCENTILE).ceil() as usize)
            .clamp(1, distances.len());
        let radius_m = distances[rank - 1];

        clusters.push(Cluster {
            members,
            centroid_lat,
            centroid_lon,
            radius_m,
        });
    }

    clusters
}

/// One detected stay inside a place radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisitSpan {
    pub entry: TrackPoint,
    pub exit: TrackPoint,
}

impl VisitSpan {
    pub fn dwell(&self) -> Duration {
        self.exit.t - self.entry.t
    }
}

/// Scan the time-ordered track for stays within `radius_m` of the center.
///
/// A candidate opens on the first in-radius sample, extends while
/// subsequent in-radius samples arrive within `max_gap` of the previous
/// one, and closes otherwise. A candidate still open when the track ends
/// is finalized. Only candidates with dwell `>= min_dwell` are kept.
fn detect_visits_in_track(
    track: &[TrackPoint],
    center_lat: f64,
    center_lon: f64,
    radius_m: f64,
    params: &VisitParams,
) -> Vec<VisitSpan> {
    let mut visits = Vec::new();
    let mut open: Option<VisitSpan> = None;

    for point in track {
        let inside = haversine_m(center_lat, center_lon, point.lat, point.lon) <= radius_m;
        match (&mut open, inside) {
            (None, true) => {
                open = Some(VisitSpan {
                    entry: *point,
                    exit: *point,
                });
            }
            (Some(span), true) => {
                if point.t - span.exit.t <= params.max_gap {
                    span.exit = *point;
                } else {
                    // Too long since the last in-radius sample: close the
                    // stay and open a fresh one at this sample.
                    let closed = *span;
                    if closed.dwell() >= params.min_dwell {
                        visits.push(closed);
                    }
                    open = Some(VisitSpan {
                        entry: *point,
                        exit: *point,
                    });
                }
            }
            (Some(span), false) => {
                if point.t - span.exit.t > params.max_gap {
                    let closed = *span;
                    if closed.dwell() >= params.min_dwell {
                        visits.push(closed);
                    }
                    open = None;
                }
                // A brief excursion within the gap budget keeps the stay
                // open without extending it.
            }
            (None, false) => {}
        }
    }

    // Dangling open visit at the end of the track is emitted; re-detection
    // after more samples arrive extends it in place via its upsert key.
    if let Some(span) = open {
        if span.dwell() >= params.min_dwell {
            visits.push(span);
        }
    }

    visits
}

/// Report of one detector run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectorReport {
    /// Clusters that passed the significance filter.
    pub places: usize,
    /// Visits upserted across all places.
    pub visits: usize,
    /// Backbone samples examined.
    pub samples: usize,
}

/// Runs both synthesis passes against the store.
pub struct PlaceDetector {
    db: Database,
    cluster_params: ClusterParams,
    visit_params: VisitParams,
}

impl PlaceDetector {
    /// Create a detector with default parameters.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            cluster_params: ClusterParams::default(),
            visit_params: VisitParams::default(),
        }
    }

    /// Override clustering parameters.
    pub fn with_cluster_params(mut self, params: ClusterParams) -> Self {
        self.cluster_params = params;
        self
    }

    /// Override visit parameters.
    pub fn with_visit_params(mut self, params: VisitParams) -> Self {
        self.visit_params = params;
        self
    }

    /// Run cluster discovery and visit detection over the whole backbone
    /// track, upserting `place` and `place.visit` entities.
    pub async fn run(&self) -> Result<DetectorReport> {
        let track = self.load_backbone_track().await?;
        if track.is_empty() {
            return Ok(DetectorReport::default());
        }

        let labels = dbscan(
            &track,
            self.cluster_params.epsilon_m,
            self.cluster_params.min_samples,
        );
        let clusters = build_clusters(&track, &labels);
        debug!(
            subsystem = "detector",
            component = "dbscan",
            op = "cluster",
            samples = track.len(),
            clusters = clusters.len(),
            "Clustered backbone track"
        );

        let mut report = DetectorReport {
            samples: track.len(),
            ..DetectorReport::default()
        };

        for (k, cluster) in clusters.iter().enumerate() {
            let visits = detect_visits_in_track(
                &track,
                cluster.centroid_lat,
                cluster.centroid_lon,
                cluster.radius_m.max(self.cluster_params.epsilon_m),
                &self.visit_params,
            );

            let total_dwell_hours: f64 = visits
                .iter()
                .map(|v| v.dwell().num_seconds() as f64 / 3600.0)
                .sum();
            if visits.len() < self.cluster_params.min_visit_count
                || total_dwell_hours < self.cluster_params.min_total_dwell_hours
            {
                continue;
            }

            // Members are index-ordered over a time-ordered track, so the
            // first member is the cluster's earliest sample.
            let first_seen = track[cluster.members[0]].t;
            let place_id = self
                .upsert_place(k, cluster, first_seen, visits.len(), total_dwell_hours)
                .await?;
            report.places += 1;

            let mut previous_exit: Option<DateTime<Utc>> = None;
            for span in &visits {
                self.upsert_visit(k, place_id, cluster, span, previous_exit)
                    .await?;
                previous_exit = Some(span.exit.t);
                report.visits += 1;
            }
        }

        info!(
            subsystem = "detector",
            component = "places",
            op = "run",
            samples = report.samples,
            places = report.places,
            upsert_count = report.visits,
            "Place detection complete"
        );
        Ok(report)
    }

    /// The backbone GPS track, time-ordered, coordinates only.
    async fn load_backbone_track(&self) -> Result<Vec<TrackPoint>> {
        let rows = sqlx::query(
            r#"
            SELECT t_start, lat, lon
            FROM entities
            WHERE type = $1
              AND source = $2
              AND lat IS NOT NULL
              AND lon IS NOT NULL
            ORDER BY t_start ASC
            "#,
        )
        .bind(defaults::GPS_TYPE)
        .bind(defaults::ENRICH_BACKBONE_SOURCE)
        .fetch_all(self.db.pool())
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| TrackPoint {
                t: r.get("t_start"),
                lat: r.get("lat"),
                lon: r.get("lon"),
            })
            .collect())
    }

    async fn upsert_place(
        &self,
        k: usize,
        cluster: &Cluster,
        first_seen: DateTime<Utc>,
        visit_count: usize,
        total_dwell_hours: f64,
    ) -> Result<uuid::Uuid> {
        let outcome = self
            .db
            .entities
            .upsert(EntityInput {
                id: None,
                entity_type: defaults::PLACE_TYPE.into(),
                // Places are timeless markers; the timestamp records when
                // the cluster first appears in the track.
                t_start: first_seen,
                t_end: None,
                lat: Some(cluster.centroid_lat),
                lon: Some(cluster.centroid_lon),
                name: Some(format!("Cluster {k}")),
                color: Some(defaults::GPS_COLOR.into()),
                render_offset: None,
                source: Some(DETECTOR_SOURCE.into()),
                external_id: Some(format!("cluster_{k}")),
                loc_source: None,
                payload: Some(EntityPayload::Place(PlaceMeta {
                    cluster: k as i64,
                    sample_count: cluster.members.len() as i64,
                    radius_m: cluster.radius_m,
                    visit_count: visit_count as i64,
                    total_dwell_hours,
                })),
            })
            .await?;
        Ok(outcome.id)
    }

    async fn upsert_visit(
        &self,
        k: usize,
        place_id: uuid::Uuid,
        cluster: &Cluster,
        span: &VisitSpan,
        previous_exit: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let gap_before_minutes =
            previous_exit.map(|exit| (span.entry.t - exit).num_seconds() as f64 / 60.0);

        self.db
            .entities
            .upsert(EntityInput {
                id: None,
                entity_type: defaults::VISIT_TYPE.into(),
                t_start: span.entry.t,
                t_end: Some(span.exit.t),
                lat: Some(cluster.centroid_lat),
                lon: Some(cluster.centroid_lon),
                name: Some(format!("Cluster {k}")),
                color: Some(defaults::GPS_COLOR.into()),
                render_offset: None,
                source: Some(DETECTOR_SOURCE.into()),
                external_id: Some(format!(
                    "visit_{}_cluster_{k}",
                    span.entry.t.to_rfc3339()
                )),
                loc_source: None,
                payload: Some(EntityPayload::Visit(VisitMeta {
                    place_id,
                    dwell_minutes: span.dwell().num_seconds() as f64 / 60.0,
                    gap_before_minutes,
                    radius_m: cluster.radius_m,
                    entry_sample: GeoSample {
                        t: span.entry.t,
                        lat: span.entry.lat,
                        lon: span.entry.lon,
                    },
                    exit_sample: GeoSample {
                        t: span.exit.t,
                        lat: span.exit.lat,
                        lon: span.exit.lon,
                    },
                })),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(minute: i64, lat: f64, lon: f64) -> TrackPoint {
        TrackPoint {
            t: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
            lat,
            lon,
        }
    }

    #[test]
    fn haversine_known_distance() {
        // Paris to London, roughly 343 km.
        let d = haversine_m(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((d - 343_000.0).abs() < 10_000.0, "got {d}");
    }

    #[test]
    fn haversine_zero_for_identical_points() {
        assert_eq!(haversine_m(34.05, -118.24, 34.05, -118.24), 0.0);
    }

    #[test]
    fn dbscan_separates_two_dense_sites_and_noise() {
        // ~0.0005 deg latitude is roughly 55 m.
        let mut points = Vec::new();
        for i in 0..10 {
            points.push(point(i, 34.0500 + 0.00002 * i as f64, -118.2400));
        }
        for i in 0..10 {
            points.push(point(100 + i, 40.7500 + 0.00002 * i as f64, -73.9800));
        }
        points.push(point(200, 51.5074, -0.1278)); // lone outlier

        let labels = dbscan(&points, 50.0, 5);
        let first = labels[0].expect("first site clustered");
        let second = labels[10].expect("second site clustered");
        assert_ne!(first, second);
        assert!(labels[20].is_none(), "outlier stays noise");
        assert!(labels[..10].iter().all(|l| *l == Some(first)));
        assert!(labels[10..20].iter().all(|l| *l == Some(second)));
    }

    #[test]
    fn cluster_centroid_and_radius() {
        let points: Vec<TrackPoint> = (0..20)
            .map(|i| point(i, 34.0500 + 0.00002 * (i % 5) as f64, -118.2400))
            .collect();
        let labels = dbscan(&points, 50.0, 5);
        let clusters = build_clusters(&points, &labels);
        assert_eq!(clusters.len(), 1);

        let cluster = &clusters[0];
        assert_eq!(cluster.members.len(), 20);
        assert!((cluster.centroid_lat - 34.05004).abs() < 1e-6);
        // All members sit within ~6 m of the centroid.
        assert!(cluster.radius_m < 10.0);
    }

    #[test]
    fn visit_opens_extends_and_closes_on_gap() {
        let inside = (34.0500, -118.2400);
        let faraway = (34.2000, -118.2400);
        let mut track = Vec::new();
        // First stay: minutes 0..=40 inside.
        for i in 0..=40 {
            track.push(point(i, inside.0, inside.1));
        }
        // Leave for two hours.
        for i in 0..4 {
            track.push(point(60 + i * 15, faraway.0, faraway.1));
        }
        // Second stay: minutes 180..=195 inside.
        for i in 0..=15 {
            track.push(point(180 + i, inside.0, inside.1));
        }

        let visits =
            detect_visits_in_track(&track, inside.0, inside.1, 100.0, &VisitParams::default());
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].dwell(), Duration::minutes(40));
        assert_eq!(visits[1].dwell(), Duration::minutes(15));
        assert_eq!(visits[1].entry.t, point(180, 0.0, 0.0).t);
    }

    #[test]
    fn short_stays_are_discarded() {
        let inside = (34.0500, -118.2400);
        let track: Vec<TrackPoint> = (0..5).map(|i| point(i, inside.0, inside.1)).collect();
        let visits =
            detect_visits_in_track(&track, inside.0, inside.1, 100.0, &VisitParams::default());
        assert!(visits.is_empty(), "4 minutes is below the dwell floor");
    }

    #[test]
    fn dangling_open_visit_is_finalized() {
        let inside = (34.0500, -118.2400);
        let track: Vec<TrackPoint> = (0..=20).map(|i| point(i, inside.0, inside.1)).collect();
        let visits =
            detect_visits_in_track(&track, inside.0, inside.1, 100.0, &VisitParams::default());
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].dwell(), Duration::minutes(20));
    }

    #[test]
    fn brief_excursion_within_gap_budget_keeps_the_stay_open() {
        let inside = (34.0500, -118.2400);
        let outside = (34.0600, -118.2400); // ~1.1 km away
        let mut track = Vec::new();
        for i in 0..=15 {
            track.push(point(i, inside.0, inside.1));
        }
        track.push(point(20, outside.0, outside.1));
        for i in 25..=40 {
            track.push(point(i, inside.0, inside.1));
        }

        let visits =
            detect_visits_in_track(&track, inside.0, inside.1, 100.0, &VisitParams::default());
        assert_eq!(visits.len(), 1, "10-minute excursion stays inside the gap");
        assert_eq!(visits[0].dwell(), Duration::minutes(40));
    }
}
