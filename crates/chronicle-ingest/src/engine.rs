//! The ingestion engine: runs source plugins through the watermark
//! protocol.
//!
//! A run loads the source's watermark, pulls new raw items, normalizes
//! them, enriches missing locations from the GPS backbone, upserts into
//! the store, and only then advances the watermark. Any failure leaves the
//! watermark untouched; rows already upserted are retained, and the next
//! run replays the window with duplicates collapsing on the
//! `(source, external_id)` key.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use chronicle_core::{
    defaults, EntityInput, Error, IngestStore, LocSource, LocationResolver, Result, UpsertStatus,
};

use crate::registry::SourceRegistry;
use crate::source::SourcePlugin;

/// Outcome of one successful source run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub source: String,
    /// Raw items yielded by `discover`.
    pub discovered: u64,
    /// Entities that created new rows.
    pub inserted: u64,
    /// Entities that replaced existing rows.
    pub updated: u64,
}

impl RunReport {
    /// Total successful upserts, the count recorded on the watermark.
    pub fn upserted(&self) -> u64 {
        self.inserted + self.updated
    }
}

/// Orchestrates source plugins against the store and resolver seams.
pub struct IngestEngine {
    store: Arc<dyn IngestStore>,
    resolver: Arc<dyn LocationResolver>,
    registry: Arc<SourceRegistry>,
    /// First-run watermark for sources with no recorded state.
    epoch: DateTime<Utc>,
    /// Per-source run serialization. Runs of different sources proceed in
    /// parallel; two runs of the same source queue on its mutex.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IngestEngine {
    /// Create an engine over the given seams with the default epoch.
    pub fn new(
        store: Arc<dyn IngestStore>,
        resolver: Arc<dyn LocationResolver>,
        registry: Arc<SourceRegistry>,
    ) -> Self {
        let epoch = DateTime::parse_from_rfc3339(defaults::INGEST_EPOCH)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(DateTime::UNIX_EPOCH);
        Self {
            store,
            resolver,
            registry,
            epoch,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Override the first-run epoch.
    pub fn with_epoch(mut self, epoch: DateTime<Utc>) -> Self {
        self.epoch = epoch;
        self
    }

    /// Names of the sources this engine can run.
    pub fn sources(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Run one source through the full protocol.
    pub async fn run(&self, source: &str) -> Result<RunReport> {
        let plugin = self
            .registry
            .get(source)
            .ok_or_else(|| Error::NotFound(format!("source '{source}'")))?;

        let lock = self.lock_for(source).await;
        let _guard = lock.lock().await;

        let started = Instant::now();
        // The watermark is written with the run start, not the finish, so
        // items arriving mid-run fall into the next window instead of the
        // gap between discovery and commit.
        let run_start = Utc::now();
        let since = self
            .store
            .get_watermark(source)
            .await?
            .map(|state| state.last_run)
            .unwrap_or(self.epoch);

        debug!(
            subsystem = "ingest",
            component = "engine",
            op = "run",
            source,
            since = %since,
            "Starting source run"
        );

        let mut report = RunReport {
            source: source.to_string(),
            discovered: 0,
            inserted: 0,
            updated: 0,
        };

        {
            let mut raw_items = plugin.discover(since);
            while let Some(raw) = raw_items.next().await {
                let raw = raw.map_err(|e| Error::source(source, e.to_string()))?;
                report.discovered += 1;

                let drafts = plugin
                    .extract(raw)
                    .map_err(|e| Error::source(source, e.to_string()))?;
                for mut entity in drafts {
                    entity.source = Some(plugin.name().to_string());
                    self.enrich(plugin.as_ref(), &mut entity).await?;
                    match self.store.upsert(entity).await?.status {
                        UpsertStatus::Inserted => report.inserted += 1,
                        UpsertStatus::Updated => report.updated += 1,
                    }
                }
            }
        }

        self.store
            .set_watermark(source, run_start, report.upserted() as i64)
            .await?;

        info!(
            subsystem = "ingest",
            component = "engine",
            op = "run",
            source,
            discovered = report.discovered,
            upsert_count = report.upserted(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Source run complete"
        );
        Ok(report)
    }

    /// Run every registered source. Runs proceed in parallel; a failing
    /// source is logged and contained, leaving the others unaffected.
    pub async fn run_all(self: Arc<Self>) -> Vec<RunReport> {
        let handles: Vec<_> = self
            .registry
            .names()
            .into_iter()
            .map(|source| {
                let engine = Arc::clone(&self);
                tokio::spawn(async move {
                    match engine.run(&source).await {
                        Ok(report) => Some(report),
                        Err(e) => {
                            error!(
                                subsystem = "ingest",
                                component = "engine",
                                op = "run",
                                source = %source,
                                error = %e,
                                "Source run failed; watermark not advanced"
                            );
                            None
                        }
                    }
                })
            })
            .collect();

        let mut reports = Vec::new();
        for handle in handles {
            if let Ok(Some(report)) = handle.await {
                reports.push(report);
            }
        }
        reports
    }

    /// Tag location provenance, consulting the resolver for non-native
    /// sources that lack coordinates.
    async fn enrich(&self, plugin: &dyn SourcePlugin, entity: &mut EntityInput) -> Result<()> {
        if entity.lat.is_some() && entity.lon.is_some() {
            if plugin.has_native_location() {
                entity.loc_source = Some(LocSource::Native);
            }
            return Ok(());
        }
        if plugin.has_native_location() {
            // A native source with a coordinate-less record stays bare.
            return Ok(());
        }
        match self.resolver.resolve(entity.t_start).await? {
            Some(fix) => {
                entity.lat = Some(fix.lat);
                entity.lon = Some(fix.lon);
                entity.loc_source = Some(LocSource::Inferred);
            }
            None => {
                entity.loc_source = None;
            }
        }
        Ok(())
    }

    async fn lock_for(&self, source: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(source.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use chronicle_core::{GeoFix, SourceState, UpsertOutcome};
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use uuid::Uuid;

    use crate::source::StaticSource;

    /// In-memory store keyed the way the partial unique index keys rows.
    #[derive(Default)]
    struct MemoryStore {
        rows: StdMutex<HashMap<(String, String), EntityInput>>,
        watermarks: StdMutex<HashMap<String, SourceState>>,
        fail_upserts: bool,
    }

    #[async_trait]
    impl IngestStore for MemoryStore {
        async fn upsert(&self, input: EntityInput) -> Result<UpsertOutcome> {
            if self.fail_upserts {
                return Err(Error::Unavailable("pool exhausted".into()));
            }
            let key = (
                input.source.clone().unwrap_or_default(),
                input.external_id.clone().unwrap_or_default(),
            );
            let mut rows = self.rows.lock().unwrap();
            let status = if rows.insert(key, input).is_some() {
                UpsertStatus::Updated
            } else {
                UpsertStatus::Inserted
            };
            Ok(UpsertOutcome {
                id: Uuid::new_v4(),
                status,
            })
        }

        async fn get_watermark(&self, source: &str) -> Result<Option<SourceState>> {
            Ok(self.watermarks.lock().unwrap().get(source).cloned())
        }

        async fn set_watermark(
            &self,
            source: &str,
            last_run: DateTime<Utc>,
            count: i64,
        ) -> Result<()> {
            self.watermarks.lock().unwrap().insert(
                source.to_string(),
                SourceState {
                    source: source.to_string(),
                    last_run,
                    last_count: count,
                    updated_at: last_run,
                },
            );
            Ok(())
        }
    }

    /// Resolver with one fix at a fixed instant.
    struct StubResolver {
        fix_at: DateTime<Utc>,
        fix: GeoFix,
    }

    #[async_trait]
    impl LocationResolver for StubResolver {
        async fn resolve(&self, at: DateTime<Utc>) -> Result<Option<GeoFix>> {
            Ok((at >= self.fix_at).then_some(self.fix))
        }
    }

    fn engine_with(
        store: Arc<MemoryStore>,
        plugin: StaticSource,
    ) -> (Arc<IngestEngine>, Arc<MemoryStore>) {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(plugin)).unwrap();
        let resolver = Arc::new(StubResolver {
            fix_at: Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
            fix: GeoFix {
                lat: 34.10,
                lon: -118.30,
            },
        });
        let engine = Arc::new(IngestEngine::new(
            store.clone(),
            resolver,
            Arc::new(registry),
        ));
        (engine, store)
    }

    fn music_record(t: &str) -> serde_json::Value {
        json!({"type": "music", "t_start": t, "external_id": t})
    }

    #[tokio::test]
    async fn run_upserts_and_advances_watermark() {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap();
        let plugin = StaticSource::new("spotify", false)
            .with_record(t, music_record("2024-01-15T09:30:00Z"));
        let (engine, store) = engine_with(Arc::new(MemoryStore::default()), plugin);

        let report = engine.run("spotify").await.unwrap();
        assert_eq!(report.discovered, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.updated, 0);

        let state = store.get_watermark("spotify").await.unwrap().unwrap();
        assert_eq!(state.last_count, 1);
        assert!(state.last_run <= Utc::now());

        // Rows carry the plugin name as their source.
        let rows = store.rows.lock().unwrap();
        let entity = rows
            .get(&("spotify".to_string(), "2024-01-15T09:30:00Z".to_string()))
            .unwrap();
        assert_eq!(entity.source.as_deref(), Some("spotify"));
    }

    #[tokio::test]
    async fn second_run_skips_already_seen_items() {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap();
        let plugin = StaticSource::new("spotify", false)
            .with_record(t, music_record("2024-01-15T09:30:00Z"));
        let (engine, _store) = engine_with(Arc::new(MemoryStore::default()), plugin);

        engine.run("spotify").await.unwrap();
        // The record's key timestamp predates the stored watermark now.
        let report = engine.run("spotify").await.unwrap();
        assert_eq!(report.discovered, 0);
        assert_eq!(report.upserted(), 0);
    }

    #[tokio::test]
    async fn non_native_entities_get_inferred_coordinates() {
        let at_fix = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap();
        let before_fix = Utc.with_ymd_and_hms(2024, 1, 15, 8, 59, 0).unwrap();
        let plugin = StaticSource::new("spotify", false)
            .with_record(at_fix, music_record("2024-01-15T09:30:00Z"))
            .with_record(before_fix, music_record("2024-01-15T08:59:00Z"));
        let (engine, store) = engine_with(Arc::new(MemoryStore::default()), plugin);

        engine.run("spotify").await.unwrap();

        let rows = store.rows.lock().unwrap();
        let enriched = rows
            .get(&("spotify".to_string(), "2024-01-15T09:30:00Z".to_string()))
            .unwrap();
        assert_eq!(enriched.lat, Some(34.10));
        assert_eq!(enriched.lon, Some(-118.30));
        assert_eq!(enriched.loc_source, Some(LocSource::Inferred));

        let bare = rows
            .get(&("spotify".to_string(), "2024-01-15T08:59:00Z".to_string()))
            .unwrap();
        assert_eq!(bare.lat, None, "no fix at or before the instant");
        assert_eq!(bare.loc_source, None);
    }

    #[tokio::test]
    async fn native_entities_bypass_the_resolver() {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let plugin = StaticSource::new("arc", true).with_record(
            t,
            json!({
                "type": "location.gps",
                "t_start": "2024-01-15T10:00:00Z",
                "external_id": "2024-01-15T10:00:00Z",
                "lat": 51.5,
                "lon": -0.12
            }),
        );
        let (engine, store) = engine_with(Arc::new(MemoryStore::default()), plugin);

        engine.run("arc").await.unwrap();

        let rows = store.rows.lock().unwrap();
        let entity = rows
            .get(&("arc".to_string(), "2024-01-15T10:00:00Z".to_string()))
            .unwrap();
        assert_eq!(entity.loc_source, Some(LocSource::Native));
        assert_eq!(entity.lat, Some(51.5), "native coordinates untouched");
    }

    #[tokio::test]
    async fn failed_run_leaves_watermark_untouched() {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap();
        let plugin = StaticSource::new("spotify", false)
            .with_record(t, music_record("2024-01-15T09:30:00Z"));
        let store = Arc::new(MemoryStore {
            fail_upserts: true,
            ..MemoryStore::default()
        });
        let (engine, store) = engine_with(store, plugin);

        assert!(engine.run("spotify").await.is_err());
        assert!(
            store.get_watermark("spotify").await.unwrap().is_none(),
            "watermark is only advanced after a clean run"
        );
    }

    #[tokio::test]
    async fn unknown_source_is_not_found() {
        let (engine, _) = engine_with(
            Arc::new(MemoryStore::default()),
            StaticSource::new("spotify", false),
        );
        assert!(matches!(
            engine.run("missing").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
