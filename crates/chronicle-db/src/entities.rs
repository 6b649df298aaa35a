//! Entity repository: transactional upsert, windowed queries, the
//! uniform-time resample operator, and the constant-memory streaming export.
//!
//! The derived `geom` and `t_range` columns are generated by the database
//! from their scalar sources, so every statement here writes only scalars
//! and projects coordinates back out with `ST_X`/`ST_Y`.

use futures::StreamExt;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use chronicle_core::{
    defaults, BatchOutcome, BboxOrder, BboxQueryRequest, DatabaseSize, Entity, EntityInput,
    Error, ExportOrder, LocSource, Result, StatsResponse, TimeCoverage, TimeOrder,
    TimeQueryRequest, TimeWindow, TypeCount, UpsertOutcome, UpsertStatus,
};

/// Columns of the public entity surface, with coordinates projected back
/// from the stored geometry.
const ENTITY_COLUMNS: &str = r#"
    id, type, t_start, t_end,
    CASE WHEN geom IS NULL THEN NULL ELSE ST_Y(geom) END AS lat,
    CASE WHEN geom IS NULL THEN NULL ELSE ST_X(geom) END AS lon,
    name, color, render_offset, source, external_id, loc_source, payload
"#;

/// PostgreSQL entity repository.
#[derive(Clone)]
pub struct PgEntityRepository {
    pool: Pool<Postgres>,
}

impl PgEntityRepository {
    /// Create a new entity repository over the given pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // UPSERT
    // =========================================================================

    /// Insert-or-replace one entity.
    ///
    /// When `(source, external_id)` is fully present the write lands on the
    /// partial unique index and replaces the writable fields in place;
    /// otherwise a fresh row is inserted. The returned status distinguishes
    /// the two via `xmax = 0` on the returned row.
    pub async fn upsert(&self, input: EntityInput) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let outcome = self.upsert_tx(&mut tx, input).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(outcome)
    }

    /// Transaction-aware variant of [`upsert`](Self::upsert).
    pub async fn upsert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        input: EntityInput,
    ) -> Result<UpsertOutcome> {
        input.validate()?;
        let payload = payload_to_json(&input)?;

        if input.has_dedup_key() {
            let row = sqlx::query(
                r#"
                INSERT INTO entities (
                    type, t_start, t_end, lat, lon,
                    name, color, render_offset,
                    source, external_id, loc_source, payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (source, external_id)
                WHERE source IS NOT NULL AND external_id IS NOT NULL
                DO UPDATE SET
                    type = EXCLUDED.type,
                    t_start = EXCLUDED.t_start,
                    t_end = EXCLUDED.t_end,
                    lat = EXCLUDED.lat,
                    lon = EXCLUDED.lon,
                    name = EXCLUDED.name,
                    color = EXCLUDED.color,
                    render_offset = EXCLUDED.render_offset,
                    loc_source = EXCLUDED.loc_source,
                    payload = EXCLUDED.payload,
                    updated_at = now()
                RETURNING id, (xmax = 0) AS inserted
                "#,
            )
            .bind(&input.entity_type)
            .bind(input.t_start)
            .bind(input.t_end)
            .bind(input.lat)
            .bind(input.lon)
            .bind(&input.name)
            .bind(&input.color)
            .bind(input.render_offset.unwrap_or(0.0))
            .bind(&input.source)
            .bind(&input.external_id)
            .bind(input.loc_source.map(|l| l.as_str()))
            .bind(payload)
            .fetch_one(&mut **tx)
            .await
            .map_err(Error::Database)?;

            let inserted: bool = row.get("inserted");
            Ok(UpsertOutcome {
                id: row.get("id"),
                status: if inserted {
                    UpsertStatus::Inserted
                } else {
                    UpsertStatus::Updated
                },
            })
        } else {
            let row = sqlx::query(
                r#"
                INSERT INTO entities (
                    type, t_start, t_end, lat, lon,
                    name, color, render_offset,
                    source, external_id, loc_source, payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                RETURNING id
                "#,
            )
            .bind(&input.entity_type)
            .bind(input.t_start)
            .bind(input.t_end)
            .bind(input.lat)
            .bind(input.lon)
            .bind(&input.name)
            .bind(&input.color)
            .bind(input.render_offset.unwrap_or(0.0))
            .bind(&input.source)
            .bind(&input.external_id)
            .bind(input.loc_source.map(|l| l.as_str()))
            .bind(payload)
            .fetch_one(&mut **tx)
            .await
            .map_err(Error::Database)?;

            Ok(UpsertOutcome {
                id: row.get("id"),
                status: UpsertStatus::Inserted,
            })
        }
    }

    /// Batched upsert in a single transaction, all-or-nothing.
    pub async fn upsert_batch(&self, inputs: Vec<EntityInput>) -> Result<BatchOutcome> {
        if inputs.len() > defaults::BATCH_MAX_ENTITIES {
            return Err(Error::Validation(format!(
                "maximum {} entities per batch",
                defaults::BATCH_MAX_ENTITIES
            )));
        }

        let mut inserted = 0i64;
        let mut updated = 0i64;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for input in inputs {
            match self.upsert_tx(&mut tx, input).await?.status {
                UpsertStatus::Inserted => inserted += 1,
                UpsertStatus::Updated => updated += 1,
            }
        }
        tx.commit().await.map_err(Error::Database)?;

        Ok(BatchOutcome {
            inserted,
            updated,
            errors: 0,
            total: inserted + updated,
        })
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Rows whose closed time range overlaps the window, type-filtered,
    /// ordered by `t_start`.
    pub async fn query_time(&self, req: &TimeQueryRequest) -> Result<Vec<Entity>> {
        let order = match req.order {
            TimeOrder::TStartAsc => "ASC",
            TimeOrder::TStartDesc => "DESC",
        };
        let sql = format!(
            r#"
            SELECT {ENTITY_COLUMNS}
            FROM entities
            WHERE type = ANY($1)
              AND t_range && tstzrange($2, $3, '[]')
            ORDER BY t_start {order}
            LIMIT $4
            "#,
        );

        let rows = sqlx::query(&sql)
            .bind(&req.types)
            .bind(req.start)
            .bind(req.end)
            .bind(req.effective_limit())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.into_iter().map(map_row_to_entity).collect()
    }

    /// The uniform-time resample operator.
    ///
    /// Partitions `[t0, t1]` into `n` adjacent half-open bins and picks, per
    /// bin, the row whose `t_start` is nearest the bin center; ties break to
    /// the earlier `t_start`, then the lower id. Planned as `n` independent
    /// bounded lookups over the `(type, t_start)` index via a LATERAL join,
    /// never a full scan.
    pub async fn resample(
        &self,
        types: &[String],
        t0: chrono::DateTime<chrono::Utc>,
        t1: chrono::DateTime<chrono::Utc>,
        n: i64,
    ) -> Result<Vec<Entity>> {
        let rows = sqlx::query(
            r#"
            WITH params AS (
                SELECT $2::timestamptz AS t0, $3::timestamptz AS t1, $4::bigint AS n
            ),
            bins AS (
                SELECT
                    i,
                    t0 + (t1 - t0) * ((i + 0.5)::float8 / n::float8) AS t_center,
                    t0 + (t1 - t0) * (i::float8 / n::float8)         AS bin_start,
                    t0 + (t1 - t0) * ((i + 1)::float8 / n::float8)   AS bin_end
                FROM params, generate_series(0, (SELECT n - 1 FROM params)) AS i
            ),
            candidates AS (
                SELECT e.*
                FROM bins b
                JOIN LATERAL (
                    SELECT id, type, t_start, t_end, geom,
                           name, color, render_offset,
                           source, external_id, loc_source, payload
                    FROM entities
                    WHERE type = ANY($1)
                      AND t_start >= b.bin_start
                      AND t_start <  b.bin_end
                    ORDER BY ABS(EXTRACT(EPOCH FROM (t_start - b.t_center))) ASC,
                             t_start ASC,
                             id ASC
                    LIMIT 1
                ) e ON TRUE
            )
            SELECT id, type, t_start, t_end,
                   CASE WHEN geom IS NULL THEN NULL ELSE ST_Y(geom) END AS lat,
                   CASE WHEN geom IS NULL THEN NULL ELSE ST_X(geom) END AS lon,
                   name, color, render_offset, source, external_id, loc_source, payload
            FROM candidates
            ORDER BY t_start ASC
            "#,
        )
        .bind(types)
        .bind(t0)
        .bind(t1)
        .bind(n)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "entities",
            op = "resample",
            bins = n,
            result_count = rows.len(),
            "Resample query complete"
        );

        rows.into_iter().map(map_row_to_entity).collect()
    }

    /// Rows whose geometry falls inside the envelope, optionally intersected
    /// with a time window.
    pub async fn query_bbox(&self, req: &BboxQueryRequest) -> Result<Vec<Entity>> {
        let order = match req.order {
            BboxOrder::TStartAsc => "t_start ASC",
            BboxOrder::TStartDesc => "t_start DESC",
            BboxOrder::Random => "RANDOM()",
        };
        let [lonmin, latmin, lonmax, latmax] = req.bbox;

        let rows = if let Some(TimeWindow { start, end }) = req.time {
            let sql = format!(
                r#"
                SELECT {ENTITY_COLUMNS}
                FROM entities
                WHERE type = ANY($1)
                  AND geom IS NOT NULL
                  AND geom && ST_MakeEnvelope($2, $3, $4, $5, 4326)
                  AND t_range && tstzrange($6, $7, '[]')
                ORDER BY {order}
                LIMIT $8
                "#,
            );
            sqlx::query(&sql)
                .bind(&req.types)
                .bind(lonmin)
                .bind(latmin)
                .bind(lonmax)
                .bind(latmax)
                .bind(start)
                .bind(end)
                .bind(req.effective_limit())
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?
        } else {
            let sql = format!(
                r#"
                SELECT {ENTITY_COLUMNS}
                FROM entities
                WHERE type = ANY($1)
                  AND geom IS NOT NULL
                  AND geom && ST_MakeEnvelope($2, $3, $4, $5, 4326)
                ORDER BY {order}
                LIMIT $6
                "#,
            );
            sqlx::query(&sql)
                .bind(&req.types)
                .bind(lonmin)
                .bind(latmin)
                .bind(lonmax)
                .bind(latmax)
                .bind(req.effective_limit())
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?
        };

        rows.into_iter().map(map_row_to_entity).collect()
    }

    // =========================================================================
    // STREAMING EXPORT
    // =========================================================================

    /// Begin a streaming export: returns the total row count and a lazy,
    /// finite, non-restartable sequence of entities.
    ///
    /// The database cursor runs in a background task bridged over a bounded
    /// channel, so resident memory stays constant regardless of table size
    /// and backpressure from a slow client propagates to the cursor. When
    /// the receiver is dropped (client disconnect) the task stops and the
    /// cursor is closed.
    pub async fn stream_export(
        &self,
        types: Option<Vec<String>>,
        order: ExportOrder,
    ) -> Result<(i64, ReceiverStream<Result<Entity>>)> {
        let total: i64 = if let Some(types) = &types {
            sqlx::query_scalar("SELECT COUNT(*) FROM entities WHERE type = ANY($1)")
                .bind(types)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM entities")
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?
        };

        let direction = match order {
            ExportOrder::Newest => "DESC",
            ExportOrder::Oldest => "ASC",
        };
        let where_clause = if types.is_some() {
            "WHERE type = ANY($1)"
        } else {
            ""
        };
        let sql = format!(
            r#"
            SELECT {ENTITY_COLUMNS}
            FROM entities
            {where_clause}
            ORDER BY t_start {direction}
            "#,
        );

        let (tx, rx) = mpsc::channel(defaults::EXPORT_CHANNEL_CAPACITY);
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let mut query = sqlx::query(&sql);
            if let Some(types) = &types {
                query = query.bind(types);
            }
            let mut rows = query.fetch(&pool);
            let mut emitted = 0u64;
            while let Some(row) = rows.next().await {
                let item = row.map_err(Error::Database).and_then(map_row_to_entity);
                let failed = item.is_err();
                if tx.send(item).await.is_err() {
                    // Receiver dropped: client went away, close the cursor.
                    debug!(
                        subsystem = "db",
                        component = "export",
                        op = "abort",
                        result_count = emitted,
                        "Export receiver dropped, closing cursor"
                    );
                    return;
                }
                if failed {
                    return;
                }
                emitted += 1;
            }
            debug!(
                subsystem = "db",
                component = "export",
                op = "complete",
                result_count = emitted,
                "Export stream complete"
            );
        });

        Ok((total, ReceiverStream::new(rx)))
    }

    // =========================================================================
    // VISIT DELETION
    // =========================================================================

    /// Bulk-delete `place.visit` rows, optionally restricted to rows whose
    /// range overlaps a window. The confirmation gate lives at the API
    /// boundary; this is the unconditional store operation.
    pub async fn delete_visits(&self, window: Option<TimeWindow>) -> Result<i64> {
        let deleted = if let Some(TimeWindow { start, end }) = window {
            sqlx::query(
                "DELETE FROM entities WHERE type = $1 AND t_range && tstzrange($2, $3, '[]')",
            )
            .bind(defaults::VISIT_TYPE)
            .bind(start)
            .bind(end)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?
            .rows_affected()
        } else {
            sqlx::query("DELETE FROM entities WHERE type = $1")
                .bind(defaults::VISIT_TYPE)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?
                .rows_affected()
        };

        warn!(
            subsystem = "db",
            component = "entities",
            op = "delete_visits",
            result_count = deleted,
            "Bulk-deleted visit entities"
        );
        Ok(deleted as i64)
    }

    // =========================================================================
    // STATS
    // =========================================================================

    /// Store-wide totals, per-type counts, time coverage, and on-disk sizes.
    pub async fn stats(&self, uptime_seconds: u64) -> Result<StatsResponse> {
        let total_entities: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entities")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        let by_type = sqlx::query(
            "SELECT type, COUNT(*) AS count FROM entities GROUP BY type ORDER BY count DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?
        .into_iter()
        .map(|r| TypeCount {
            entity_type: r.get("type"),
            count: r.get("count"),
        })
        .collect();

        let coverage = sqlx::query(
            "SELECT MIN(t_start) AS oldest, MAX(COALESCE(t_end, t_start)) AS newest FROM entities",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let sizes = sqlx::query(
            r#"
            SELECT pg_database_size(current_database()) AS database_bytes,
                   pg_relation_size('entities') AS table_bytes,
                   pg_indexes_size('entities') AS index_bytes
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(StatsResponse {
            total_entities,
            entities_by_type: by_type,
            time_coverage: TimeCoverage {
                oldest: coverage.get("oldest"),
                newest: coverage.get("newest"),
            },
            database: DatabaseSize {
                size_mb: bytes_to_mb(sizes.get::<i64, _>("database_bytes")),
                table_size_mb: bytes_to_mb(sizes.get::<i64, _>("table_bytes")),
                index_size_mb: bytes_to_mb(sizes.get::<i64, _>("index_bytes")),
            },
            uptime_seconds,
        })
    }
}

fn bytes_to_mb(bytes: i64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

fn payload_to_json(input: &EntityInput) -> Result<Option<JsonValue>> {
    input
        .payload
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(Into::into)
}

/// Map a database row to the public entity surface.
pub(crate) fn map_row_to_entity(row: PgRow) -> Result<Entity> {
    let loc_source: Option<String> = row.try_get("loc_source").map_err(Error::Database)?;
    let payload: Option<JsonValue> = row.try_get("payload").map_err(Error::Database)?;

    Ok(Entity {
        id: row.try_get("id").map_err(Error::Database)?,
        entity_type: row.try_get("type").map_err(Error::Database)?,
        t_start: row.try_get("t_start").map_err(Error::Database)?,
        t_end: row.try_get("t_end").map_err(Error::Database)?,
        lat: row.try_get("lat").map_err(Error::Database)?,
        lon: row.try_get("lon").map_err(Error::Database)?,
        name: row.try_get("name").map_err(Error::Database)?,
        color: row.try_get("color").map_err(Error::Database)?,
        render_offset: row.try_get("render_offset").map_err(Error::Database)?,
        source: row.try_get("source").map_err(Error::Database)?,
        external_id: row.try_get("external_id").map_err(Error::Database)?,
        loc_source: loc_source.as_deref().and_then(LocSource::parse),
        payload: payload.map(serde_json::from_value).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_to_mb_rounds_to_two_decimals() {
        assert_eq!(bytes_to_mb(1024 * 1024), 1.0);
        assert_eq!(bytes_to_mb(1536 * 1024), 1.5);
        assert_eq!(bytes_to_mb(0), 0.0);
    }
}
