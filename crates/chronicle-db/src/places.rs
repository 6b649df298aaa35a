//! Place repository: listing with visit statistics, detail with recent
//! visits, transactional rename propagation, and the visit-deletion path.
//!
//! Places and visits are ordinary entities (`type = 'place'` /
//! `'place.visit'`); a visit references its place through
//! `payload->>'place_id'`, which the GIN index on `payload` serves.

use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use chronicle_core::{
    defaults, Entity, Error, PlaceDetail, PlaceSummary, RenameOutcome, Result,
    UpdatePlaceRequest,
};

use crate::entities::map_row_to_entity;

/// PostgreSQL place repository.
#[derive(Clone)]
pub struct PgPlaceRepository {
    pool: Pool<Postgres>,
}

impl PgPlaceRepository {
    /// Create a new place repository over the given pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// All places with aggregate visit statistics, busiest first.
    pub async fn list(&self) -> Result<Vec<PlaceSummary>> {
        let rows = sqlx::query(&place_summary_sql("WHERE p.type = $1"))
            .bind(defaults::PLACE_TYPE)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(map_row_to_summary).collect())
    }

    /// One place with its most recent visits. `PlaceNotFound` when the id
    /// does not name a `place` entity.
    pub async fn get(&self, id: Uuid) -> Result<PlaceDetail> {
        let row = sqlx::query(&place_summary_sql("WHERE p.type = $1 AND p.id = $2"))
            .bind(defaults::PLACE_TYPE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::PlaceNotFound(id))?;

        let place = map_row_to_summary(row);

        let visits = sqlx::query(
            r#"
            SELECT id, type, t_start, t_end,
                   CASE WHEN geom IS NULL THEN NULL ELSE ST_Y(geom) END AS lat,
                   CASE WHEN geom IS NULL THEN NULL ELSE ST_X(geom) END AS lon,
                   name, color, render_offset, source, external_id, loc_source, payload
            FROM entities
            WHERE type = $1
              AND payload->>'place_id' = $2::text
            ORDER BY t_start DESC
            LIMIT $3
            "#,
        )
        .bind(defaults::VISIT_TYPE)
        .bind(id)
        .bind(defaults::PLACE_RECENT_VISITS)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let recent_visits = visits
            .into_iter()
            .map(map_row_to_entity)
            .collect::<Result<Vec<Entity>>>()?;

        Ok(PlaceDetail {
            place,
            recent_visits,
        })
    }

    /// Rename a place and propagate name/color to every visit referencing
    /// it, in a single transaction. Returns the number of visits updated —
    /// a testable invariant of the rename contract.
    pub async fn rename(&self, id: Uuid, req: &UpdatePlaceRequest) -> Result<RenameOutcome> {
        req.validate()?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let place = sqlx::query(
            r#"
            UPDATE entities
            SET name = COALESCE($2, name),
                color = COALESCE($3, color),
                updated_at = now()
            WHERE id = $1 AND type = $4
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.color)
        .bind(defaults::PLACE_TYPE)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if place.is_none() {
            return Err(Error::PlaceNotFound(id));
        }

        let updated_visits = sqlx::query(
            r#"
            UPDATE entities
            SET name = COALESCE($2, name),
                color = COALESCE($3, color),
                updated_at = now()
            WHERE type = $4
              AND payload->>'place_id' = $1::text
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.color)
        .bind(defaults::VISIT_TYPE)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected() as i64;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "places",
            op = "rename",
            place_id = %id,
            result_count = updated_visits,
            "Renamed place and propagated to visits"
        );

        Ok(RenameOutcome { updated_visits })
    }
}

/// Aggregate SQL shared by list and detail: one row per place with visit
/// count, cumulative dwell, and last visit time.
fn place_summary_sql(where_clause: &str) -> String {
    format!(
        r#"
        SELECT p.id, p.name, p.color,
               CASE WHEN p.geom IS NULL THEN NULL ELSE ST_Y(p.geom) END AS lat,
               CASE WHEN p.geom IS NULL THEN NULL ELSE ST_X(p.geom) END AS lon,
               (p.payload->>'radius_m')::float8 AS radius_m,
               COUNT(v.id) AS visit_count,
               COALESCE(SUM((v.payload->>'dwell_minutes')::float8), 0) / 60.0
                   AS total_dwell_hours,
               MAX(v.t_start) AS last_visit
        FROM entities p
        LEFT JOIN entities v
               ON v.type = 'place.visit'
              AND v.payload->>'place_id' = p.id::text
        {where_clause}
        GROUP BY p.id, p.name, p.color, p.geom, p.payload
        ORDER BY visit_count DESC, p.name ASC
        "#,
    )
}

fn map_row_to_summary(row: PgRow) -> PlaceSummary {
    PlaceSummary {
        id: row.get("id"),
        name: row.get("name"),
        color: row.get("color"),
        lat: row.get("lat"),
        lon: row.get("lon"),
        radius_m: row.get("radius_m"),
        visit_count: row.get("visit_count"),
        total_dwell_hours: row.get("total_dwell_hours"),
        last_visit: row.get("last_visit"),
    }
}
