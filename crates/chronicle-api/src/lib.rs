//! # chronicle-api
//!
//! HTTP API surface for chronicle: authentication, request validation,
//! dispatch into the query planner and the store, and response
//! serialization including the NDJSON streaming export.

use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{
        rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request, State,
    },
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use futures::{stream, StreamExt};
use serde::Deserialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use chronicle_core::{
    defaults, BatchOutcome, BboxQueryRequest, Entity, EntityInput, Error, ExportOrder,
    QueryResponse, RenameOutcome, TimeQueryRequest, TimeWindow, UpdatePlaceRequest,
    UpsertOutcome,
};
use chronicle_db::Database;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs, so request ids
/// sort chronologically in aggregated logs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database context with all repositories.
    pub db: Database,
    /// Shared secret checked against the `X-API-Key` header.
    pub api_key: String,
    /// Server start, for the stats uptime figure.
    pub started_at: Instant,
}

impl AppState {
    /// Create state over a connected database.
    pub fn new(db: Database, api_key: impl Into<String>) -> Self {
        Self {
            db,
            api_key: api_key.into(),
            started_at: Instant::now(),
        }
    }
}

// =============================================================================
// AUTH
// =============================================================================

/// Extractor that enforces the shared-secret header.
///
/// Every authenticated endpoint takes this extractor first; a missing or
/// mismatched key is rejected with 401 before any planner or store work.
#[derive(Debug, Clone, Copy)]
pub struct RequireApiKey;

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok());
        match presented {
            None => Err(ApiError::Unauthorized("Missing API key".into())),
            Some(key) if key == state.api_key => Ok(RequireApiKey),
            Some(_) => Err(ApiError::Unauthorized("Invalid API key".into())),
        }
    }
}

// =============================================================================
// BODY EXTRACTION
// =============================================================================

/// `axum::Json` with rejections reshaped into the `{"detail"}` error body
/// every other error path uses.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the application router over the given state.
pub fn app(state: AppState) -> Router {
    Router::new()
        // Liveness and store-wide figures, unauthenticated.
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        // Entities
        .route("/v1/entity", post(upsert_entity))
        .route("/v1/entities/batch", post(upsert_batch))
        // Queries
        .route("/v1/query/time", post(query_time))
        .route("/v1/query/bbox", post(query_bbox))
        .route("/v1/query/export", get(export_entities))
        // Places
        .route("/v1/places", get(list_places))
        .route("/v1/places/:id", get(get_place).patch(update_place))
        .route("/v1/visits", delete(delete_visits))
        .layer(TraceLayer::new_for_http())
        // Gzip negotiation via Accept-Encoding, mainly for the export.
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_SIZE_BYTES))
        // Single-user server behind a shared secret; origins stay open so
        // local viewers can talk to it directly.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .with_state(state)
}

// =============================================================================
// SYSTEM HANDLERS
// =============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let uptime = state.started_at.elapsed().as_secs();
    let stats = state.db.entities.stats(uptime).await?;
    Ok(Json(stats))
}

// =============================================================================
// ENTITY HANDLERS
// =============================================================================

async fn upsert_entity(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<EntityInput>,
) -> Result<Json<UpsertOutcome>, ApiError> {
    input.validate()?;
    let outcome = state.db.entities.upsert(input).await?;
    Ok(Json(outcome))
}

async fn upsert_batch(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    ApiJson(inputs): ApiJson<Vec<EntityInput>>,
) -> Result<Json<BatchOutcome>, ApiError> {
    if inputs.len() > defaults::BATCH_MAX_ENTITIES {
        return Err(ApiError::BadRequest(format!(
            "maximum {} entities per batch",
            defaults::BATCH_MAX_ENTITIES
        )));
    }
    for input in &inputs {
        input.validate()?;
    }
    let outcome = state.db.entities.upsert_batch(inputs).await?;
    Ok(Json(outcome))
}

// =============================================================================
// QUERY HANDLERS
// =============================================================================

async fn query_time(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TimeQueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    req.validate()?;
    let entities = match &req.resample {
        Some(resample) => {
            with_query_budget(state.db.entities.resample(
                &req.types,
                req.start,
                req.end,
                resample.n,
            ))
            .await?
        }
        None => with_query_budget(state.db.entities.query_time(&req)).await?,
    };
    Ok(Json(QueryResponse { entities }))
}

async fn query_bbox(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<BboxQueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    req.validate()?;
    let entities = with_query_budget(state.db.entities.query_bbox(&req)).await?;
    Ok(Json(QueryResponse { entities }))
}

/// Enforce the per-endpoint wall-clock budget around a planner call.
async fn with_query_budget<T>(
    fut: impl std::future::Future<Output = chronicle_core::Result<T>>,
) -> Result<T, ApiError> {
    let budget = Duration::from_secs(defaults::QUERY_TIMEOUT_SECS);
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ApiError::Timeout(format!(
            "query exceeded its {}s budget",
            defaults::QUERY_TIMEOUT_SECS
        ))),
    }
}

// =============================================================================
// EXPORT
// =============================================================================

#[derive(Debug, Deserialize)]
struct ExportParams {
    /// Comma-separated entity types; omit for all types.
    types: Option<String>,
    #[serde(default)]
    order: ExportOrder,
}

impl ExportParams {
    fn types(&self) -> Option<Vec<String>> {
        let types: Vec<String> = self
            .types
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        (!types.is_empty()).then_some(types)
    }
}

/// Stream every entity as NDJSON: a `{"total": N}` metadata line followed
/// by one entity per line. The body is fed from a server-side cursor over
/// a bounded channel, so memory stays constant for any table size; client
/// disconnect drops the receiver, which closes the cursor.
async fn export_entities(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let (total, entities) = state
        .db
        .entities
        .stream_export(params.types(), params.order)
        .await?;

    let meta = serde_json::to_vec(&serde_json::json!({ "total": total }))
        .map_err(|e| ApiError::from(Error::from(e)))?;
    let first = stream::once(async move { Ok::<_, Error>(ndjson_line(meta)) });
    let rows = entities.map(|item| {
        item.and_then(|entity: Entity| {
            serde_json::to_vec(&entity)
                .map(ndjson_line)
                .map_err(Error::from)
        })
    });

    let body = Body::from_stream(first.chain(rows));
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-ndjson"),
            ),
            (
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
        ],
        body,
    )
        .into_response())
}

fn ndjson_line(mut bytes: Vec<u8>) -> Bytes {
    bytes.push(b'\n');
    Bytes::from(bytes)
}

// =============================================================================
// PLACE HANDLERS
// =============================================================================

async fn list_places(
    _auth: RequireApiKey,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let places = state.db.places.list().await?;
    Ok(Json(serde_json::json!({ "places": places })))
}

async fn get_place(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.db.places.get(id).await?;
    Ok(Json(detail))
}

async fn update_place(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdatePlaceRequest>,
) -> Result<Json<RenameOutcome>, ApiError> {
    req.validate()?;
    let outcome = state.db.places.rename(id, &req).await?;
    Ok(Json(outcome))
}

// =============================================================================
// VISIT DELETION
// =============================================================================

#[derive(Debug, Deserialize)]
struct DeleteVisitsParams {
    confirm: Option<String>,
    start: Option<chrono::DateTime<chrono::Utc>>,
    end: Option<chrono::DateTime<chrono::Utc>>,
}

async fn delete_visits(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Query(params): Query<DeleteVisitsParams>,
) -> Result<impl IntoResponse, ApiError> {
    if params.confirm.as_deref() != Some("yes") {
        return Err(ApiError::BadRequest(
            "bulk visit deletion requires confirm=yes".into(),
        ));
    }
    let window = match (params.start, params.end) {
        (Some(start), Some(end)) => {
            let window = TimeWindow { start, end };
            window.validate()?;
            Some(window)
        }
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(
                "start and end must both be provided or both be omitted".into(),
            ));
        }
    };
    let deleted = state.db.entities.delete_visits(window).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

/// Transport-facing error: every failure serializes as
/// `{"detail": "<message>"}` with the appropriate HTTP status.
#[derive(Debug)]
pub enum ApiError {
    Internal(Error),
    Unauthorized(String),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Timeout(String),
    Unavailable(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::PlaceNotFound(id) => ApiError::NotFound(format!("place {id}")),
            Error::Validation(msg) => ApiError::BadRequest(msg),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::Timeout(msg) => ApiError::Timeout(msg),
            Error::Unavailable(msg) => ApiError::Unavailable(msg),
            Error::Database(sqlx::Error::PoolTimedOut) => {
                ApiError::Unavailable("connection pool exhausted".into())
            }
            Error::Database(sqlx::Error::PoolClosed) => {
                ApiError::Unavailable("connection pool closed".into())
            }
            Error::Database(sqlx::Error::Io(e)) => {
                ApiError::Unavailable(format!("database connection lost: {e}"))
            }
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Internal(err) => {
                warn!(
                    subsystem = "api",
                    component = "error",
                    error = %err,
                    "Request failed"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, format!("Not found: {msg}")),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Timeout(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(serde_json::json!({ "detail": detail }));
        (status, body).into_response()
    }
}

// =============================================================================
// STARTUP LOGGING
// =============================================================================

/// Log the route table once at startup.
pub fn log_routes() {
    info!(
        subsystem = "api",
        component = "router",
        "Routes: /health /stats /v1/entity /v1/entities/batch /v1/query/time \
         /v1/query/bbox /v1/query/export /v1/places /v1/places/:id /v1/visits"
    );
}
