//! HTTP request handlers: JSON query endpoints, CSV export, and frontend serving.

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderName, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use rust_embed::Embed;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::OpenApi;

use netmon_core::export::render_csv;
use netmon_core::fmt::{FmtStyle, format_bytes};
use netmon_core::model::{BandwidthSample, ConnectivitySample, HourBucket};
use netmon_core::store::{Store, StoreError, StoreResult};
use netmon_core::timestamp::Timestamp;

use crate::cache::CachedBody;
use crate::openapi::ApiDoc;
use crate::state::AppState;

// ============================================================
// Embedded frontend assets
// ============================================================

#[derive(Embed)]
#[folder = "frontend"]
struct FrontendAssets;

// ============================================================
// Errors and response helpers
// ============================================================

const NO_CACHE: [(HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

/// Window used when a range request names no bounds.
pub(crate) const DEFAULT_WINDOW_HOURS: f64 = 24.0;

/// Largest accepted `hours` value (ten years).
const MAX_WINDOW_HOURS: f64 = 24.0 * 366.0 * 10.0;

/// Error returned to one request; rendered as `{"error": "..."}`.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ApiError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        error!(error = %e, "store query failed");
        Self::internal(format!("database error: {}", e))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        error!(error = %e, "query task panicked");
        Self::internal("internal error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_client_error() {
            debug!(status = self.status.as_u16(), message = %self.message, "rejected request");
        }
        let body = serde_json::json!({ "error": self.message });
        (self.status, NO_CACHE, Json(body)).into_response()
    }
}

fn json_no_cache<T: Serialize>(value: T) -> Response {
    (NO_CACHE, Json(value)).into_response()
}

/// Runs a store call on the blocking pool.
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Store) -> StoreResult<T> + Send + 'static,
{
    let store = state.store.clone();
    Ok(tokio::task::spawn_blocking(move || f(&store)).await??)
}

// ============================================================
// Time window resolution
// ============================================================

/// Either an explicit `[start_time, end_time]` or the last `hours` hours.
/// With neither, the last 24 hours.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct RangeQuery {
    /// Window start, `YYYY-MM-DD HH:MM:SS` (UTC). Requires `end_time`.
    start_time: Option<String>,
    /// Window end, inclusive. Requires `start_time`.
    end_time: Option<String>,
    /// Window length ending now, in hours. Exclusive with the explicit bounds.
    hours: Option<String>,
}

/// `Query<RangeQuery>` whose rejections use the JSON error body.
pub(crate) struct RangeParams(pub(crate) RangeQuery);

impl<S: Send + Sync> FromRequestParts<S> for RangeParams {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<RangeQuery>::from_request_parts(parts, state)
            .await
            .map(|Query(query)| RangeParams(query))
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
    }
}

fn parse_timestamp(name: &str, value: &str) -> Result<Timestamp, ApiError> {
    value
        .parse::<Timestamp>()
        .map_err(|e| ApiError::bad_request(format!("{}: {}", name, e)))
}

fn parse_hours(value: &str) -> Result<f64, ApiError> {
    let hours: f64 = value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("hours: '{}' is not a number", value)))?;
    if !hours.is_finite() || hours <= 0.0 || hours > MAX_WINDOW_HOURS {
        return Err(ApiError::bad_request(format!(
            "hours: must be in (0, {}]",
            MAX_WINDOW_HOURS
        )));
    }
    Ok(hours)
}

/// Turns query parameters into a concrete inclusive window ending at or before `now`.
pub(crate) fn resolve_window(
    query: &RangeQuery,
    now: Timestamp,
) -> Result<(Timestamp, Timestamp), ApiError> {
    match (
        query.start_time.as_deref(),
        query.end_time.as_deref(),
        query.hours.as_deref(),
    ) {
        (None, None, None) => Ok((now.hours_before(DEFAULT_WINDOW_HOURS), now)),
        (None, None, Some(hours)) => Ok((now.hours_before(parse_hours(hours)?), now)),
        (Some(start), Some(end), None) => {
            let start = parse_timestamp("start_time", start)?;
            let end = parse_timestamp("end_time", end)?;
            if start > end {
                return Err(ApiError::bad_request("start_time is after end_time"));
            }
            Ok((start, end))
        }
        (_, _, Some(_)) => Err(ApiError::bad_request(
            "hours cannot be combined with start_time/end_time",
        )),
        _ => Err(ApiError::bad_request(
            "start_time and end_time must be given together",
        )),
    }
}

// ============================================================
// Health
// ============================================================

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    )
)]
pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

// ============================================================
// Connectivity
// ============================================================

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub(crate) struct EarliestRecord {
    #[schema(value_type = String, example = "2026-02-07 17:00:00")]
    timestamp: Timestamp,
}

#[utoipa::path(
    get,
    path = "/api/connectivity",
    params(RangeQuery),
    responses(
        (status = 200, description = "Connectivity rows in the window, oldest first", body = [ConnectivitySample]),
        (status = 400, description = "Malformed or inconsistent window parameters"),
        (status = 500, description = "Store failure")
    )
)]
pub(crate) async fn handle_connectivity(
    State(state): State<AppState>,
    RangeParams(query): RangeParams,
) -> Result<Response, ApiError> {
    let (start, end) = resolve_window(&query, Timestamp::now())?;
    let rows = with_store(&state, move |s| s.query_connectivity(start, end)).await?;
    Ok(json_no_cache(rows))
}

#[utoipa::path(
    get,
    path = "/api/connectivity/earliest",
    responses(
        (status = 200, description = "Timestamp of the oldest row, or null when empty", body = EarliestRecord)
    )
)]
pub(crate) async fn handle_connectivity_earliest(
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let row = with_store(&state, |s| s.earliest_connectivity()).await?;
    Ok(json_no_cache(row.map(|r| EarliestRecord {
        timestamp: r.timestamp,
    })))
}

#[utoipa::path(
    get,
    path = "/api/connectivity/latest",
    responses(
        (status = 200, description = "Most recent row, or null when empty", body = ConnectivitySample)
    )
)]
pub(crate) async fn handle_connectivity_latest(
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let row = with_store(&state, |s| s.latest_connectivity()).await?;
    Ok(json_no_cache(row))
}

#[utoipa::path(
    get,
    path = "/api/connectivity/hours",
    responses(
        (status = 200, description = "Clock hours holding data, newest first", body = [HourBucket])
    )
)]
pub(crate) async fn handle_connectivity_hours(
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let hours = with_store(&state, |s| s.available_hours()).await?;
    Ok(json_no_cache(hours))
}

// ============================================================
// Bandwidth
// ============================================================

#[utoipa::path(
    get,
    path = "/api/bandwidth",
    params(RangeQuery),
    responses(
        (status = 200, description = "Bandwidth rows in the window, oldest first", body = [BandwidthSample]),
        (status = 400, description = "Malformed or inconsistent window parameters"),
        (status = 500, description = "Store failure")
    )
)]
pub(crate) async fn handle_bandwidth(
    State(state): State<AppState>,
    RangeParams(query): RangeParams,
) -> Result<Response, ApiError> {
    let (start, end) = resolve_window(&query, Timestamp::now())?;
    let rows = with_store(&state, move |s| s.query_bandwidth(start, end)).await?;
    Ok(json_no_cache(rows))
}

#[utoipa::path(
    get,
    path = "/api/bandwidth/earliest",
    responses(
        (status = 200, description = "Timestamp of the oldest row, or null when empty", body = EarliestRecord)
    )
)]
pub(crate) async fn handle_bandwidth_earliest(
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let row = with_store(&state, |s| s.earliest_bandwidth()).await?;
    Ok(json_no_cache(row.map(|r| EarliestRecord {
        timestamp: r.timestamp,
    })))
}

#[utoipa::path(
    get,
    path = "/api/bandwidth/latest",
    responses(
        (status = 200, description = "Most recent row, or null when empty", body = BandwidthSample)
    )
)]
pub(crate) async fn handle_bandwidth_latest(
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let row = with_store(&state, |s| s.latest_bandwidth()).await?;
    Ok(json_no_cache(row))
}

// ============================================================
// Stats
// ============================================================

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub(crate) struct StatsResponse {
    size_bytes: u64,
    /// Human-readable `size_bytes`.
    size: String,
    connectivity_count: u64,
    bandwidth_count: u64,
}

#[utoipa::path(
    get,
    path = "/api/stats",
    responses(
        (status = 200, description = "Database size and row counts", body = StatsResponse)
    )
)]
pub(crate) async fn handle_stats(State(state): State<AppState>) -> Result<Response, ApiError> {
    let (size_bytes, counts) =
        with_store(&state, |s| Ok((s.storage_size_bytes()?, s.row_counts()?))).await?;
    Ok(json_no_cache(StatsResponse {
        size_bytes,
        size: format_bytes(size_bytes, FmtStyle::Detail),
        connectivity_count: counts.connectivity,
        bandwidth_count: counts.bandwidth,
    }))
}

// ============================================================
// CSV export
// ============================================================

fn file_stamp(ts: Timestamp) -> String {
    ts.to_string().replace(' ', "_").replace(':', "")
}

fn csv_response(body: String, filename: &str) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    (
        NO_CACHE,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/csv",
    params(RangeQuery),
    responses(
        (status = 200, description = "Connectivity rows as delimited text; header only when empty", content_type = "text/csv", body = String),
        (status = 400, description = "Malformed or inconsistent window parameters")
    )
)]
pub(crate) async fn handle_csv(
    State(state): State<AppState>,
    RangeParams(query): RangeParams,
) -> Result<Response, ApiError> {
    let (start, end) = resolve_window(&query, Timestamp::now())?;
    let rows = with_store(&state, move |s| s.query_connectivity(start, end)).await?;
    let filename = format!("network_log_{}_{}.csv", file_stamp(start), file_stamp(end));
    Ok(csv_response(render_csv(&rows), &filename))
}

#[utoipa::path(
    get,
    path = "/csv/{date}/{hour}",
    params(
        ("date" = String, Path, description = "Day, YYYY-MM-DD"),
        ("hour" = u32, Path, description = "Hour of day, 0-23")
    ),
    responses(
        (status = 200, description = "One clock hour of connectivity rows as delimited text", content_type = "text/csv", body = String),
        (status = 400, description = "Invalid date or hour")
    )
)]
pub(crate) async fn handle_csv_hour(
    State(state): State<AppState>,
    Path((date, hour)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let hour: u32 = hour
        .trim()
        .parse()
        .ok()
        .filter(|h| *h < 24)
        .ok_or_else(|| ApiError::bad_request(format!("hour: '{}' is not in 0-23", hour)))?;
    let date = date.trim();
    let start = parse_timestamp("date", &format!("{} {:02}:00:00", date, hour))?;
    let end = parse_timestamp("date", &format!("{} {:02}:59:59", date, hour))?;

    let rows = with_store(&state, move |s| s.query_connectivity(start, end)).await?;
    let filename = format!("network_log_{}_{:02}.csv", date, hour);
    Ok(csv_response(render_csv(&rows), &filename))
}

// ============================================================
// OpenAPI document
// ============================================================

pub(crate) async fn handle_openapi(State(state): State<AppState>) -> Response {
    let doc = state.cache.get_or_render("/api-docs/openapi.json", || {
        ApiDoc::openapi().to_json().ok().map(|json| CachedBody {
            content_type: "application/json".to_string(),
            body: Bytes::from(json),
        })
    });
    match doc {
        Some(doc) => cached_response(doc),
        None => ApiError::internal("failed to render OpenAPI document").into_response(),
    }
}

// ============================================================
// Frontend
// ============================================================

fn cached_response(cached: CachedBody) -> Response {
    ([(header::CONTENT_TYPE, cached.content_type)], Body::from(cached.body)).into_response()
}

fn embedded(path: &str) -> Option<CachedBody> {
    FrontendAssets::get(path).map(|file| CachedBody {
        content_type: mime_guess::from_path(path)
            .first_or_octet_stream()
            .as_ref()
            .to_string(),
        body: Bytes::from(file.data.into_owned()),
    })
}

pub(crate) async fn serve_frontend(State(state): State<AppState>, uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    if path.starts_with("api/") {
        return ApiError::not_found(format!("no such endpoint: /{}", path)).into_response();
    }

    // Exact file match first, then the dashboard shell for everything else.
    let asset = if path.is_empty() { "index.html" } else { path };
    let cache = &state.cache;
    if let Some(file) = cache.get_or_render(asset, || embedded(asset)) {
        return cached_response(file);
    }
    if let Some(index) = cache.get_or_render("index.html", || embedded("index.html")) {
        return cached_response(index);
    }

    (StatusCode::NOT_FOUND, "not found").into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::Router;
    use axum::http::Request;
    use netmon_core::model::{NewBandwidthSample, NewConnectivitySample, Status};
    use netmon_core::store::StoreConfig;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::cache::ResponseCache;
    use crate::notifier::Notifier;

    fn setup() -> (TempDir, Arc<Store>, Router) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            Store::open_with(StoreConfig::new(dir.path().join("net.db")).with_read_connections(2))
                .unwrap(),
        );
        let state = AppState::new(
            store.clone(),
            Arc::new(Notifier::new()),
            Arc::new(ResponseCache::new(Duration::from_secs(30))),
        );
        (dir, store, crate::build_router(state))
    }

    fn conn(ts: &str, rt: Option<f64>) -> NewConnectivitySample {
        let success = if rt.is_some() { 5 } else { 0 };
        NewConnectivitySample {
            timestamp: ts.parse().unwrap(),
            status: if rt.is_some() {
                Status::Connected
            } else {
                Status::Disconnected
            },
            response_time: rt,
            success_count: success,
            total_count: 5,
            failed_count: 5 - success,
        }
    }

    fn bw(ts: Timestamp) -> NewBandwidthSample {
        NewBandwidthSample {
            timestamp: ts,
            download_mbps: 94.27,
            upload_mbps: 11.03,
            ping_ms: Some(8.1),
            server_host: Some("speed.example.net:8080".into()),
            server_name: Some("Example".into()),
            server_country: Some("NL".into()),
        }
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Bytes) {
        let resp = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body)
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = get(app, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health() {
        let (_dir, _store, app) = setup();
        let (status, _, body) = get(&app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn connectivity_range_is_inclusive_and_ordered() {
        let (_dir, store, app) = setup();
        for (ts, rt) in [
            ("2026-02-07 17:00:10", Some(12.0)),
            ("2026-02-07 17:00:00", Some(10.0)),
            ("2026-02-07 17:00:05", None),
            ("2026-02-07 17:00:20", Some(11.0)),
        ] {
            store.insert_connectivity(&conn(ts, rt)).unwrap();
        }

        let (status, headers, body) = get(
            &app,
            "/api/connectivity?start_time=2026-02-07%2017:00:00&end_time=2026-02-07%2017:00:10",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "no-cache, no-store, must-revalidate"
        );

        let rows: Vec<Value> = serde_json::from_slice(&body).unwrap();
        let stamps: Vec<&str> = rows.iter().map(|r| r["timestamp"].as_str().unwrap()).collect();
        assert_eq!(
            stamps,
            ["2026-02-07 17:00:00", "2026-02-07 17:00:05", "2026-02-07 17:00:10"]
        );
        assert_eq!(rows[1]["status"], "DISCONNECTED");
        assert!(rows[1]["response_time"].is_null());
        assert_eq!(rows[0]["success_count"], 5);
    }

    #[tokio::test]
    async fn empty_window_is_empty_array() {
        let (_dir, _store, app) = setup();
        let (status, json) = get_json(
            &app,
            "/api/connectivity?start_time=2020-01-01T00:00:00&end_time=2020-01-02T00:00:00",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!([]));
    }

    #[tokio::test]
    async fn malformed_windows_are_rejected() {
        let (_dir, _store, app) = setup();
        for uri in [
            "/api/connectivity?start_time=yesterday&end_time=2026-02-07%2017:00:00",
            "/api/connectivity?start_time=2026-02-08%2000:00:00&end_time=2026-02-07%2000:00:00",
            "/api/connectivity?start_time=2026-02-07%2000:00:00",
            "/api/bandwidth?end_time=2026-02-07%2000:00:00",
            "/api/bandwidth?hours=abc",
            "/api/bandwidth?hours=-1",
            "/api/bandwidth?hours=0",
            "/api/bandwidth?hours=1&start_time=2026-02-07%2000:00:00",
            "/csv?start_time=2026-02-07&end_time=2026-02-08",
            "/api/connectivity?start_time=2026-02-07%2000:00:00&start_time=2026-02-07%2001:00:00&end_time=2026-02-08%2000:00:00",
            "/csv?hours=1&hours=2",
        ] {
            let (status, json) = get_json(&app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(json["error"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn hours_window_ends_now() {
        let (_dir, store, app) = setup();
        let now = Timestamp::now();
        store.insert_bandwidth(&bw(now.hours_before(0.5))).unwrap();
        store.insert_bandwidth(&bw(now.hours_before(3.0))).unwrap();
        store.insert_bandwidth(&bw(now.hours_before(30.0))).unwrap();

        let (_, json) = get_json(&app, "/api/bandwidth?hours=1").await;
        assert_eq!(json.as_array().unwrap().len(), 1);

        // No parameters: last 24 hours.
        let (_, json) = get_json(&app, "/api/bandwidth").await;
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["download_mbps"], 94.27);
        assert_eq!(rows[0]["server_country"], "NL");
    }

    #[tokio::test]
    async fn earliest_and_latest() {
        let (_dir, store, app) = setup();
        for uri in [
            "/api/connectivity/earliest",
            "/api/connectivity/latest",
            "/api/bandwidth/earliest",
            "/api/bandwidth/latest",
        ] {
            let (status, json) = get_json(&app, uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert!(json.is_null(), "{uri}");
        }

        store
            .insert_connectivity(&conn("2026-02-07 17:00:00", Some(1.0)))
            .unwrap();
        store
            .insert_connectivity(&conn("2026-02-06 09:30:00", None))
            .unwrap();
        store
            .insert_bandwidth(&bw("2026-02-07 18:00:00".parse().unwrap()))
            .unwrap();

        let (_, json) = get_json(&app, "/api/connectivity/earliest").await;
        assert_eq!(json, serde_json::json!({"timestamp": "2026-02-06 09:30:00"}));
        let (_, json) = get_json(&app, "/api/connectivity/latest").await;
        assert_eq!(json["timestamp"], "2026-02-07 17:00:00");
        assert_eq!(json["status"], "CONNECTED");
        let (_, json) = get_json(&app, "/api/bandwidth/earliest").await;
        assert_eq!(json, serde_json::json!({"timestamp": "2026-02-07 18:00:00"}));
        let (_, json) = get_json(&app, "/api/bandwidth/latest").await;
        assert_eq!(json["server_host"], "speed.example.net:8080");
        assert_eq!(json["ping_ms"], 8.1);
    }

    #[tokio::test]
    async fn hours_index() {
        let (_dir, store, app) = setup();
        for ts in [
            "2026-02-07 17:00:00",
            "2026-02-07 17:30:00",
            "2026-02-07 18:05:00",
        ] {
            store.insert_connectivity(&conn(ts, Some(1.0))).unwrap();
        }
        let (_, json) = get_json(&app, "/api/connectivity/hours").await;
        assert_eq!(
            json,
            serde_json::json!([
                {"date": "2026-02-07", "hour": 18, "count": 1},
                {"date": "2026-02-07", "hour": 17, "count": 2},
            ])
        );
    }

    #[tokio::test]
    async fn stats() {
        let (_dir, store, app) = setup();
        store
            .insert_connectivity(&conn("2026-02-07 17:00:00", Some(1.0)))
            .unwrap();
        store.insert_bandwidth(&bw(Timestamp::now())).unwrap();
        store.insert_bandwidth(&bw(Timestamp::now())).unwrap();

        let (status, json) = get_json(&app, "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["connectivity_count"], 1);
        assert_eq!(json["bandwidth_count"], 2);
        assert!(json["size_bytes"].as_u64().unwrap() > 0);
        assert!(json["size"].as_str().unwrap().ends_with("KiB"));
    }

    #[tokio::test]
    async fn csv_range_export() {
        let (_dir, store, app) = setup();
        store
            .insert_connectivity(&conn("2026-02-07 17:00:00", Some(12.3456)))
            .unwrap();
        store
            .insert_connectivity(&conn("2026-02-07 17:00:05", None))
            .unwrap();

        let (status, headers, body) = get(
            &app,
            "/csv?start_time=2026-02-07%2017:00:00&end_time=2026-02-07%2017:59:59",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            headers[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/csv")
        );
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"network_log_2026-02-07_170000_2026-02-07_175959.csv\""
        );
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            "timestamp, status, response_time, success_count, total_count, failed_count\n\
             2026-02-07 17:00:00, CONNECTED, 12.346, 5, 5, 0\n\
             2026-02-07 17:00:05, DISCONNECTED, null, 0, 5, 5"
        );
    }

    #[tokio::test]
    async fn csv_empty_range_is_header_only() {
        let (_dir, _store, app) = setup();
        let (status, _, body) = get(
            &app,
            "/csv?start_time=2020-01-01%2000:00:00&end_time=2020-01-01%2001:00:00",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], netmon_core::export::CSV_HEADER.as_bytes());
    }

    #[tokio::test]
    async fn csv_hour_export() {
        let (_dir, store, app) = setup();
        for ts in [
            "2026-02-07 16:59:59",
            "2026-02-07 17:00:00",
            "2026-02-07 17:59:59",
            "2026-02-07 18:00:00",
        ] {
            store.insert_connectivity(&conn(ts, Some(1.0))).unwrap();
        }

        let (status, _, body) = get(&app, "/csv/2026-02-07/17").await;
        assert_eq!(status, StatusCode::OK);
        let rows = netmon_core::export::parse_csv(std::str::from_utf8(&body).unwrap()).unwrap();
        let stamps: Vec<String> = rows.iter().map(|r| r.timestamp.to_string()).collect();
        assert_eq!(stamps, ["2026-02-07 17:00:00", "2026-02-07 17:59:59"]);

        for uri in ["/csv/2026-02-07/24", "/csv/2026-02-07/x", "/csv/2026-02-30/01"] {
            let (status, _) = get_json(&app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn frontend_and_openapi() {
        let (_dir, _store, app) = setup();

        let (status, headers, body) = get(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
        assert!(std::str::from_utf8(&body).unwrap().contains("WebSocket"));

        // Client-side routes fall back to the shell.
        let (status, _, _) = get(&app, "/history").await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = get_json(&app, "/api/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].is_string());

        let (status, json) = get_json(&app, "/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["paths"]["/api/connectivity"].is_object());
        assert!(json["paths"]["/csv/{date}/{hour}"].is_object());
    }

    #[test]
    fn window_resolution() {
        let now: Timestamp = "2026-02-07 17:00:00".parse().unwrap();
        let q = RangeQuery::default();
        assert_eq!(
            resolve_window(&q, now).unwrap(),
            ("2026-02-06 17:00:00".parse().unwrap(), now)
        );

        let q = RangeQuery {
            hours: Some("1.5".into()),
            ..Default::default()
        };
        assert_eq!(
            resolve_window(&q, now).unwrap().0,
            "2026-02-07 15:30:00".parse().unwrap()
        );

        let q = RangeQuery {
            start_time: Some("2026-02-07 12:00:00".into()),
            end_time: Some("2026-02-07 12:00:00".into()),
            hours: None,
        };
        let (s, e) = resolve_window(&q, now).unwrap();
        assert_eq!(s, e);

        let q = RangeQuery {
            hours: Some("NaN".into()),
            ..Default::default()
        };
        assert_eq!(
            resolve_window(&q, now).unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
    }
}
