// Vehicle History - Web Server
// REST API with Axum: plate in, normalized history summary / vehicle profile out

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vehicle_history::{
    init_tracing, normalize_plate, normalize_vehicle, summarize_history, CkanClient, HistoryBundle,
    HistoryError, HistorySummary, RawRecord, ServerConfig, SpecMatch, VehicleProfile,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    client: CkanClient,
    config: Arc<ServerConfig>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ApiError>,
}

#[derive(Serialize)]
struct ApiError {
    kind: String,
    message: String,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(kind: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                kind: kind.to_string(),
                message: message.into(),
            }),
        }
    }
}

/// History response body
#[derive(Serialize)]
struct HistoryResponse {
    plate: String,
    summary: HistorySummary,
    /// Upstream records as fetched, debug mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<RawHistory>,
}

#[derive(Serialize)]
struct RawHistory {
    mileage: Vec<RawRecord>,
    ownership: Vec<RawRecord>,
}

/// Vehicle response body
#[derive(Serialize)]
struct VehicleResponse {
    plate: String,
    vehicle: VehicleProfile,
    /// Registry row and model-spec lookup outcome, debug mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<RawVehicle>,
}

#[derive(Serialize)]
struct RawVehicle {
    record: RawRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    specs: Option<SpecMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    specs_error: Option<String>,
}

/// Outcome of the model-spec fallback; a failed search never fails the request
#[derive(Default)]
struct SpecsLookup {
    matched: Option<SpecMatch>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct PlateQuery {
    plate: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok(vehicle_history::VERSION))
}

/// GET /api/history/:plate
async fn history_by_path(State(state): State<AppState>, Path(plate): Path<String>) -> Response {
    lookup_history(&state, &plate).await
}

/// GET /api/history?plate=1234567
async fn history_by_query(State(state): State<AppState>, Query(query): Query<PlateQuery>) -> Response {
    match query.plate {
        Some(plate) => lookup_history(&state, &plate).await,
        None => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<HistoryResponse>::err("missing_plate", "missing query parameter: plate")),
        )
            .into_response(),
    }
}

/// Shared handler for both history routes
async fn lookup_history(state: &AppState, input: &str) -> Response {
    let plate = match normalize_plate(input) {
        Ok(plate) => plate,
        Err(e) => return error_response(&e),
    };

    let bundle = match state.client.fetch_history(&plate).await {
        Ok(bundle) => bundle,
        Err(e) => return error_response(&e),
    };

    let body = build_response(plate, bundle, &state.config);
    (StatusCode::OK, Json(ApiResponse::ok(body))).into_response()
}

fn build_response(plate: String, bundle: HistoryBundle, config: &ServerConfig) -> HistoryResponse {
    let summary = summarize_history(&bundle.mileage, &bundle.ownership, &config.engine);

    tracing::info!(
        plate = %plate,
        mileage_points = summary.mileage_count,
        ownerships = summary.ownership_count,
        "history served"
    );

    let raw = config.engine.debug.then(|| RawHistory {
        mileage: bundle.mileage,
        ownership: bundle.ownership,
    });

    HistoryResponse { plate, summary, raw }
}

/// GET /api/vehicle/:plate
async fn vehicle_by_path(State(state): State<AppState>, Path(plate): Path<String>) -> Response {
    lookup_vehicle(&state, &plate).await
}

/// GET /api/vehicle?plate=1234567
async fn vehicle_by_query(State(state): State<AppState>, Query(query): Query<PlateQuery>) -> Response {
    match query.plate {
        Some(plate) => lookup_vehicle(&state, &plate).await,
        None => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<VehicleResponse>::err("missing_plate", "missing query parameter: plate")),
        )
            .into_response(),
    }
}

/// Shared handler for both vehicle routes
async fn lookup_vehicle(state: &AppState, input: &str) -> Response {
    let plate = match normalize_plate(input) {
        Ok(plate) => plate,
        Err(e) => return error_response(&e),
    };

    let record = match state.client.fetch_vehicle(&plate).await {
        Ok(Some(record)) => record,
        Ok(None) => return error_response(&HistoryError::VehicleNotFound { plate }),
        Err(e) => return error_response(&e),
    };

    let mut specs = SpecsLookup::default();
    if normalize_vehicle(&record).needs_specs() {
        match state.client.fetch_model_specs(&record).await {
            Ok(matched) => specs.matched = matched,
            Err(e) => {
                tracing::warn!(plate = %plate, error = %e, "model specs lookup failed, serving registry data");
                specs.error = Some(e.to_string());
            }
        }
    }

    let body = build_vehicle_response(plate, record, specs, &state.config);
    (StatusCode::OK, Json(ApiResponse::ok(body))).into_response()
}

fn build_vehicle_response(
    plate: String,
    record: RawRecord,
    specs: SpecsLookup,
    config: &ServerConfig,
) -> VehicleResponse {
    let mut vehicle = normalize_vehicle(&record);
    if let Some(matched) = &specs.matched {
        vehicle.enrich(&matched.extract);
    }

    tracing::info!(
        plate = %plate,
        engine_cc = ?vehicle.engine_cc,
        horsepower = ?vehicle.horsepower,
        "vehicle served"
    );

    let raw = config.engine.debug.then(|| RawVehicle {
        record,
        specs: specs.matched,
        specs_error: specs.error,
    });

    VehicleResponse { plate, vehicle, raw }
}

fn error_status(err: &HistoryError) -> StatusCode {
    match err {
        HistoryError::InvalidPlate { .. } => StatusCode::BAD_REQUEST,
        HistoryError::VehicleNotFound { .. } => StatusCode::NOT_FOUND,
        HistoryError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn error_response(err: &HistoryError) -> Response {
    (
        error_status(err),
        Json(ApiResponse::<HistoryResponse>::err(err.kind(), err.to_string())),
    )
        .into_response()
}

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/history", get(history_by_query))
        .route("/history/:plate", get(history_by_path))
        .route("/vehicle", get(vehicle_by_query))
        .route("/vehicle/:plate", get(vehicle_by_path))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env();
    init_tracing(config.engine.debug);

    let client = CkanClient::new(&config).context("Failed to build upstream client")?;
    let addr = config.bind_addr();

    tracing::info!(
        datastore = %config.datastore_url,
        mileage_resources = ?config.mileage_resources,
        ownership_resource = %config.ownership_resource,
        vehicle_resource = %config.vehicle_resource,
        debug = config.engine.debug,
        "vehicle history server starting"
    );

    let state = AppState {
        client,
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("🚀 listening on http://{}", addr);

    axum::serve(listener, app(state))
        .await
        .context("Server error")?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
