//! REST surface: a thin axum router over [`FleetService`].
//!
//! Error classes map onto status codes: validation → 400, unknown id → 404,
//! upstream failures → 502, everything else → 500, all with a JSON message
//! body.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use fleet_core::directions::Directions;
use fleet_core::trip::{CrissCrossPlan, TripPlan};
use fleet_core::vehicle::Vehicle;

use crate::error::ServiceError;
use crate::service::{FleetService, VehiclePage};

pub fn router(service: Arc<FleetService>) -> Router {
    Router::new()
        .route("/api/vehicle/create-new", post(create_vehicle))
        .route("/api/vehicle/create-crisscross", post(create_crisscross))
        .route("/api/vehicle/get-vehicle-state/:id", get(vehicle_state))
        .route(
            "/api/vehicle/get-vehicle-directions/:id",
            get(vehicle_directions),
        )
        .route("/api/vehicle/get-all-vehicle-states", get(all_vehicle_states))
        .route("/api/vehicle/reset-server", get(reset_server))
        .route("/api/trips/get-directions", post(trip_directions))
        .route("/api/position/get-position", post(position))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Upstream(_) | ServiceError::Route(_) | ServiceError::CacheLoad(_) => {
                StatusCode::BAD_GATEWAY
            }
            ServiceError::Store(_) | ServiceError::Kinematics(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = Json(serde_json::json!({ "message": self.0.to_string() }));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn create_vehicle(
    State(service): State<Arc<FleetService>>,
    Json(plan): Json<TripPlan>,
) -> ApiResult<Vehicle> {
    Ok(Json(service.create_vehicle(plan).await?))
}

async fn create_crisscross(
    State(service): State<Arc<FleetService>>,
    Json(plan): Json<CrissCrossPlan>,
) -> ApiResult<Vec<Vehicle>> {
    Ok(Json(service.create_crisscross(plan).await?))
}

async fn vehicle_state(
    State(service): State<Arc<FleetService>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vehicle> {
    Ok(Json(service.vehicle(id).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectionsParams {
    #[serde(default)]
    wait_for_result: bool,
}

async fn vehicle_directions(
    State(service): State<Arc<FleetService>>,
    Path(id): Path<Uuid>,
    Query(params): Query<DirectionsParams>,
) -> ApiResult<Directions> {
    Ok(Json(
        service.vehicle_directions(id, params.wait_for_result).await?,
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageParams {
    #[serde(default)]
    page: usize,
    #[serde(default = "default_page_size")]
    page_size: usize,
}

fn default_page_size() -> usize {
    100
}

async fn all_vehicle_states(
    State(service): State<Arc<FleetService>>,
    Query(params): Query<PageParams>,
) -> ApiResult<VehiclePage> {
    Ok(Json(
        service.vehicle_page(params.page, params.page_size).await?,
    ))
}

async fn reset_server(
    State(service): State<Arc<FleetService>>,
) -> ApiResult<serde_json::Value> {
    service.reset().await?;
    Ok(Json(serde_json::json!({ "status": "reset" })))
}

async fn trip_directions(
    State(service): State<Arc<FleetService>>,
    Json(plan): Json<TripPlan>,
) -> ApiResult<Directions> {
    Ok(Json(service.directions_for(plan).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRequest {
    trip_plan: TripPlan,
    meters_travel: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PositionResponse {
    deg_latitude: f64,
    deg_longitude: f64,
}

async fn position(
    State(service): State<Arc<FleetService>>,
    Json(request): Json<PositionRequest>,
) -> ApiResult<PositionResponse> {
    let point = service
        .position_at(request.trip_plan, request.meters_travel)
        .await?;
    Ok(Json(PositionResponse {
        deg_latitude: point.lat,
        deg_longitude: point.lon,
    }))
}
