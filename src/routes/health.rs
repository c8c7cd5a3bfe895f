use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    response::{ApiResponse, Meta},
    state::AppState,
    store::{PageRequest, ProductFilter},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthData {
    /// `ok` when the store answered a catalog read within the call timeout.
    pub status: String,
    pub store: StoreHealth,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreHealth {
    Reachable,
    Unreachable,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Store reachable", body = ApiResponse<HealthData>),
        (status = 503, description = "Store unreachable", body = ApiResponse<HealthData>),
    ),
    tag = "Health"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<HealthData>>) {
    let filter = ProductFilter::default();
    let probe = state.store.list_products(
        &filter,
        PageRequest {
            limit: 1,
            offset: 0,
        },
    );
    let (code, status, store) = match state.policy.once("health", probe).await {
        Ok(_) => (StatusCode::OK, "ok", StoreHealth::Reachable),
        Err(err) => {
            tracing::warn!(error = %err, "health check could not reach the store");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "degraded",
                StoreHealth::Unreachable,
            )
        }
    };

    let data = HealthData {
        status: status.to_string(),
        store,
    };
    (
        code,
        Json(ApiResponse::success("Health check", data, Some(Meta::empty()))),
    )
}
