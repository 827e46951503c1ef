//! HTTP request handlers.

use super::types::{HealthResponse, RegionsResponse, RegisterResponse};
use super::AppState;
use crate::error::ApiError;
use axum::{extract::State, Json};
use registration_saga::RegistrationForm;
use tracing::{info, warn};

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        regions: state.registrar.regions().len(),
    })
}

/// List the regions a tenant can register in.
pub async fn list_regions(State(state): State<AppState>) -> Json<RegionsResponse> {
    Json(RegionsResponse {
        ok: true,
        records: state.registrar.regions().list().to_vec(),
    })
}

/// Register a new tenant.
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegistrationForm>,
) -> Result<Json<RegisterResponse>, ApiError> {
    info!(client = %form.company_name, region = %form.region_host, "Registration request received");

    match state.registrar.register(&form).await {
        Ok(info) => Ok(Json(RegisterResponse { ok: true, info })),
        Err(e) => {
            warn!(client = %form.company_name, error = %e, "Registration rejected");
            Err(e.into())
        }
    }
}
