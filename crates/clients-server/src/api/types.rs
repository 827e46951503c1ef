//! API response types.

use registration_saga::{Region, SuccessInfo};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub regions: usize,
}

/// Selectable regions.
#[derive(Debug, Serialize)]
pub struct RegionsResponse {
    pub ok: bool,
    pub records: Vec<Region>,
}

/// Successful registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub info: SuccessInfo,
}
