// handlers.rs

use crate::{
    docs,
    error::AppError,
    models::{ApiInfo, AppState, ControlRequest, ControlResponse, HealthResponse, LightsResponse},
};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, header::AUTHORIZATION},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/lights", get(list_lights))
        .route("/control", post(control_lights))
        .route("/health", get(health))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", docs::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// API information
#[utoipa::path(get, path = "/", responses((status = 200, body = ApiInfo)))]
pub async fn root(State(state): State<Arc<AppState>>) -> Json<ApiInfo> {
    Json(ApiInfo {
        message: "Hubspace Light Control API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        lights_available: state.service.known_lights(),
        endpoints: json!({
            "GET /": "API information",
            "GET /lights": "List all available lights",
            "POST /control": "Control lights (requires authorization)",
            "GET /health": "Health check",
        }),
    })
}

/// List all available lights
#[utoipa::path(
    get,
    path = "/lights",
    responses(
        (status = 200, body = LightsResponse),
        (status = 500, description = "Failed to authenticate with Hubspace"),
    )
)]
pub async fn list_lights(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LightsResponse>, AppError> {
    let lights = state.service.lights().await?;
    Ok(Json(LightsResponse {
        count: lights.len(),
        lights,
    }))
}

/// Control lights
#[utoipa::path(
    post,
    path = "/control",
    request_body = ControlRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, body = ControlResponse),
        (status = 400, description = "Invalid control parameters"),
        (status = 401, description = "Invalid or missing authorization token"),
        (status = 404, description = "No light with that name"),
        (status = 500, description = "Failed to authenticate with Hubspace"),
    )
)]
pub async fn control_lights(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ControlRequest>, JsonRejection>,
) -> Result<Json<ControlResponse>, AppError> {
    authorize(&headers, &state.token)?;
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    info!(?request, "Control request");
    Ok(Json(state.service.control(&request).await?))
}

/// Health check
#[utoipa::path(get, path = "/health", responses((status = 200, body = HealthResponse)))]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(state.service.health().await)
}

fn authorize(headers: &HeaderMap, token: &str) -> Result<(), AppError> {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(presented) if presented == token => Ok(()),
        _ => {
            warn!("Rejected control request with missing or invalid token");
            Err(AppError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_must_match_exactly() {
        assert!(authorize(&headers("Bearer s3cret"), "s3cret").is_ok());
        assert!(authorize(&headers("Bearer wrong"), "s3cret").is_err());
        assert!(authorize(&headers("s3cret"), "s3cret").is_err());
        assert!(authorize(&headers("Basic s3cret"), "s3cret").is_err());
        assert!(authorize(&HeaderMap::new(), "s3cret").is_err());
    }
}
