// error.rs
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to authenticate with Hubspace: {0}")]
    Auth(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid or missing authorization token")]
    Unauthorized,
    #[error("Failed to read {device}: {reason}")]
    DeviceQuery { device: String, reason: String },
    #[error("Failed to write attribute {attr} on {device}: {reason}")]
    DeviceWrite {
        device: String,
        attr: u32,
        reason: String,
    },
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn device_query(device: &str, reason: impl ToString) -> Self {
        AppError::DeviceQuery {
            device: device.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn device_write(device: &str, attr: u32, reason: impl ToString) -> Self {
        AppError::DeviceWrite {
            device: device.to_string(),
            attr,
            reason: reason.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Auth(_)
            | AppError::DeviceQuery { .. }
            | AppError::DeviceWrite { .. }
            | AppError::Timeout { .. }
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Every rule carries a readable message; report the one on the
        // alphabetically first field so the answer is stable.
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        let message = fields
            .into_iter()
            .flat_map(|(_, errs)| errs.iter())
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| "Invalid request".to_string());
        AppError::Validation(message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::NotFound("gone".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Auth("denied".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn device_errors_name_the_device() {
        let err = AppError::device_write("Porch", 2, "offline");
        assert_eq!(
            err.to_string(),
            "Failed to write attribute 2 on Porch: offline"
        );
    }
}
