use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ValidationErrors;
use crate::wizard::Step;

#[derive(Debug, Error)]
pub enum StylistError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("could not read photo: {0}")]
    PhotoRead(String),
    #[error("style generation failed: {0}")]
    Generation(String),
    #[error("a submission is already in progress")]
    Busy,
    #[error("cannot {action} while in step {step:?}")]
    InvalidTransition { step: Step, action: &'static str },
    #[error("stylist session {0} not found")]
    SessionNotFound(Uuid),
}

impl StylistError {
    pub fn status(&self) -> StatusCode {
        match self {
            StylistError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StylistError::PhotoRead(_) => StatusCode::BAD_REQUEST,
            StylistError::Generation(_) => StatusCode::BAD_GATEWAY,
            StylistError::Busy | StylistError::InvalidTransition { .. } => StatusCode::CONFLICT,
            StylistError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl From<ValidationErrors> for StylistError {
    fn from(errors: ValidationErrors) -> Self {
        StylistError::Validation(errors)
    }
}

impl IntoResponse for StylistError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("❌ {}", self);
        }
        let body = match &self {
            StylistError::Validation(fields) => json!({ "error": "validation failed", "fields": fields }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
