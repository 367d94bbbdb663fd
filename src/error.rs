use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::ports::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient seats: {available} available, {requested} requested")]
    InsufficientSeats { available: i32, requested: i32 },

    #[error("Already registered for this event")]
    AlreadyRegistered,

    #[error("Points conflict: {0}")]
    PointsConflict(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Deadline passed: {0}")]
    DeadlinePassed(String),

    #[error("Invalid promotion: {0}")]
    PromotionInvalid(String),

    #[error("Payment proof upload failed: {0}")]
    UploadFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientSeats { .. } => StatusCode::CONFLICT,
            AppError::AlreadyRegistered => StatusCode::CONFLICT,
            AppError::PointsConflict(_) => StatusCode::CONFLICT,
            AppError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            AppError::DeadlinePassed(_) => StatusCode::BAD_REQUEST,
            AppError::PromotionInvalid(_) => StatusCode::BAD_REQUEST,
            AppError::UploadFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable tag, so clients can tell the 409s (and
    /// the 400s) apart without parsing messages.
    fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InsufficientSeats { .. } => "INSUFFICIENT_SEATS",
            AppError::AlreadyRegistered => "ALREADY_REGISTERED",
            AppError::PointsConflict(_) => "POINTS_CONFLICT",
            AppError::InvalidTransition(_) => "INVALID_TRANSITION",
            AppError::DeadlinePassed(_) => "DEADLINE_PASSED",
            AppError::PromotionInvalid(_) => "PROMOTION_INVALID",
            AppError::UploadFailed(_) => "UPLOAD_FAILED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Store(StoreError::NotFound(_)) => "NOT_FOUND",
            AppError::Store(_) => "STORE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Maps a store lookup miss to `NotFound` naming the entity; other
    /// store failures stay `Store`.
    pub fn lookup_failed(err: StoreError, entity: &str, id: impl std::fmt::Display) -> AppError {
        match err {
            StoreError::NotFound(_) => AppError::NotFound(format!("{} {} not found", entity, id)),
            other => AppError::Store(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
