use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;

use crate::error::AppError;
use crate::AppState;

#[derive(Deserialize)]
pub struct ValidatePromotionRequest {
    pub code: String,
    pub total_amount: i64,
}

/// Quotes the discount a code would give on a purchase total, without
/// consuming a use.
pub async fn validate_promotion(
    State(state): State<AppState>,
    Json(req): Json<ValidatePromotionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.total_amount < 0 {
        return Err(AppError::Validation(
            "total_amount cannot be negative".to_string(),
        ));
    }

    let quote = state.promotions.validate(&req.code, req.total_amount).await?;
    Ok(Json(quote))
}

#[derive(Deserialize)]
pub struct ApplyPromotionRequest {
    pub code: String,
}

/// Consumes one use of a code and returns the updated promotion.
pub async fn apply_promotion(
    State(state): State<AppState>,
    Json(req): Json<ApplyPromotionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let promotion = state.promotions.apply(&req.code).await?;
    Ok(Json(promotion))
}
