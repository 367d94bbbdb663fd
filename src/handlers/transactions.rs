use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStatus};
use crate::error::AppError;
use crate::ports::{TransactionFilter, TransactionPage};
use crate::services::CreateTransactionInput;
use crate::AppState;

/// Transaction plus the capability flags list views need.
#[derive(Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    transaction: Transaction,
    can_cancel: bool,
    can_upload_payment: bool,
    is_expired: bool,
}

impl TransactionView {
    fn new(transaction: Transaction) -> Self {
        let now = Utc::now();
        Self {
            can_cancel: transaction.can_cancel(),
            can_upload_payment: transaction.can_upload_payment(now),
            is_expired: transaction.status == TransactionStatus::WaitingPayment
                && transaction.is_past_payment_deadline(now),
            transaction,
        }
    }
}

#[derive(Serialize)]
pub struct Paginated {
    pub items: Vec<TransactionView>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Paginated {
    fn new(page_data: TransactionPage, page: i64, limit: i64) -> Self {
        let pages = if page_data.total == 0 {
            0
        } else {
            (page_data.total + limit - 1) / limit
        };
        Self {
            items: page_data
                .items
                .into_iter()
                .map(TransactionView::new)
                .collect(),
            page,
            limit,
            total: page_data.total,
            pages,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateTransactionRequest {
    pub user_id: Uuid,
    pub event_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub points_used: i64,
    pub promotion_code: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

fn default_quantity() -> i32 {
    1
}

pub async fn create_transaction(
    State(state): State<AppState>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    // An empty code field means no promotion, matching the web client.
    let promotion_code = req.promotion_code.filter(|code| !code.trim().is_empty());

    let transaction = state
        .transactions
        .create_transaction(CreateTransactionInput {
            user_id: req.user_id,
            event_id: req.event_id,
            quantity: req.quantity,
            points_requested: req.points_used,
            promotion_code,
            payment_method: req.payment_method,
            notes: req.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(TransactionView::new(transaction))))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state.transactions.get_transaction(id).await?;
    Ok(Json(TransactionView::new(transaction)))
}

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_user_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    // "ALL" disables the status filter, matching the web client.
    let status = match params.status.as_deref() {
        None | Some("ALL") | Some("") => None,
        Some(raw) => Some(
            raw.parse::<TransactionStatus>()
                .map_err(|e| AppError::Validation(e.to_string()))?,
        ),
    };

    let filter = TransactionFilter {
        status,
        page,
        limit,
    };
    let page_data = state
        .transactions
        .list_user_transactions(user_id, &filter)
        .await?;

    Ok(Json(Paginated::new(page_data, page, limit)))
}

#[derive(Deserialize)]
pub struct UploadProofRequest {
    pub user_id: Uuid,
    pub payment_proof: String,
}

pub async fn upload_payment_proof(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UploadProofRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.payment_proof.trim().is_empty() {
        return Err(AppError::Validation("payment_proof is required".to_string()));
    }

    let transaction = state
        .transactions
        .upload_payment_proof(id, req.user_id, &req.payment_proof)
        .await?;
    Ok(Json(TransactionView::new(transaction)))
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    pub user_id: Option<Uuid>,
}

pub async fn cancel_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    req: Option<Json<CancelRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let acting_user = req.and_then(|Json(body)| body.user_id);
    let transaction = state
        .transactions
        .cancel_transaction(id, acting_user)
        .await?;
    Ok(Json(TransactionView::new(transaction)))
}

pub async fn accept_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state.transactions.accept_payment(id).await?;
    Ok(Json(TransactionView::new(transaction)))
}

pub async fn reject_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state.transactions.reject_payment(id).await?;
    Ok(Json(TransactionView::new(transaction)))
}

#[derive(Deserialize)]
pub struct RegistrationQuery {
    pub user_id: Uuid,
}

pub async fn registration_status(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(query): Query<RegistrationQuery>,
) -> Result<impl IntoResponse, AppError> {
    let registered = state
        .transactions
        .is_user_registered(query.user_id, event_id)
        .await?;
    Ok(Json(serde_json::json!({ "registered": registered })))
}

pub async fn transaction_stats(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let stats = state.transactions.stats().await?;
    Ok(Json(stats))
}
