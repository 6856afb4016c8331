//! Transaction routes: the cashier/manager entry points into the engine
//! plus the manager read paths.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::transaction::{
    CreateTransactionRequest, ListTransactionsQuery, ProcessRequest, SetSuspiciousRequest,
    TransactionRecord,
};
use domain::services::access::{self, Capability};
use persistence::repositories::TransactionRepository;
use shared::pagination::{Page, PageQuery, Paginated};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::routes::users::build_filter;
use crate::services::transactions::TransactionEngine;

/// POST /transactions — dispatches by `type`: purchases need a cashier,
/// adjustments a manager.
pub async fn create_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionRecord>), ApiError> {
    shared::validation::validate_utorid(&request.utorid)
        .map_err(|e| ApiError::Validation(validation_message(e)))?;

    let engine = TransactionEngine::new(state.pool.clone(), state.config.loyalty.earn_rate);
    let now = Utc::now();

    let record = match request.kind.as_str() {
        "purchase" => {
            if !access::role_has(auth.role(), Capability::Create) {
                return Err(ApiError::Forbidden("Cashier role required".to_string()));
            }
            let spent = request.spent.ok_or_else(|| {
                ApiError::Validation("spent is required for purchases".to_string())
            })?;
            engine
                .record_purchase(
                    &auth.user,
                    &request.utorid,
                    spent,
                    request.promotion_ids.as_deref().unwrap_or(&[]),
                    request.remark.unwrap_or_default(),
                    now,
                )
                .await?
        }
        "adjustment" => {
            if !access::role_has(auth.role(), Capability::Moderate) {
                return Err(ApiError::Forbidden("Manager role required".to_string()));
            }
            let amount = request.amount.ok_or_else(|| {
                ApiError::Validation("amount is required for adjustments".to_string())
            })?;
            engine
                .record_adjustment(
                    &auth.user,
                    &request.utorid,
                    amount,
                    request.related_id,
                    request.remark.unwrap_or_default(),
                )
                .await?
        }
        other => {
            return Err(ApiError::Validation(format!(
                "type must be \"purchase\" or \"adjustment\", got \"{other}\""
            )))
        }
    };

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /transactions — manager listing with filters.
pub async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Paginated<TransactionRecord>>, ApiError> {
    if !access::role_has(auth.role(), Capability::Moderate) {
        return Err(ApiError::Forbidden("Manager role required".to_string()));
    }
    let page = Page::resolve(&PageQuery {
        page: query.page,
        limit: query.limit,
    })?;
    let filter = build_filter(&query, None)?;

    let repo = TransactionRepository::new(state.pool.clone());
    let (count, rows) = repo.list(&filter, page.limit, page.offset()).await?;

    Ok(Json(Paginated::new(
        count,
        rows.into_iter().map(TransactionRecord::from).collect(),
    )))
}

/// GET /transactions/:transactionId
pub async fn get_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(transaction_id): Path<i64>,
) -> Result<Json<TransactionRecord>, ApiError> {
    if !access::role_has(auth.role(), Capability::Moderate) {
        return Err(ApiError::Forbidden("Manager role required".to_string()));
    }
    let repo = TransactionRepository::new(state.pool.clone());
    let row = repo
        .find_detail(transaction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Transaction not found".to_string()))?;
    Ok(Json(row.into()))
}

/// PATCH /transactions/:transactionId/suspicious
pub async fn set_suspicious(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(transaction_id): Path<i64>,
    Json(request): Json<SetSuspiciousRequest>,
) -> Result<Json<TransactionRecord>, ApiError> {
    if !access::role_has(auth.role(), Capability::Moderate) {
        return Err(ApiError::Forbidden("Manager role required".to_string()));
    }
    let engine = TransactionEngine::new(state.pool.clone(), state.config.loyalty.earn_rate);
    let record = engine
        .set_suspicious(&auth.user, transaction_id, request.suspicious)
        .await?;
    Ok(Json(record))
}

/// PATCH /transactions/:transactionId/processed — cashier fulfils a pending
/// redemption.
pub async fn process_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(transaction_id): Path<i64>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<TransactionRecord>, ApiError> {
    if !access::role_has(auth.role(), Capability::Create) {
        return Err(ApiError::Forbidden("Cashier role required".to_string()));
    }
    if !request.processed {
        return Err(ApiError::Validation(
            "processed can only be set to true".to_string(),
        ));
    }
    let engine = TransactionEngine::new(state.pool.clone(), state.config.loyalty.earn_rate);
    let record = engine
        .process_redemption(&auth.user, transaction_id)
        .await?;
    Ok(Json(record))
}

fn validation_message(err: validator::ValidationError) -> String {
    err.message
        .map(|m| m.to_string())
        .unwrap_or_else(|| "invalid value".to_string())
}
