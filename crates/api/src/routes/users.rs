//! User routes: profile, administrative standing, and the user-initiated
//! transaction endpoints (redemption requests, peer transfers).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::transaction::{
    ListTransactionsQuery, RedemptionRequest, TransactionRecord, TransferRequest,
};
use domain::models::user::{ListUsersQuery, Role, UpdateUserRequest, User};
use domain::services::access::{self, Capability, RoleChangeDenied};
use persistence::repositories::{TransactionFilter, TransactionRepository, UserRepository};
use serde::Serialize;
use shared::pagination::{Page, PageQuery, Paginated};
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::services::transactions::TransactionEngine;

/// Cashier view of a user: enough to record a purchase, nothing more.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LimitedUser {
    id: i64,
    utorid: String,
    name: Option<String>,
    points: i64,
    verified: bool,
}

/// GET /users/me
pub async fn get_me(auth: AuthUser) -> Json<User> {
    Json(auth.user.into())
}

/// GET /users — manager listing with filters.
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Paginated<User>>, ApiError> {
    if !access::role_has(auth.role(), Capability::Moderate) {
        return Err(ApiError::Forbidden("Manager role required".to_string()));
    }
    let page = Page::resolve(&PageQuery {
        page: query.page,
        limit: query.limit,
    })?;

    if let Some(ref role) = query.role {
        role.parse::<Role>().map_err(ApiError::Validation)?;
    }

    let repo = UserRepository::new(state.pool.clone());
    let (count, rows) = repo
        .list(
            query.name.as_deref(),
            query.role.as_deref(),
            query.verified,
            page.limit,
            page.offset(),
        )
        .await?;

    Ok(Json(Paginated::new(
        count,
        rows.into_iter().map(User::from).collect(),
    )))
}

/// GET /users/:userId — cashiers get the limited shape, managers the full
/// record.
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !access::role_has(auth.role(), Capability::Create) {
        return Err(ApiError::Forbidden("Cashier role required".to_string()));
    }

    let repo = UserRepository::new(state.pool.clone());
    let user = repo
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if access::role_has(auth.role(), Capability::Moderate) {
        let full: User = user.into();
        Ok(Json(serde_json::to_value(full).map_err(|e| {
            ApiError::Internal(format!("Serialization failed: {e}"))
        })?))
    } else {
        let limited = LimitedUser {
            id: user.id,
            utorid: user.utorid,
            name: user.name,
            points: user.points,
            verified: user.verified,
        };
        Ok(Json(serde_json::to_value(limited).map_err(|e| {
            ApiError::Internal(format!("Serialization failed: {e}"))
        })?))
    }
}

/// PATCH /users/:userId — role/verified/suspicious changes under the access
/// gate.
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    if !access::role_has(auth.role(), Capability::Moderate) {
        return Err(ApiError::Forbidden("Manager role required".to_string()));
    }

    let repo = UserRepository::new(state.pool.clone());
    let target = repo
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let new_role = match request.role.as_deref() {
        Some(role) => Some(role.parse::<Role>().map_err(ApiError::Validation)?),
        None => None,
    };

    if let Some(role) = new_role {
        // The suspicious flag being set in the same request counts.
        let suspicious = request.suspicious.unwrap_or(target.suspicious);
        match access::check_role_change(auth.role(), role, suspicious) {
            Ok(()) => {}
            Err(RoleChangeDenied::ActorRank) => {
                return Err(ApiError::Forbidden(
                    "Superuser role required to assign manager or superuser".to_string(),
                ))
            }
            Err(RoleChangeDenied::SuspiciousCashier) => {
                return Err(ApiError::Validation(
                    "Suspicious users cannot be promoted to cashier".to_string(),
                ))
            }
        }
    }

    let updated = repo
        .update_standing(
            user_id,
            new_role.map(|r| r.as_str()),
            request.verified,
            request.suspicious,
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    info!(
        target = %updated.utorid,
        actor = %auth.utorid(),
        role = ?request.role,
        verified = ?request.verified,
        suspicious = ?request.suspicious,
        "User standing updated"
    );

    Ok(Json(updated.into()))
}

/// GET /users/me/transactions — own history with filters.
pub async fn my_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Paginated<TransactionRecord>>, ApiError> {
    let page = Page::resolve(&PageQuery {
        page: query.page,
        limit: query.limit,
    })?;
    let filter = build_filter(&query, Some(auth.id()))?;

    let repo = TransactionRepository::new(state.pool.clone());
    let (count, rows) = repo.list(&filter, page.limit, page.offset()).await?;

    Ok(Json(Paginated::new(
        count,
        rows.into_iter().map(TransactionRecord::from).collect(),
    )))
}

/// POST /users/me/transactions — a redemption request.
pub async fn create_redemption(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<RedemptionRequest>,
) -> Result<(StatusCode, Json<TransactionRecord>), ApiError> {
    if request.kind != "redemption" {
        return Err(ApiError::Validation(
            "type must be \"redemption\"".to_string(),
        ));
    }
    let engine = TransactionEngine::new(state.pool.clone(), state.config.loyalty.earn_rate);
    let record = engine
        .request_redemption(&auth.user, request.amount, request.remark.unwrap_or_default())
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /users/:userId/transactions — transfer points to another user.
pub async fn create_transfer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(recipient_id): Path<i64>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransactionRecord>), ApiError> {
    if request.kind != "transfer" {
        return Err(ApiError::Validation("type must be \"transfer\"".to_string()));
    }
    let engine = TransactionEngine::new(state.pool.clone(), state.config.loyalty.earn_rate);
    let record = engine
        .record_transfer(
            &auth.user,
            recipient_id,
            request.amount,
            request.remark.unwrap_or_default(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Shared filter assembly for transaction listings. `owner_id` pins the
/// listing to one user and disables the owner-name filter.
pub(crate) fn build_filter(
    query: &ListTransactionsQuery,
    owner_id: Option<i64>,
) -> Result<TransactionFilter, ApiError> {
    use domain::models::transaction::{AmountOperator, TransactionKind};

    if let Some(ref kind) = query.kind {
        kind.parse::<TransactionKind>()
            .map_err(ApiError::Validation)?;
    }
    if query.amount.is_some() && query.operator.is_none() {
        return Err(ApiError::Validation(
            "operator (gte or lte) is required with amount".to_string(),
        ));
    }
    if query.related_id.is_some() && query.kind.is_none() {
        return Err(ApiError::Validation(
            "relatedId filter requires the type filter".to_string(),
        ));
    }

    Ok(TransactionFilter {
        owner_id,
        name: if owner_id.is_some() {
            None
        } else {
            query.name.clone()
        },
        created_by: query.created_by.clone(),
        suspicious: query.suspicious,
        promotion_id: query.promotion_id,
        kind: query.kind.clone(),
        related_id: query.related_id,
        amount: query.amount,
        amount_lte: query.operator == Some(AmountOperator::Lte),
    })
}
