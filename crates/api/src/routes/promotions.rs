//! Promotion routes: manager CRUD plus the role-dependent listings.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::promotion::{
    CreatePromotionRequest, ListPromotionsQuery, Promotion, PromotionKind,
    UpdatePromotionRequest,
};
use domain::services::access::{self, Capability};
use persistence::repositories::PromotionRepository;
use shared::pagination::{Page, PageQuery, Paginated};
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AuthUser;

/// POST /promotions
pub async fn create_promotion(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreatePromotionRequest>,
) -> Result<(StatusCode, Json<Promotion>), ApiError> {
    if !access::role_has(auth.role(), Capability::Moderate) {
        return Err(ApiError::Forbidden("Manager role required".to_string()));
    }
    request.validate()?;

    let kind: PromotionKind = request.kind.parse().map_err(ApiError::Validation)?;
    let now = Utc::now();
    shared::validation::validate_window(request.start_time, request.end_time)
        .map_err(|e| ApiError::Validation(validation_message(e)))?;
    if request.start_time < now {
        return Err(ApiError::Validation(
            "startTime cannot be in the past".to_string(),
        ));
    }
    check_numeric_fields(
        kind,
        request.rate,
        request.points,
        request.min_spending,
        true,
    )?;

    let repo = PromotionRepository::new(state.pool.clone());
    let entity = repo
        .create(
            &request.name,
            &request.description,
            kind.as_str(),
            request.start_time,
            request.end_time,
            request.min_spending,
            request.rate,
            request.points,
        )
        .await?;

    info!(promotion_id = entity.id, name = %entity.name, kind = %kind, "Promotion created");

    Ok((StatusCode::CREATED, Json(entity.into())))
}

/// GET /promotions — managers see everything with filters; everyone else
/// sees what they can still use right now.
pub async fn list_promotions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListPromotionsQuery>,
) -> Result<Json<Paginated<Promotion>>, ApiError> {
    let page = Page::resolve(&PageQuery {
        page: query.page,
        limit: query.limit,
    })?;
    let now = Utc::now();

    if let Some(ref kind) = query.kind {
        kind.parse::<PromotionKind>().map_err(ApiError::Validation)?;
    }

    let repo = PromotionRepository::new(state.pool.clone());
    let (count, rows) = if access::role_has(auth.role(), Capability::Moderate) {
        repo.list(
            query.name.as_deref(),
            query.kind.as_deref(),
            query.started,
            query.ended,
            now,
            page.limit,
            page.offset(),
        )
        .await?
    } else {
        repo.list_available(
            auth.id(),
            query.name.as_deref(),
            query.kind.as_deref(),
            now,
            page.limit,
            page.offset(),
        )
        .await?
    };

    Ok(Json(Paginated::new(
        count,
        rows.into_iter().map(Promotion::from).collect(),
    )))
}

/// GET /promotions/:promotionId — inactive promotions are masked as
/// NotFound below manager.
pub async fn get_promotion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(promotion_id): Path<i64>,
) -> Result<Json<Promotion>, ApiError> {
    let repo = PromotionRepository::new(state.pool.clone());
    let entity = repo
        .find_by_id(promotion_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Promotion not found".to_string()))?;

    let promotion: Promotion = entity.into();
    if !access::role_has(auth.role(), Capability::Moderate)
        && !promotion.window_contains(Utc::now())
    {
        return Err(ApiError::NotFound("Promotion not found".to_string()));
    }

    Ok(Json(promotion))
}

/// PATCH /promotions/:promotionId — fields freeze once the window opens;
/// the end time stays editable until it passes.
pub async fn update_promotion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(promotion_id): Path<i64>,
    Json(request): Json<UpdatePromotionRequest>,
) -> Result<Json<Promotion>, ApiError> {
    if !access::role_has(auth.role(), Capability::Moderate) {
        return Err(ApiError::Forbidden("Manager role required".to_string()));
    }

    let repo = PromotionRepository::new(state.pool.clone());
    let original: Promotion = repo
        .find_by_id(promotion_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Promotion not found".to_string()))?
        .into();

    let now = Utc::now();
    let changing_frozen = request.name.is_some()
        || request.description.is_some()
        || request.kind.is_some()
        || request.start_time.is_some()
        || request.min_spending.is_some()
        || request.rate.is_some()
        || request.points.is_some();
    if changing_frozen && original.start_time <= now {
        return Err(ApiError::Validation(
            "Cannot update a promotion after it has started".to_string(),
        ));
    }
    if request.end_time.is_some() && original.end_time <= now {
        return Err(ApiError::Validation(
            "Cannot update endTime after it has passed".to_string(),
        ));
    }

    if let Some(start_time) = request.start_time {
        if start_time < now {
            return Err(ApiError::Validation(
                "startTime cannot be in the past".to_string(),
            ));
        }
    }
    let effective_start = request.start_time.unwrap_or(original.start_time);
    let effective_end = request.end_time.unwrap_or(original.end_time);
    shared::validation::validate_window(effective_start, effective_end)
        .map_err(|e| ApiError::Validation(validation_message(e)))?;

    let kind = match request.kind.as_deref() {
        Some(kind) => kind.parse::<PromotionKind>().map_err(ApiError::Validation)?,
        None => original.kind,
    };
    check_numeric_fields(
        kind,
        request.rate.or(original.rate),
        request.points.or(original.points),
        request.min_spending.or(original.min_spending),
        false,
    )?;

    let updated = repo
        .update(
            promotion_id,
            request.name.as_deref(),
            request.description.as_deref(),
            request.kind.as_deref(),
            request.start_time,
            request.end_time,
            request.min_spending,
            request.rate,
            request.points,
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Promotion not found".to_string()))?;

    info!(promotion_id, actor = %auth.utorid(), "Promotion updated");

    Ok(Json(updated.into()))
}

/// DELETE /promotions/:promotionId — only before the window opens.
pub async fn delete_promotion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(promotion_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !access::role_has(auth.role(), Capability::Moderate) {
        return Err(ApiError::Forbidden("Manager role required".to_string()));
    }

    let repo = PromotionRepository::new(state.pool.clone());
    let promotion: Promotion = repo
        .find_by_id(promotion_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Promotion not found".to_string()))?
        .into();

    if promotion.start_time <= Utc::now() {
        return Err(ApiError::Forbidden(
            "Cannot delete a promotion that has already started".to_string(),
        ));
    }

    repo.delete(promotion_id).await?;
    info!(promotion_id, actor = %auth.utorid(), "Promotion deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Kind-dependent numeric requirements: automatic promotions earn by rate,
/// one-time promotions grant fixed points.
fn check_numeric_fields(
    kind: PromotionKind,
    rate: Option<f64>,
    points: Option<i64>,
    min_spending: Option<f64>,
    require: bool,
) -> Result<(), ApiError> {
    if let Some(rate) = rate {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(ApiError::Validation(
                "rate must be a positive number".to_string(),
            ));
        }
    }
    if let Some(points) = points {
        if points <= 0 {
            return Err(ApiError::Validation(
                "points must be a positive integer".to_string(),
            ));
        }
    }
    if let Some(min) = min_spending {
        if !(min.is_finite() && min > 0.0) {
            return Err(ApiError::Validation(
                "minSpending must be a positive number".to_string(),
            ));
        }
    }
    if require {
        match kind {
            PromotionKind::Automatic if rate.is_none() => {
                return Err(ApiError::Validation(
                    "rate is required for automatic promotions".to_string(),
                ))
            }
            PromotionKind::OneTime if points.is_none() => {
                return Err(ApiError::Validation(
                    "points is required for one-time promotions".to_string(),
                ))
            }
            _ => {}
        }
    }
    Ok(())
}

fn validation_message(err: validator::ValidationError) -> String {
    err.message
        .map(|m| m.to_string())
        .unwrap_or_else(|| "invalid value".to_string())
}
