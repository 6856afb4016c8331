//! Event routes: CRUD, organizer/guest membership, and point awards.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::event::{
    AwardRequest, CreateEventRequest, EventDetail, EventSummary, GuestAddedResponse,
    ListEventsQuery, MembershipRequest, OrganizersResponse, UpdateEventRequest,
};
use domain::services::access::{self, Capability};
use persistence::entities::EventListRow;
use persistence::repositories::EventRepository;
use shared::pagination::{Page, PageQuery, Paginated};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::services::events::EventAllocationManager;

/// POST /events
pub async fn create_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventDetail>), ApiError> {
    if !access::role_has(auth.role(), Capability::Moderate) {
        return Err(ApiError::Forbidden("Manager role required".to_string()));
    }
    request.validate()?;

    let manager = EventAllocationManager::new(state.pool.clone());
    let detail = manager.create(&request).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /events — regular users see published events only; managers may
/// filter by published.
pub async fn list_events(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Paginated<EventSummary>>, ApiError> {
    let page = Page::resolve(&PageQuery {
        page: query.page,
        limit: query.limit,
    })?;
    let now = Utc::now();
    let privileged = access::role_has(auth.role(), Capability::Moderate);
    let published = if privileged {
        query.published
    } else {
        Some(true)
    };

    let repo = EventRepository::new(state.pool.clone());
    let (count, rows) = repo
        .list(
            query.name.as_deref(),
            query.location.as_deref(),
            query.started,
            query.ended,
            query.show_full,
            published,
            now,
            page.limit,
            page.offset(),
        )
        .await?;

    Ok(Json(Paginated::new(
        count,
        rows.into_iter().map(|r| summarize(r, privileged)).collect(),
    )))
}

/// GET /organizer/events — the events the caller organizes, in the
/// privileged shape. Managers may browse without an assignment.
pub async fn organizer_events(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Paginated<EventSummary>>, ApiError> {
    let page = Page::resolve(&PageQuery {
        page: query.page,
        limit: query.limit,
    })?;

    let repo = EventRepository::new(state.pool.clone());
    if !access::role_has(auth.role(), Capability::Moderate) && !repo.organizes_any(auth.id()).await?
    {
        return Err(ApiError::Forbidden(
            "Not assigned as an organizer".to_string(),
        ));
    }

    let (count, rows) = repo
        .list_organized_by(
            auth.id(),
            query.name.as_deref(),
            query.location.as_deref(),
            page.limit,
            page.offset(),
        )
        .await?;

    Ok(Json(Paginated::new(
        count,
        rows.into_iter().map(|r| summarize(r, true)).collect(),
    )))
}

/// GET /events/:eventId
pub async fn get_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<i64>,
) -> Result<Json<EventDetail>, ApiError> {
    let manager = EventAllocationManager::new(state.pool.clone());
    let detail = manager.detail(event_id, &auth.user).await?;
    Ok(Json(detail))
}

/// PATCH /events/:eventId
pub async fn update_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<i64>,
    Json(request): Json<UpdateEventRequest>,
) -> Result<Json<EventDetail>, ApiError> {
    let manager = EventAllocationManager::new(state.pool.clone());
    let detail = manager
        .update(&auth.user, event_id, &request, Utc::now())
        .await?;
    Ok(Json(detail))
}

/// DELETE /events/:eventId
pub async fn delete_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !access::role_has(auth.role(), Capability::Moderate) {
        return Err(ApiError::Forbidden("Manager role required".to_string()));
    }
    let manager = EventAllocationManager::new(state.pool.clone());
    manager.delete(event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /events/:eventId/organizers
pub async fn add_organizer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<i64>,
    Json(request): Json<MembershipRequest>,
) -> Result<(StatusCode, Json<OrganizersResponse>), ApiError> {
    if !access::role_has(auth.role(), Capability::Moderate) {
        return Err(ApiError::Forbidden("Manager role required".to_string()));
    }
    shared::validation::validate_utorid(&request.utorid)
        .map_err(|e| ApiError::Validation(validation_message(e)))?;

    let manager = EventAllocationManager::new(state.pool.clone());
    let response = manager
        .add_organizer(event_id, &request.utorid, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// DELETE /events/:eventId/organizers/:userId — idempotent.
pub async fn remove_organizer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((event_id, user_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    if !access::role_has(auth.role(), Capability::Moderate) {
        return Err(ApiError::Forbidden("Manager role required".to_string()));
    }
    let manager = EventAllocationManager::new(state.pool.clone());
    manager.remove_organizer(event_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /events/:eventId/guests — manager or organizer of this event. The
/// event is masked as NotFound for anyone else.
pub async fn add_guest(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<i64>,
    Json(request): Json<MembershipRequest>,
) -> Result<(StatusCode, Json<GuestAddedResponse>), ApiError> {
    shared::validation::validate_utorid(&request.utorid)
        .map_err(|e| ApiError::Validation(validation_message(e)))?;

    let manager = EventAllocationManager::new(state.pool.clone());
    if !manager.can_manage(event_id, &auth.user).await? {
        return Err(ApiError::NotFound("Event not found".to_string()));
    }

    let (response, added) = manager
        .add_guest(event_id, &request.utorid, Utc::now())
        .await?;
    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

/// POST /events/:eventId/guests/me — self-RSVP to a published event.
pub async fn rsvp_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<i64>,
) -> Result<(StatusCode, Json<GuestAddedResponse>), ApiError> {
    let manager = EventAllocationManager::new(state.pool.clone());
    let (response, added) = manager.rsvp(&auth.user, event_id, Utc::now()).await?;
    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

/// DELETE /events/:eventId/guests/me — leave the guest list.
pub async fn leave_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let manager = EventAllocationManager::new(state.pool.clone());
    manager.leave(&auth.user, event_id, Utc::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /events/:eventId/guests/:userId — manager or organizer;
/// idempotent.
pub async fn remove_guest(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((event_id, user_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let manager = EventAllocationManager::new(state.pool.clone());
    if !manager.can_manage(event_id, &auth.user).await? {
        return Err(ApiError::NotFound("Event not found".to_string()));
    }
    manager.remove_guest(event_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /events/:eventId/transactions — award points from the budget.
pub async fn award_points(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<i64>,
    Json(request): Json<AwardRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if request.kind != "event" {
        return Err(ApiError::Validation("type must be \"event\"".to_string()));
    }
    if let Some(ref utorid) = request.utorid {
        shared::validation::validate_utorid(utorid)
            .map_err(|e| ApiError::Validation(validation_message(e)))?;
    }

    let manager = EventAllocationManager::new(state.pool.clone());
    if !manager.can_manage(event_id, &auth.user).await? {
        return Err(ApiError::Forbidden(
            "Only managers or this event's organizers may award points".to_string(),
        ));
    }

    let receipts = manager
        .award(
            &auth.user,
            event_id,
            request.utorid.as_deref(),
            request.amount,
            request.remark.unwrap_or_default(),
        )
        .await?;

    // Single-target awards answer with the one receipt, fan-outs with the
    // full list.
    let body = if request.utorid.is_some() {
        serde_json::to_value(&receipts[0])
    } else {
        serde_json::to_value(&receipts)
    }
    .map_err(|e| ApiError::Internal(format!("Serialization failed: {e}")))?;

    Ok((StatusCode::CREATED, Json(body)))
}

fn summarize(row: EventListRow, privileged: bool) -> EventSummary {
    EventSummary {
        id: row.id,
        name: row.name,
        location: row.location,
        start_time: row.start_time,
        end_time: row.end_time,
        capacity: row.capacity,
        num_guests: row.num_guests,
        points_remain: privileged.then_some(row.points_remain),
        points_awarded: privileged.then_some(row.points_awarded),
        published: privileged.then_some(row.published),
    }
}

fn validation_message(err: validator::ValidationError) -> String {
    err.message
        .map(|m| m.to_string())
        .unwrap_or_else(|| "invalid value".to_string())
}
