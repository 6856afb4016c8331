//! Event allocation manager: guest/organizer membership, lifecycle edits,
//! and point awards against the event budget.
//!
//! Phase is always computed from the caller's `now`. Award fan-out goes
//! through the ledger primitive so the budget check, the per-guest rows and
//! the balance increments commit or abort as one unit.

use chrono::{DateTime, Utc};
use domain::models::event::{
    AwardReceipt, CreateEventRequest, Event, EventDetail, GuestAddedResponse, OrganizersResponse,
    UpdateEventRequest,
};
use domain::models::transaction::TransactionKind;
use domain::models::user::Role;
use domain::services::access;
use persistence::entities::{EventEntity, UserEntity};
use persistence::repositories::{
    EventRepository, GuestInsert, LedgerMutation, LedgerRepository, PointsTotalUpdate,
    TransactionDraft, UserRepository,
};
use sqlx::PgPool;
use tracing::info;

use super::EngineError;

pub struct EventAllocationManager {
    pool: PgPool,
}

impl EventAllocationManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn events(&self) -> EventRepository {
        EventRepository::new(self.pool.clone())
    }

    fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
    }

    /// Whether the viewer gets the privileged shape (budget, guest list,
    /// published flag) for this event.
    pub async fn can_manage(&self, event_id: i64, viewer: &UserEntity) -> Result<bool, EngineError> {
        if access::role_has(viewer.role(), access::Capability::Moderate) {
            return Ok(true);
        }
        Ok(self.events().is_organizer(event_id, viewer.id).await?)
    }

    pub async fn create(&self, req: &CreateEventRequest) -> Result<EventDetail, EngineError> {
        shared::validation::validate_window(req.start_time, req.end_time)
            .map_err(|e| EngineError::Validation(message_of(e)))?;
        if let Some(capacity) = req.capacity {
            if capacity <= 0 {
                return Err(EngineError::Validation(
                    "capacity must be a positive integer or null".to_string(),
                ));
            }
        }
        if req.points <= 0 {
            return Err(EngineError::Validation(
                "points must be a positive integer".to_string(),
            ));
        }

        let entity = self
            .events()
            .create(
                &req.name,
                &req.description,
                &req.location,
                req.start_time,
                req.end_time,
                req.capacity,
                req.points,
            )
            .await?;

        info!(event_id = entity.id, name = %entity.name, "Event created");

        Ok(privileged_detail(entity, Vec::new(), Vec::new()))
    }

    /// Detail view. Unpublished events are masked as NotFound for viewers
    /// without management access.
    pub async fn detail(
        &self,
        event_id: i64,
        viewer: &UserEntity,
    ) -> Result<EventDetail, EngineError> {
        let entity = self
            .events()
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Event not found".to_string()))?;

        let privileged = self.can_manage(event_id, viewer).await?;
        if !entity.published && !privileged {
            return Err(EngineError::NotFound("Event not found".to_string()));
        }

        let organizers = self.events().organizers(event_id).await?;
        let organizers: Vec<_> = organizers.into_iter().map(Into::into).collect();

        if privileged {
            let guests = self.events().guests(event_id).await?;
            Ok(privileged_detail(
                entity,
                organizers,
                guests.into_iter().map(Into::into).collect(),
            ))
        } else {
            let num_guests = self.events().guest_count(event_id).await?;
            Ok(public_detail(entity, organizers, num_guests))
        }
    }

    /// Apply a PATCH. Descriptive fields freeze at start time, the end time
    /// at its own passing; budget and published changes are manager-only.
    pub async fn update(
        &self,
        actor: &UserEntity,
        event_id: i64,
        req: &UpdateEventRequest,
        now: DateTime<Utc>,
    ) -> Result<EventDetail, EngineError> {
        let original = self
            .events()
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Event not found".to_string()))?;

        let is_organizer = self.events().is_organizer(event_id, actor.id).await?;
        if !access::can_manage_event(actor.role(), is_organizer) {
            return Err(EngineError::Forbidden(
                "Only managers or this event's organizers may edit it".to_string(),
            ));
        }

        let manager = actor.role().at_least(Role::Manager);
        if (req.points.is_some() || req.published.is_some()) && !manager {
            return Err(EngineError::Forbidden(
                "Only managers may update points or published".to_string(),
            ));
        }
        if let Some(published) = req.published {
            if !published {
                return Err(EngineError::Validation(
                    "published can only be set to true".to_string(),
                ));
            }
        }

        let event: Event = original.clone().into();
        let changing_basic = req.name.is_some()
            || req.description.is_some()
            || req.location.is_some()
            || req.start_time.is_some()
            || req.capacity.is_some();
        if changing_basic && event.has_started(now) {
            return Err(EngineError::Validation(
                "Cannot update descriptive fields after the event has started".to_string(),
            ));
        }
        if req.end_time.is_some() && event.has_ended(now) {
            return Err(EngineError::Validation(
                "Cannot update endTime after the event has ended".to_string(),
            ));
        }

        if let Some(end_time) = req.end_time {
            let start = req.start_time.unwrap_or(original.start_time);
            shared::validation::validate_window(start, end_time)
                .map_err(|e| EngineError::Validation(message_of(e)))?;
        }

        if let Some(capacity) = req.capacity {
            if capacity <= 0 {
                return Err(EngineError::Validation(
                    "capacity must be a positive integer".to_string(),
                ));
            }
            let guest_count = self.events().guest_count(event_id).await?;
            if (capacity as i64) < guest_count {
                return Err(EngineError::Validation(
                    "capacity cannot be reduced below the current guest count".to_string(),
                ));
            }
        }

        self.events()
            .update_fields(
                event_id,
                req.name.as_deref(),
                req.description.as_deref(),
                req.location.as_deref(),
                req.start_time,
                req.end_time,
                req.capacity,
            )
            .await?;

        if let Some(points) = req.points {
            if points <= 0 {
                return Err(EngineError::Validation(
                    "points must be a positive integer".to_string(),
                ));
            }
            match self.events().update_points_total(event_id, points).await? {
                PointsTotalUpdate::Updated(_) => {}
                PointsTotalUpdate::BelowAwarded { awarded } => {
                    return Err(EngineError::Validation(format!(
                        "points cannot be reduced below the {awarded} already awarded"
                    )))
                }
                PointsTotalUpdate::Missing => {
                    return Err(EngineError::NotFound("Event not found".to_string()))
                }
            }
        }

        if req.published == Some(true) {
            self.events().set_published(event_id).await?;
        }

        info!(event_id, actor = %actor.utorid, "Event updated");

        self.detail(event_id, actor).await
    }

    /// Managers may delete unpublished events only.
    pub async fn delete(&self, event_id: i64) -> Result<(), EngineError> {
        let entity = self
            .events()
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Event not found".to_string()))?;
        if entity.published {
            return Err(EngineError::Validation(
                "Cannot delete a published event".to_string(),
            ));
        }
        self.events().delete(event_id).await?;
        info!(event_id, "Event deleted");
        Ok(())
    }

    /// Add an organizer. Mutually exclusive with guest status; idempotent.
    pub async fn add_organizer(
        &self,
        event_id: i64,
        utorid: &str,
        now: DateTime<Utc>,
    ) -> Result<OrganizersResponse, EngineError> {
        let entity = self
            .events()
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Event not found".to_string()))?;
        let event: Event = entity.clone().into();
        if event.has_ended(now) {
            return Err(EngineError::Gone("Event has ended".to_string()));
        }

        let user = self
            .users()
            .find_by_utorid(utorid)
            .await?
            .ok_or_else(|| EngineError::NotFound("User must have an account".to_string()))?;

        if self.events().is_guest(event_id, user.id).await? {
            return Err(EngineError::Conflict(
                "User is already a guest; remove as guest first".to_string(),
            ));
        }

        self.events().add_organizer(event_id, user.id).await?;

        let organizers = self.events().organizers(event_id).await?;
        Ok(OrganizersResponse {
            id: entity.id,
            name: entity.name,
            location: entity.location,
            organizers: organizers.into_iter().map(Into::into).collect(),
        })
    }

    /// Idempotent organizer removal.
    pub async fn remove_organizer(&self, event_id: i64, user_id: i64) -> Result<(), EngineError> {
        self.events().remove_organizer(event_id, user_id).await?;
        Ok(())
    }

    /// Add a guest on someone's behalf (manager or organizer path).
    /// Idempotent when already a guest; `Gone` once the event ended or is
    /// full; organizers are mutually exclusive with guests.
    pub async fn add_guest(
        &self,
        event_id: i64,
        utorid: &str,
        now: DateTime<Utc>,
    ) -> Result<(GuestAddedResponse, bool), EngineError> {
        let entity = self
            .events()
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Event not found".to_string()))?;
        let event: Event = entity.clone().into();
        if event.has_ended(now) {
            return Err(EngineError::Gone("Event has ended".to_string()));
        }

        let user = self
            .users()
            .find_by_utorid(utorid)
            .await?
            .ok_or_else(|| EngineError::NotFound("User must have an account".to_string()))?;

        self.insert_guest(&entity, &user).await
    }

    /// Self-RSVP: the event must be published and not ended.
    pub async fn rsvp(
        &self,
        user: &UserEntity,
        event_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(GuestAddedResponse, bool), EngineError> {
        let entity = self
            .events()
            .find_by_id(event_id)
            .await?
            .filter(|e| e.published)
            .ok_or_else(|| EngineError::NotFound("Event not found".to_string()))?;
        let event: Event = entity.clone().into();
        if event.has_ended(now) {
            return Err(EngineError::Gone("Event has ended".to_string()));
        }
        self.insert_guest(&entity, user).await
    }

    async fn insert_guest(
        &self,
        entity: &EventEntity,
        user: &UserEntity,
    ) -> Result<(GuestAddedResponse, bool), EngineError> {
        if self.events().is_organizer(entity.id, user.id).await? {
            return Err(EngineError::Conflict(
                "User is already an organizer; remove as organizer first".to_string(),
            ));
        }

        let (added, num_guests) = match self.events().add_guest_checked(entity.id, user.id).await? {
            GuestInsert::Added { num_guests } => (true, num_guests),
            GuestInsert::AlreadyGuest { num_guests } => (false, num_guests),
            GuestInsert::Full => return Err(EngineError::Gone("Event is full".to_string())),
            GuestInsert::EventMissing => {
                return Err(EngineError::NotFound("Event not found".to_string()))
            }
        };

        if added {
            info!(event_id = entity.id, guest = %user.utorid, "Guest added");
        }

        Ok((
            GuestAddedResponse {
                id: entity.id,
                name: entity.name.clone(),
                location: entity.location.clone(),
                guest_added: user.summary(),
                num_guests,
            },
            added,
        ))
    }

    /// Guest self-removal while the event has not ended. Unlike the
    /// administrative removal this reports a missing RSVP.
    pub async fn leave(
        &self,
        user: &UserEntity,
        event_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let entity = self
            .events()
            .find_by_id(event_id)
            .await?
            .filter(|e| e.published)
            .ok_or_else(|| EngineError::NotFound("Event not found".to_string()))?;
        let event: Event = entity.into();
        if event.has_ended(now) {
            return Err(EngineError::Gone("Event has ended".to_string()));
        }
        let removed = self.events().remove_guest(event_id, user.id).await?;
        if !removed {
            return Err(EngineError::NotFound(
                "You did not RSVP to this event".to_string(),
            ));
        }
        Ok(())
    }

    /// Idempotent administrative guest removal.
    pub async fn remove_guest(&self, event_id: i64, user_id: i64) -> Result<(), EngineError> {
        self.events().remove_guest(event_id, user_id).await?;
        Ok(())
    }

    /// Award points from the event budget to one guest or to every guest.
    ///
    /// The required total (`amount × recipients`) is checked once against
    /// `points_remain` under the event row lock before any row is written;
    /// a failure therefore leaves balances, budget and history untouched.
    pub async fn award(
        &self,
        actor: &UserEntity,
        event_id: i64,
        target_utorid: Option<&str>,
        amount: i64,
        remark: String,
    ) -> Result<Vec<AwardReceipt>, EngineError> {
        shared::validation::validate_positive_amount(amount)
            .map_err(|e| EngineError::Validation(message_of(e)))?;

        self.events()
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Event not found".to_string()))?;

        let recipients: Vec<(i64, String)> = match target_utorid {
            Some(utorid) => {
                let user = self
                    .users()
                    .find_by_utorid(utorid)
                    .await?
                    .ok_or_else(|| EngineError::NotFound("User must have an account".to_string()))?;
                if !self.events().is_guest(event_id, user.id).await? {
                    return Err(EngineError::Validation(
                        "User is not on the guest list for this event".to_string(),
                    ));
                }
                vec![(user.id, user.utorid)]
            }
            None => {
                let guests = self.events().guests(event_id).await?;
                if guests.is_empty() {
                    return Err(EngineError::Validation(
                        "No guests to award for this event".to_string(),
                    ));
                }
                guests.into_iter().map(|g| (g.user_id, g.utorid)).collect()
            }
        };

        let total = amount * recipients.len() as i64;
        let mut mutation = LedgerMutation::default().with_budget(event_id, total);
        for (user_id, _) in &recipients {
            let mut draft =
                TransactionDraft::new(*user_id, TransactionKind::Event, amount, actor.id);
            draft.related_id = Some(event_id);
            draft.remark = remark.clone();
            mutation = mutation.with_row(draft).with_delta(*user_id, amount);
        }

        let ids = self.ledger().apply(mutation).await?;

        info!(
            event_id,
            actor = %actor.utorid,
            recipients = recipients.len(),
            amount,
            total,
            "Event points awarded"
        );

        Ok(ids
            .into_iter()
            .zip(recipients)
            .map(|(id, (_, utorid))| AwardReceipt {
                id,
                recipient: utorid,
                awarded: amount,
                kind: "event".to_string(),
                related_id: event_id,
                remark: remark.clone(),
                created_by: actor.utorid.clone(),
            })
            .collect())
    }
}

fn privileged_detail(
    entity: EventEntity,
    organizers: Vec<domain::models::user::UserSummary>,
    guests: Vec<domain::models::user::UserSummary>,
) -> EventDetail {
    let num_guests = guests.len() as i64;
    EventDetail {
        id: entity.id,
        name: entity.name,
        description: entity.description,
        location: entity.location,
        start_time: entity.start_time,
        end_time: entity.end_time,
        capacity: entity.capacity,
        organizers,
        num_guests,
        points_remain: Some(entity.points_remain),
        points_awarded: Some(entity.points_awarded),
        published: Some(entity.published),
        guests: Some(guests),
    }
}

fn public_detail(
    entity: EventEntity,
    organizers: Vec<domain::models::user::UserSummary>,
    num_guests: i64,
) -> EventDetail {
    EventDetail {
        id: entity.id,
        name: entity.name,
        description: entity.description,
        location: entity.location,
        start_time: entity.start_time,
        end_time: entity.end_time,
        capacity: entity.capacity,
        organizers,
        num_guests,
        points_remain: None,
        points_awarded: None,
        published: None,
        guests: None,
    }
}

fn message_of(err: validator::ValidationError) -> String {
    err.message
        .map(|m| m.to_string())
        .unwrap_or_else(|| "invalid value".to_string())
}
