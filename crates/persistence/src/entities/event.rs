//! Event entities.

use chrono::{DateTime, Utc};
use domain::models::event::Event;
use domain::models::user::UserSummary;

/// Row mapping for the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventEntity {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub points_total: i64,
    pub points_remain: i64,
    pub points_awarded: i64,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

impl From<EventEntity> for Event {
    fn from(entity: EventEntity) -> Self {
        Event {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            location: entity.location,
            start_time: entity.start_time,
            end_time: entity.end_time,
            capacity: entity.capacity,
            points_total: entity.points_total,
            points_remain: entity.points_remain,
            points_awarded: entity.points_awarded,
            published: entity.published,
            created_at: entity.created_at,
        }
    }
}

/// List row with the guest count aggregated in SQL.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventListRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub points_total: i64,
    pub points_remain: i64,
    pub points_awarded: i64,
    pub published: bool,
    pub num_guests: i64,
}

/// Organizer/guest link row joined to the user's handle.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MemberRow {
    pub user_id: i64,
    pub utorid: String,
    pub name: Option<String>,
}

impl From<MemberRow> for UserSummary {
    fn from(row: MemberRow) -> Self {
        UserSummary {
            id: row.user_id,
            utorid: row.utorid,
            name: row.name,
        }
    }
}
