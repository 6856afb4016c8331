//! Event domain models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::user::UserSummary;

/// Lifecycle phase, always computed from the injected `now` — never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Draft,
    Published,
    Ended,
}

/// An event with a point budget.
///
/// Budget invariant: `points_remain + points_awarded == points_total` after
/// every mutation, and `points_remain >= 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// NULL means unlimited.
    pub capacity: Option<i32>,
    pub points_total: i64,
    pub points_remain: i64,
    pub points_awarded: i64,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    pub fn phase(&self, now: DateTime<Utc>) -> EventPhase {
        if self.has_ended(now) {
            EventPhase::Ended
        } else if self.published {
            EventPhase::Published
        } else {
            EventPhase::Draft
        }
    }
}

/// POST /events body.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "location is required"))]
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    /// Initial point budget.
    pub points: i64,
}

/// PATCH /events/:id body. Only provided fields are touched; `points` and
/// `published` are manager-only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub points: Option<i64>,
    pub published: Option<bool>,
}

/// GET /events query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsQuery {
    pub name: Option<String>,
    pub location: Option<String>,
    pub started: Option<bool>,
    pub ended: Option<bool>,
    pub show_full: Option<bool>,
    pub published: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// POST /events/:id/guests and /organizers body.
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipRequest {
    pub utorid: String,
}

/// POST /events/:id/transactions body — an organizer point award.
/// Omitting `utorid` awards every current guest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub utorid: Option<String>,
    pub amount: i64,
    pub remark: Option<String>,
}

/// List-item shape. Budget fields are populated for managers and organizers
/// only and omitted from regular users' views.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub num_guests: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_remain: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_awarded: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

/// Detail shape. Guest list and budget fields are privileged.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub organizers: Vec<UserSummary>,
    pub num_guests: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_remain: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_awarded: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guests: Option<Vec<UserSummary>>,
}

/// Response for organizer additions: the refreshed organizer roster.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizersResponse {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub organizers: Vec<UserSummary>,
}

/// Response for guest additions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestAddedResponse {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub guest_added: UserSummary,
    pub num_guests: i64,
}

/// One credited award, echoed back per recipient.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardReceipt {
    pub id: i64,
    pub recipient: String,
    pub awarded: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub related_id: i64,
    pub remark: String,
    pub created_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(published: bool) -> Event {
        Event {
            id: 1,
            name: "Frosh Fair".to_string(),
            description: "Welcome-week fair".to_string(),
            location: "Front Campus".to_string(),
            start_time: Utc.with_ymd_and_hms(2025, 9, 2, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 9, 2, 18, 0, 0).unwrap(),
            capacity: Some(200),
            points_total: 1000,
            points_remain: 1000,
            points_awarded: 0,
            published,
            created_at: Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_phase_draft_until_published() {
        let before = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();
        assert_eq!(event(false).phase(before), EventPhase::Draft);
        assert_eq!(event(true).phase(before), EventPhase::Published);
    }

    #[test]
    fn test_phase_ended_at_end_time() {
        let ev = event(true);
        assert_eq!(ev.phase(ev.end_time), EventPhase::Ended);
        let after = Utc.with_ymd_and_hms(2025, 9, 3, 0, 0, 0).unwrap();
        assert_eq!(ev.phase(after), EventPhase::Ended);
    }

    #[test]
    fn test_started_boundary_is_inclusive() {
        let ev = event(true);
        assert!(ev.has_started(ev.start_time));
        assert!(!ev.has_started(ev.start_time - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_summary_hides_budget_for_regulars() {
        let summary = EventSummary {
            id: 1,
            name: "Frosh Fair".to_string(),
            location: "Front Campus".to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            capacity: None,
            num_guests: 3,
            points_remain: None,
            points_awarded: None,
            published: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("pointsRemain").is_none());
        assert!(json.get("published").is_none());
        assert_eq!(json["numGuests"], 3);
    }
}
