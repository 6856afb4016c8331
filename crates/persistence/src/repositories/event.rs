//! Event repository: event rows plus the organizer/guest link tables.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::entities::{EventEntity, EventListRow, MemberRow};
use crate::metrics::QueryTimer;

const EVENT_COLUMNS: &str = "id, name, description, location, start_time, end_time, capacity, \
                             points_total, points_remain, points_awarded, published, created_at";

/// Repository for event database operations.
#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_event_by_id");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn create(
        &self,
        name: &str,
        description: &str,
        location: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        capacity: Option<i32>,
        points: i64,
    ) -> Result<EventEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_event");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            INSERT INTO events
                (name, description, location, start_time, end_time, capacity,
                 points_total, points_remain)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(description)
        .bind(location)
        .bind(start_time)
        .bind(end_time)
        .bind(capacity)
        .bind(points)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Partial update of descriptive fields; only non-NULL arguments are
    /// applied. Budget and published changes go through their own methods.
    pub async fn update_fields(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
        location: Option<&str>,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        capacity: Option<i32>,
    ) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_event_fields");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            UPDATE events
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                location = COALESCE($4, location),
                start_time = COALESCE($5, start_time),
                end_time = COALESCE($6, end_time),
                capacity = COALESCE($7, capacity)
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(location)
        .bind(start_time)
        .bind(end_time)
        .bind(capacity)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Rewrite the point budget keeping the invariant
    /// `points_remain + points_awarded == points_total`. The event row lock
    /// makes the recompute race-free against concurrent awards, so the
    /// below-awarded check re-runs here even though callers validate first.
    pub async fn update_points_total(
        &self,
        id: i64,
        new_total: i64,
    ) -> Result<PointsTotalUpdate, sqlx::Error> {
        let timer = QueryTimer::new("update_event_points_total");
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64,)> =
            sqlx::query_as("SELECT points_awarded FROM events WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((awarded,)) = row else {
            tx.commit().await?;
            timer.record();
            return Ok(PointsTotalUpdate::Missing);
        };
        if new_total < awarded {
            tx.commit().await?;
            timer.record();
            return Ok(PointsTotalUpdate::BelowAwarded { awarded });
        }

        let entity = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            UPDATE events
            SET points_total = $2, points_remain = $2 - points_awarded
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(new_total)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(PointsTotalUpdate::Updated(entity))
    }

    pub async fn set_published(&self, id: i64) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("publish_event");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            "UPDATE events SET published = TRUE WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Delete an event and its link rows. The caller enforces the
    /// unpublished-only rule; link rows go via ON DELETE CASCADE.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_event");
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    /// List events with optional filters, ascending id. `published` filters
    /// visibility; `show_full` compares guest count against capacity.
    #[allow(clippy::too_many_arguments)]
    pub async fn list(
        &self,
        name: Option<&str>,
        location: Option<&str>,
        started: Option<bool>,
        ended: Option<bool>,
        show_full: Option<bool>,
        published: Option<bool>,
        now: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<EventListRow>), sqlx::Error> {
        let timer = QueryTimer::new("list_events");

        let base = r#"
            FROM events e
            LEFT JOIN LATERAL (
                SELECT COUNT(*)::bigint AS num_guests
                FROM event_guests g WHERE g.event_id = e.id
            ) gc ON TRUE
            WHERE ($1::text IS NULL OR e.name ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR e.location ILIKE '%' || $2 || '%')
              AND ($3::boolean IS NULL OR (e.start_time <= $7) = $3)
              AND ($4::boolean IS NULL OR (e.end_time <= $7) = $4)
              AND ($5::boolean IS NULL OR
                   (e.capacity IS NOT NULL AND gc.num_guests >= e.capacity) = $5)
              AND ($6::boolean IS NULL OR e.published = $6)
        "#;

        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) {base}"))
            .bind(name)
            .bind(location)
            .bind(started)
            .bind(ended)
            .bind(show_full)
            .bind(published)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, EventListRow>(&format!(
            r#"
            SELECT e.id, e.name, e.description, e.location, e.start_time, e.end_time,
                   e.capacity, e.points_total, e.points_remain, e.points_awarded,
                   e.published, gc.num_guests
            {base}
            ORDER BY e.id ASC
            LIMIT $8 OFFSET $9
            "#
        ))
        .bind(name)
        .bind(location)
        .bind(started)
        .bind(ended)
        .bind(show_full)
        .bind(published)
        .bind(now)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        timer.record();
        Ok((count, rows))
    }

    /// Events the user organizes, with optional name/location filters.
    pub async fn list_organized_by(
        &self,
        user_id: i64,
        name: Option<&str>,
        location: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<EventListRow>), sqlx::Error> {
        let timer = QueryTimer::new("list_organized_events");

        let base = r#"
            FROM events e
            JOIN event_organizers o ON o.event_id = e.id AND o.user_id = $1
            LEFT JOIN LATERAL (
                SELECT COUNT(*)::bigint AS num_guests
                FROM event_guests g WHERE g.event_id = e.id
            ) gc ON TRUE
            WHERE ($2::text IS NULL OR e.name ILIKE '%' || $2 || '%')
              AND ($3::text IS NULL OR e.location ILIKE '%' || $3 || '%')
        "#;

        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) {base}"))
            .bind(user_id)
            .bind(name)
            .bind(location)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, EventListRow>(&format!(
            r#"
            SELECT e.id, e.name, e.description, e.location, e.start_time, e.end_time,
                   e.capacity, e.points_total, e.points_remain, e.points_awarded,
                   e.published, gc.num_guests
            {base}
            ORDER BY e.start_time ASC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(user_id)
        .bind(name)
        .bind(location)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        timer.record();
        Ok((count, rows))
    }

    pub async fn organizers(&self, event_id: i64) -> Result<Vec<MemberRow>, sqlx::Error> {
        let timer = QueryTimer::new("event_organizers");
        let result = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT o.user_id, u.utorid, u.name
            FROM event_organizers o
            JOIN users u ON u.id = o.user_id
            WHERE o.event_id = $1
            ORDER BY u.utorid ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn guests(&self, event_id: i64) -> Result<Vec<MemberRow>, sqlx::Error> {
        let timer = QueryTimer::new("event_guests");
        let result = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT g.user_id, u.utorid, u.name
            FROM event_guests g
            JOIN users u ON u.id = g.user_id
            WHERE g.event_id = $1
            ORDER BY u.utorid ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Whether the user organizes any event at all.
    pub async fn organizes_any(&self, user_id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("organizes_any_event");
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM event_organizers WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(exists)
    }

    pub async fn is_organizer(&self, event_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("is_event_organizer");
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM event_organizers WHERE event_id = $1 AND user_id = $2)",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(exists)
    }

    pub async fn is_guest(&self, event_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("is_event_guest");
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM event_guests WHERE event_id = $1 AND user_id = $2)",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(exists)
    }

    pub async fn guest_count(&self, event_id: i64) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("event_guest_count");
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM event_guests WHERE event_id = $1")
                .bind(event_id)
                .fetch_one(&self.pool)
                .await?;
        timer.record();
        Ok(count)
    }

    /// Add an organizer; idempotent. Returns false when the link existed.
    pub async fn add_organizer(&self, event_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("add_event_organizer");
        let result = sqlx::query(
            r#"
            INSERT INTO event_organizers (event_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    /// Add a guest under the capacity check, atomically: the event row lock
    /// serializes concurrent RSVPs so the count cannot slip past capacity.
    /// Returns (added, guest count after).
    pub async fn add_guest_checked(
        &self,
        event_id: i64,
        user_id: i64,
    ) -> Result<GuestInsert, sqlx::Error> {
        let timer = QueryTimer::new("add_event_guest");
        let mut tx = self.pool.begin().await?;

        let row: Option<(Option<i32>,)> =
            sqlx::query_as("SELECT capacity FROM events WHERE id = $1 FOR UPDATE")
                .bind(event_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((capacity,)) = row else {
            tx.commit().await?;
            timer.record();
            return Ok(GuestInsert::EventMissing);
        };

        let (current,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM event_guests WHERE event_id = $1")
                .bind(event_id)
                .fetch_one(&mut *tx)
                .await?;

        let already: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM event_guests WHERE event_id = $1 AND user_id = $2)",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        if already.0 {
            tx.commit().await?;
            timer.record();
            return Ok(GuestInsert::AlreadyGuest { num_guests: current });
        }

        if let Some(cap) = capacity {
            if current >= cap as i64 {
                tx.commit().await?;
                timer.record();
                return Ok(GuestInsert::Full);
            }
        }

        sqlx::query("INSERT INTO event_guests (event_id, user_id) VALUES ($1, $2)")
            .bind(event_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        timer.record();
        Ok(GuestInsert::Added {
            num_guests: current + 1,
        })
    }

    /// Idempotent delete; returns whether a row was removed.
    pub async fn remove_guest(&self, event_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("remove_event_guest");
        let result = sqlx::query("DELETE FROM event_guests WHERE event_id = $1 AND user_id = $2")
            .bind(event_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    /// Idempotent delete; returns whether a row was removed.
    pub async fn remove_organizer(
        &self,
        event_id: i64,
        user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("remove_event_organizer");
        let result =
            sqlx::query("DELETE FROM event_organizers WHERE event_id = $1 AND user_id = $2")
                .bind(event_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }
}

/// Outcome of a capacity-checked guest insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestInsert {
    Added { num_guests: i64 },
    AlreadyGuest { num_guests: i64 },
    Full,
    EventMissing,
}

/// Outcome of a points-total rewrite.
#[derive(Debug, Clone)]
pub enum PointsTotalUpdate {
    Updated(EventEntity),
    BelowAwarded { awarded: i64 },
    Missing,
}
