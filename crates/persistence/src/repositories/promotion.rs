//! Promotion repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::entities::PromotionEntity;
use crate::metrics::QueryTimer;

const PROMOTION_COLUMNS: &str = "id, name, description, kind, start_time, end_time, \
                                 min_spending, rate, points, created_at";

/// Repository for promotion database operations.
#[derive(Clone)]
pub struct PromotionRepository {
    pool: PgPool,
}

impl PromotionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<PromotionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_promotion_by_id");
        let result = sqlx::query_as::<_, PromotionEntity>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Fetch several promotions at once (requested one-time ids on a
    /// purchase). Order follows the input ids' ascending order, not request
    /// order.
    pub async fn find_many(&self, ids: &[i64]) -> Result<Vec<PromotionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_promotions_by_ids");
        let result = sqlx::query_as::<_, PromotionEntity>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Every automatic promotion whose window contains `now`. Min-spending
    /// qualification happens in the domain layer against the purchase.
    pub async fn active_automatic(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<PromotionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("active_automatic_promotions");
        let result = sqlx::query_as::<_, PromotionEntity>(&format!(
            r#"
            SELECT {PROMOTION_COLUMNS}
            FROM promotions
            WHERE kind = 'automatic' AND start_time <= $1 AND end_time > $1
            ORDER BY id
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn create(
        &self,
        name: &str,
        description: &str,
        kind: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        min_spending: Option<f64>,
        rate: Option<f64>,
        points: Option<i64>,
    ) -> Result<PromotionEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_promotion");
        let result = sqlx::query_as::<_, PromotionEntity>(&format!(
            r#"
            INSERT INTO promotions
                (name, description, kind, start_time, end_time, min_spending, rate, points)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PROMOTION_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(description)
        .bind(kind)
        .bind(start_time)
        .bind(end_time)
        .bind(min_spending)
        .bind(rate)
        .bind(points)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Partial update; only non-NULL arguments are applied.
    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
        kind: Option<&str>,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        min_spending: Option<f64>,
        rate: Option<f64>,
        points: Option<i64>,
    ) -> Result<Option<PromotionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_promotion");
        let result = sqlx::query_as::<_, PromotionEntity>(&format!(
            r#"
            UPDATE promotions
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                kind = COALESCE($4, kind),
                start_time = COALESCE($5, start_time),
                end_time = COALESCE($6, end_time),
                min_spending = COALESCE($7, min_spending),
                rate = COALESCE($8, rate),
                points = COALESCE($9, points)
            WHERE id = $1
            RETURNING {PROMOTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(kind)
        .bind(start_time)
        .bind(end_time)
        .bind(min_spending)
        .bind(rate)
        .bind(points)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_promotion");
        let result = sqlx::query("DELETE FROM promotions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    /// Manager listing: every promotion, with optional filters.
    pub async fn list(
        &self,
        name: Option<&str>,
        kind: Option<&str>,
        started: Option<bool>,
        ended: Option<bool>,
        now: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<PromotionEntity>), sqlx::Error> {
        let timer = QueryTimer::new("list_promotions");

        let where_clause = r#"
            WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR kind = $2)
              AND ($3::boolean IS NULL OR (start_time <= $5) = $3)
              AND ($4::boolean IS NULL OR (end_time <= $5) = $4)
        "#;

        let (count,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM promotions {where_clause}"))
                .bind(name)
                .bind(kind)
                .bind(started)
                .bind(ended)
                .bind(now)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query_as::<_, PromotionEntity>(&format!(
            r#"
            SELECT {PROMOTION_COLUMNS}
            FROM promotions
            {where_clause}
            ORDER BY id ASC
            LIMIT $6 OFFSET $7
            "#
        ))
        .bind(name)
        .bind(kind)
        .bind(started)
        .bind(ended)
        .bind(now)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        timer.record();
        Ok((count, rows))
    }

    /// Regular-user listing: promotions active at `now`, excluding one-time
    /// promotions the user has already consumed.
    pub async fn list_available(
        &self,
        user_id: i64,
        name: Option<&str>,
        kind: Option<&str>,
        now: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<PromotionEntity>), sqlx::Error> {
        let timer = QueryTimer::new("list_available_promotions");

        let where_clause = r#"
            WHERE start_time <= $2 AND end_time > $2
              AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%')
              AND ($4::text IS NULL OR kind = $4)
              AND NOT (kind = 'onetime' AND EXISTS (
                    SELECT 1
                    FROM transactions t
                    JOIN transaction_promotions tp ON tp.transaction_id = t.id
                    WHERE t.user_id = $1 AND tp.promotion_id = promotions.id))
        "#;

        let (count,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM promotions {where_clause}"))
                .bind(user_id)
                .bind(now)
                .bind(name)
                .bind(kind)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query_as::<_, PromotionEntity>(&format!(
            r#"
            SELECT {PROMOTION_COLUMNS}
            FROM promotions
            {where_clause}
            ORDER BY id ASC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(user_id)
        .bind(now)
        .bind(name)
        .bind(kind)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        timer.record();
        Ok((count, rows))
    }
}
