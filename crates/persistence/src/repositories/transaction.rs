//! Transaction repository: read paths and the redemption processing stamp.
//!
//! Inserts never happen here — every row is written through the ledger
//! primitive so balances and rows move together.

use sqlx::PgPool;

use crate::entities::{TransactionDetailRow, TransactionEntity};
use crate::metrics::QueryTimer;

const DETAIL_SELECT: &str = r#"
    SELECT t.id, t.user_id, u.utorid, t.kind, t.amount, t.spent, t.redeemed,
           t.related_id, t.remark, t.suspicious,
           cb.utorid AS created_by, pb.utorid AS processed_by,
           COALESCE(array_agg(tp.promotion_id)
                    FILTER (WHERE tp.promotion_id IS NOT NULL), '{}') AS promotion_ids
    FROM transactions t
    JOIN users u ON u.id = t.user_id
    JOIN users cb ON cb.id = t.created_by
    LEFT JOIN users pb ON pb.id = t.processed_by
    LEFT JOIN transaction_promotions tp ON tp.transaction_id = t.id
"#;

const DETAIL_GROUP: &str = "GROUP BY t.id, u.utorid, cb.utorid, pb.utorid";

/// Optional filters for transaction listings.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Restrict to one owner (the "my transactions" listing).
    pub owner_id: Option<i64>,
    /// Owner utorid/name fragment (manager listing).
    pub name: Option<String>,
    /// Creator utorid, exact.
    pub created_by: Option<String>,
    pub suspicious: Option<bool>,
    pub promotion_id: Option<i64>,
    pub kind: Option<String>,
    pub related_id: Option<i64>,
    pub amount: Option<i64>,
    /// True: amount <= filter; false: amount >= filter.
    pub amount_lte: bool,
}

/// Repository for transaction-record database operations.
#[derive(Clone)]
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a raw transaction row by ID.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<TransactionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_transaction_by_id");
        let result = sqlx::query_as::<_, TransactionEntity>(
            r#"
            SELECT id, user_id, kind, amount, spent, redeemed, related_id, remark,
                   suspicious, created_by, processed_by, created_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find the joined outward-shape row by ID.
    pub async fn find_detail(
        &self,
        id: i64,
    ) -> Result<Option<TransactionDetailRow>, sqlx::Error> {
        let timer = QueryTimer::new("find_transaction_detail");
        let sql = format!("{DETAIL_SELECT} WHERE t.id = $1 {DETAIL_GROUP}");
        let result = sqlx::query_as::<_, TransactionDetailRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// List transactions matching the filter, newest first.
    pub async fn list(
        &self,
        filter: &TransactionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<TransactionDetailRow>), sqlx::Error> {
        let timer = QueryTimer::new("list_transactions");

        let where_clause = r#"
            WHERE ($1::bigint IS NULL OR t.user_id = $1)
              AND ($2::text IS NULL OR u.utorid ILIKE '%' || $2 || '%'
                   OR u.name ILIKE '%' || $2 || '%')
              AND ($3::text IS NULL OR cb.utorid = $3)
              AND ($4::boolean IS NULL OR t.suspicious = $4)
              AND ($5::bigint IS NULL OR EXISTS (
                    SELECT 1 FROM transaction_promotions x
                    WHERE x.transaction_id = t.id AND x.promotion_id = $5))
              AND ($6::text IS NULL OR t.kind = $6)
              AND ($7::bigint IS NULL OR t.related_id = $7)
              AND ($8::bigint IS NULL OR
                   CASE WHEN $9 THEN t.amount <= $8 ELSE t.amount >= $8 END)
        "#;

        let count_sql = format!(
            r#"
            SELECT COUNT(*)
            FROM transactions t
            JOIN users u ON u.id = t.user_id
            JOIN users cb ON cb.id = t.created_by
            {where_clause}
            "#
        );
        let (count,): (i64,) = sqlx::query_as(&count_sql)
            .bind(filter.owner_id)
            .bind(filter.name.as_deref())
            .bind(filter.created_by.as_deref())
            .bind(filter.suspicious)
            .bind(filter.promotion_id)
            .bind(filter.kind.as_deref())
            .bind(filter.related_id)
            .bind(filter.amount)
            .bind(filter.amount_lte)
            .fetch_one(&self.pool)
            .await?;

        let list_sql = format!(
            "{DETAIL_SELECT} {where_clause} {DETAIL_GROUP} ORDER BY t.id DESC LIMIT $10 OFFSET $11"
        );
        let rows = sqlx::query_as::<_, TransactionDetailRow>(&list_sql)
            .bind(filter.owner_id)
            .bind(filter.name.as_deref())
            .bind(filter.created_by.as_deref())
            .bind(filter.suspicious)
            .bind(filter.promotion_id)
            .bind(filter.kind.as_deref())
            .bind(filter.related_id)
            .bind(filter.amount)
            .bind(filter.amount_lte)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        timer.record();
        Ok((count, rows))
    }

    /// Whether the user's history already lists this promotion. This is the
    /// one-time consumption record: no separate redemption table exists.
    pub async fn has_promotion_use(
        &self,
        user_id: i64,
        promotion_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("has_promotion_use");
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM transactions t
                JOIN transaction_promotions tp ON tp.transaction_id = t.id
                WHERE t.user_id = $1 AND tp.promotion_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(promotion_id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(exists)
    }

    /// Stamp a pending redemption as processed. The `processed_by IS NULL`
    /// guard makes concurrent double-processing lose the race cleanly;
    /// returns false when no pending row matched.
    pub async fn process_redemption(
        &self,
        id: i64,
        processor_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("process_redemption");
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET processed_by = $2
            WHERE id = $1 AND kind = 'redemption' AND processed_by IS NULL
            "#,
        )
        .bind(id)
        .bind(processor_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    /// Sum of a user's non-withheld transaction amounts. Used by tests to
    /// check the ledger consistency invariant against the stored balance.
    pub async fn ledger_sum(&self, user_id: i64) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("transaction_ledger_sum");
        let (sum,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount), 0)::bigint
            FROM transactions
            WHERE user_id = $1 AND suspicious = FALSE
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults_are_unbounded() {
        let filter = TransactionFilter::default();
        assert!(filter.owner_id.is_none());
        assert!(filter.kind.is_none());
        assert!(!filter.amount_lte);
    }
}
