//! The atomic multi-row ledger mutation primitive.
//!
//! Every balance-affecting operation — purchase, redemption, adjustment,
//! transfer legs, event award fan-out — is expressed as one `LedgerMutation`
//! (transaction rows to insert, balance deltas to apply, optional event
//! budget draw) and committed in a single database transaction. Row locks
//! are always taken in a fixed global order (the event row first, then user
//! rows in ascending id) so two operations touching the same rows in
//! opposite directions cannot deadlock.

use domain::models::transaction::TransactionKind;
use sqlx::PgPool;
use thiserror::Error;

use crate::metrics::QueryTimer;

/// A transaction row to insert.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub user_id: i64,
    pub kind: TransactionKind,
    pub amount: i64,
    pub spent: Option<f64>,
    pub redeemed: Option<i64>,
    pub related_id: Option<i64>,
    pub remark: String,
    pub suspicious: bool,
    pub created_by: i64,
    pub promotion_ids: Vec<i64>,
}

impl TransactionDraft {
    pub fn new(user_id: i64, kind: TransactionKind, amount: i64, created_by: i64) -> Self {
        Self {
            user_id,
            kind,
            amount,
            spent: None,
            redeemed: None,
            related_id: None,
            remark: String::new(),
            suspicious: false,
            created_by,
            promotion_ids: Vec::new(),
        }
    }
}

/// A signed points delta against one user's stored balance.
#[derive(Debug, Clone, Copy)]
pub struct BalanceDelta {
    pub user_id: i64,
    pub delta: i64,
}

/// A draw against an event's point budget.
#[derive(Debug, Clone, Copy)]
pub struct BudgetDraw {
    pub event_id: i64,
    pub total: i64,
}

/// One atomic unit of ledger work.
#[derive(Debug, Clone, Default)]
pub struct LedgerMutation {
    pub rows: Vec<TransactionDraft>,
    pub deltas: Vec<BalanceDelta>,
    pub budget: Option<BudgetDraw>,
}

impl LedgerMutation {
    pub fn with_row(mut self, row: TransactionDraft) -> Self {
        self.rows.push(row);
        self
    }

    pub fn with_delta(mut self, user_id: i64, delta: i64) -> Self {
        self.deltas.push(BalanceDelta { user_id, delta });
        self
    }

    pub fn with_budget(mut self, event_id: i64, total: i64) -> Self {
        self.budget = Some(BudgetDraw { event_id, total });
        self
    }
}

/// Ledger failures. Business-rule rejections are checked under row locks
/// before anything is written, so an error always means nothing changed.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("balance of user {user_id} would drop below zero")]
    InsufficientBalance { user_id: i64 },

    #[error("event {event_id} has {remain} points remaining, {needed} needed")]
    InsufficientBudget {
        event_id: i64,
        remain: i64,
        needed: i64,
    },

    #[error("referenced row does not exist")]
    MissingRow,

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Repository owning the commit-or-abort boundary for ledger mutations.
#[derive(Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies one mutation atomically and returns the inserted row ids in
    /// draft order.
    ///
    /// Order of work inside the transaction:
    /// 1. lock the event row (if any) and check the budget against the full
    ///    draw, once, before any write;
    /// 2. lock every affected user row `ORDER BY id FOR UPDATE` and check
    ///    each resulting balance stays non-negative;
    /// 3. insert rows and promotion links, apply deltas, move the budget.
    pub async fn apply(&self, mutation: LedgerMutation) -> Result<Vec<i64>, LedgerError> {
        let timer = QueryTimer::new("ledger_apply");
        let result = self.apply_inner(mutation).await;
        timer.record();
        result
    }

    async fn apply_inner(&self, mutation: LedgerMutation) -> Result<Vec<i64>, LedgerError> {
        let mut tx = self.pool.begin().await?;

        if let Some(draw) = mutation.budget {
            let row: Option<(i64,)> =
                sqlx::query_as("SELECT points_remain FROM events WHERE id = $1 FOR UPDATE")
                    .bind(draw.event_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let remain = row.ok_or(LedgerError::MissingRow)?.0;
            if remain < draw.total {
                return Err(LedgerError::InsufficientBudget {
                    event_id: draw.event_id,
                    remain,
                    needed: draw.total,
                });
            }
        }

        // Net delta per user; BTreeMap keeps the lock order ascending.
        let mut net: std::collections::BTreeMap<i64, i64> = std::collections::BTreeMap::new();
        for delta in &mutation.deltas {
            *net.entry(delta.user_id).or_insert(0) += delta.delta;
        }
        let user_ids: Vec<i64> = net.keys().copied().collect();

        if !user_ids.is_empty() {
            let locked: Vec<(i64, i64)> = sqlx::query_as(
                "SELECT id, points FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            )
            .bind(&user_ids)
            .fetch_all(&mut *tx)
            .await?;
            if locked.len() != user_ids.len() {
                return Err(LedgerError::MissingRow);
            }
            for (user_id, points) in locked {
                if points + net[&user_id] < 0 {
                    return Err(LedgerError::InsufficientBalance { user_id });
                }
            }
        }

        let mut inserted = Vec::with_capacity(mutation.rows.len());
        for draft in &mutation.rows {
            let (id,): (i64,) = sqlx::query_as(
                r#"
                INSERT INTO transactions
                    (user_id, kind, amount, spent, redeemed, related_id, remark,
                     suspicious, created_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id
                "#,
            )
            .bind(draft.user_id)
            .bind(draft.kind.as_str())
            .bind(draft.amount)
            .bind(draft.spent)
            .bind(draft.redeemed)
            .bind(draft.related_id)
            .bind(&draft.remark)
            .bind(draft.suspicious)
            .bind(draft.created_by)
            .fetch_one(&mut *tx)
            .await?;

            for promotion_id in &draft.promotion_ids {
                sqlx::query(
                    r#"
                    INSERT INTO transaction_promotions (transaction_id, promotion_id)
                    VALUES ($1, $2)
                    "#,
                )
                .bind(id)
                .bind(promotion_id)
                .execute(&mut *tx)
                .await?;
            }

            inserted.push(id);
        }

        for (user_id, delta) in &net {
            if *delta != 0 {
                sqlx::query("UPDATE users SET points = points + $2 WHERE id = $1")
                    .bind(user_id)
                    .bind(delta)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        if let Some(draw) = mutation.budget {
            sqlx::query(
                r#"
                UPDATE events
                SET points_remain = points_remain - $2,
                    points_awarded = points_awarded + $2
                WHERE id = $1
                "#,
            )
            .bind(draw.event_id)
            .bind(draw.total)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Flips a transaction's suspicious flag and settles the owner's balance
    /// in the same transaction: flagging debits the row amount, clearing
    /// credits it. Returns false when the flag already had the requested
    /// value (no-op).
    pub async fn set_suspicious(
        &self,
        transaction_id: i64,
        suspicious: bool,
    ) -> Result<bool, LedgerError> {
        let timer = QueryTimer::new("ledger_set_suspicious");
        let result = self.set_suspicious_inner(transaction_id, suspicious).await;
        timer.record();
        result
    }

    async fn set_suspicious_inner(
        &self,
        transaction_id: i64,
        suspicious: bool,
    ) -> Result<bool, LedgerError> {
        let mut tx = self.pool.begin().await?;

        // Transaction row first, then the user row: the fixed order here
        // never crosses apply(), which locks user rows only.
        let row: Option<(i64, i64, bool)> = sqlx::query_as(
            "SELECT user_id, amount, suspicious FROM transactions WHERE id = $1 FOR UPDATE",
        )
        .bind(transaction_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (user_id, amount, current) = row.ok_or(LedgerError::MissingRow)?;

        if current == suspicious {
            tx.commit().await?;
            return Ok(false);
        }

        // Flagging withholds the row's effect; clearing restores it.
        let delta = if suspicious { -amount } else { amount };

        let (points,): (i64,) =
            sqlx::query_as("SELECT points FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        if points + delta < 0 {
            return Err(LedgerError::InsufficientBalance { user_id });
        }

        sqlx::query("UPDATE transactions SET suspicious = $2 WHERE id = $1")
            .bind(transaction_id)
            .bind(suspicious)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE users SET points = points + $2 WHERE id = $1")
            .bind(user_id)
            .bind(delta)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
