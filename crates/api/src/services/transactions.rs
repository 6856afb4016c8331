//! Transaction engine: the single entry point for every balance-affecting
//! operation outside event awards.
//!
//! Each operation validates, builds one `LedgerMutation`, and commits it
//! through the ledger primitive, so a row never exists without its balance
//! effect (or, for withheld purchases, its recorded absence).

use chrono::{DateTime, Utc};
use domain::models::transaction::{TransactionKind, TransactionRecord};
use domain::services::earning;
use persistence::entities::UserEntity;
use persistence::repositories::{
    LedgerError, LedgerMutation, LedgerRepository, TransactionDraft, TransactionRepository,
    UserRepository,
};
use sqlx::PgPool;
use tracing::info;

use super::promotions::PromotionEvaluator;
use super::EngineError;

pub struct TransactionEngine {
    pool: PgPool,
    earn_rate: f64,
}

impl TransactionEngine {
    pub fn new(pool: PgPool, earn_rate: f64) -> Self {
        Self { pool, earn_rate }
    }

    fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
    }

    fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new(self.pool.clone())
    }

    async fn detail(&self, id: i64) -> Result<TransactionRecord, EngineError> {
        let row = self
            .transactions()
            .find_detail(id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Transaction not found".to_string()))?;
        Ok(row.into())
    }

    /// Record a purchase: base points plus automatic and requested one-time
    /// promotion bonuses, one row, one balance increment. A suspicious
    /// cashier's purchase is recorded withheld: the row carries the flag and
    /// the credit waits for a manager to clear it.
    pub async fn record_purchase(
        &self,
        cashier: &UserEntity,
        buyer_utorid: &str,
        spent: f64,
        requested_promotions: &[i64],
        remark: String,
        now: DateTime<Utc>,
    ) -> Result<TransactionRecord, EngineError> {
        shared::validation::validate_spent(spent)
            .map_err(|e| EngineError::Validation(message_of(e)))?;

        let buyer = self
            .users()
            .find_by_utorid(buyer_utorid)
            .await?
            .ok_or_else(|| EngineError::NotFound("User must have an account".to_string()))?;

        let evaluator = PromotionEvaluator::new(self.pool.clone());
        let automatic = evaluator.eligible_automatic(spent, now).await?;
        let onetime = evaluator
            .resolve_requested(buyer.id, requested_promotions, spent, now)
            .await?;

        let amount = earning::base_points(spent, self.earn_rate)
            + automatic
                .iter()
                .map(|p| earning::automatic_bonus(p, spent))
                .sum::<i64>()
            + onetime.iter().map(earning::onetime_bonus).sum::<i64>();

        let mut promotion_ids: Vec<i64> = automatic
            .iter()
            .chain(onetime.iter())
            .map(|p| p.id)
            .collect();
        promotion_ids.sort_unstable();
        promotion_ids.dedup();

        let withheld = cashier.suspicious;
        let mut draft = TransactionDraft::new(buyer.id, TransactionKind::Purchase, amount, cashier.id);
        draft.spent = Some(spent);
        draft.remark = remark;
        draft.suspicious = withheld;
        draft.promotion_ids = promotion_ids;

        let mut mutation = LedgerMutation::default().with_row(draft);
        if !withheld {
            mutation = mutation.with_delta(buyer.id, amount);
        }

        let ids = self.ledger().apply(mutation).await?;

        info!(
            transaction_id = ids[0],
            buyer = %buyer.utorid,
            cashier = %cashier.utorid,
            amount,
            spent,
            withheld,
            "Purchase recorded"
        );

        self.detail(ids[0]).await
    }

    /// A user cashes out points. The balance is debited immediately; a
    /// cashier later stamps the row as processed.
    pub async fn request_redemption(
        &self,
        user: &UserEntity,
        amount: i64,
        remark: String,
    ) -> Result<TransactionRecord, EngineError> {
        shared::validation::validate_positive_amount(amount)
            .map_err(|e| EngineError::Validation(message_of(e)))?;
        if user.points < amount {
            return Err(EngineError::InsufficientBalance(
                "Requested redemption exceeds current balance".to_string(),
            ));
        }

        let mut draft = TransactionDraft::new(user.id, TransactionKind::Redemption, -amount, user.id);
        draft.redeemed = Some(amount);
        draft.remark = remark;

        let mutation = LedgerMutation::default()
            .with_row(draft)
            .with_delta(user.id, -amount);
        let ids = self.ledger().apply(mutation).await?;

        info!(
            transaction_id = ids[0],
            user = %user.utorid,
            amount,
            "Redemption requested"
        );

        self.detail(ids[0]).await
    }

    /// Cashier fulfils a pending redemption. The debit already happened at
    /// request time; this only stamps the processor.
    pub async fn process_redemption(
        &self,
        cashier: &UserEntity,
        transaction_id: i64,
    ) -> Result<TransactionRecord, EngineError> {
        let row = self
            .transactions()
            .find_by_id(transaction_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Transaction not found".to_string()))?;

        if row.kind() != TransactionKind::Redemption {
            return Err(EngineError::Validation(
                "Transaction is not a redemption".to_string(),
            ));
        }
        if row.processed_by.is_some() {
            return Err(EngineError::Conflict(
                "Redemption has already been processed".to_string(),
            ));
        }

        // The NULL guard in the update closes the race between two cashiers.
        let stamped = self
            .transactions()
            .process_redemption(transaction_id, cashier.id)
            .await?;
        if !stamped {
            return Err(EngineError::Conflict(
                "Redemption has already been processed".to_string(),
            ));
        }

        info!(
            transaction_id,
            cashier = %cashier.utorid,
            "Redemption processed"
        );

        self.detail(transaction_id).await
    }

    /// Manager adjustment: arbitrary signed amount, optionally referencing
    /// the transaction being corrected.
    pub async fn record_adjustment(
        &self,
        manager: &UserEntity,
        target_utorid: &str,
        amount: i64,
        related_id: Option<i64>,
        remark: String,
    ) -> Result<TransactionRecord, EngineError> {
        if amount == 0 {
            return Err(EngineError::Validation(
                "amount must be a non-zero integer".to_string(),
            ));
        }

        let target = self
            .users()
            .find_by_utorid(target_utorid)
            .await?
            .ok_or_else(|| EngineError::NotFound("User must have an account".to_string()))?;

        if let Some(reference) = related_id {
            let exists = self.transactions().find_by_id(reference).await?;
            if exists.is_none() {
                return Err(EngineError::NotFound(
                    "Related transaction not found".to_string(),
                ));
            }
        }

        let mut draft = TransactionDraft::new(target.id, TransactionKind::Adjustment, amount, manager.id);
        draft.related_id = related_id;
        draft.remark = remark;

        let mutation = LedgerMutation::default()
            .with_row(draft)
            .with_delta(target.id, amount);

        let ids = match self.ledger().apply(mutation).await {
            Ok(ids) => ids,
            // A negative adjustment below the floor is a malformed request,
            // not a balance failure.
            Err(LedgerError::InsufficientBalance { .. }) => {
                return Err(EngineError::Validation(
                    "Adjustment would drive the balance negative".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            transaction_id = ids[0],
            target = %target.utorid,
            manager = %manager.utorid,
            amount,
            "Adjustment recorded"
        );

        self.detail(ids[0]).await
    }

    /// Peer transfer: two legs created atomically, each pointing at the
    /// other party, both balances settled under ascending-id row locks.
    pub async fn record_transfer(
        &self,
        sender: &UserEntity,
        recipient_id: i64,
        amount: i64,
        remark: String,
    ) -> Result<TransactionRecord, EngineError> {
        shared::validation::validate_positive_amount(amount)
            .map_err(|e| EngineError::Validation(message_of(e)))?;
        if !sender.verified {
            return Err(EngineError::Forbidden(
                "Sender must be verified to transfer points".to_string(),
            ));
        }
        if sender.id == recipient_id {
            return Err(EngineError::Validation(
                "Cannot transfer points to yourself".to_string(),
            ));
        }
        let recipient = self
            .users()
            .find_by_id(recipient_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Recipient not found".to_string()))?;
        if sender.points < amount {
            return Err(EngineError::InsufficientBalance(
                "Transfer exceeds current balance".to_string(),
            ));
        }

        let mut debit = TransactionDraft::new(sender.id, TransactionKind::Transfer, -amount, sender.id);
        debit.related_id = Some(recipient.id);
        debit.remark = remark.clone();
        let mut credit =
            TransactionDraft::new(recipient.id, TransactionKind::Transfer, amount, sender.id);
        credit.related_id = Some(sender.id);
        credit.remark = remark;

        let mutation = LedgerMutation::default()
            .with_row(debit)
            .with_row(credit)
            .with_delta(sender.id, -amount)
            .with_delta(recipient.id, amount);
        let ids = self.ledger().apply(mutation).await?;

        info!(
            debit_id = ids[0],
            credit_id = ids[1],
            sender = %sender.utorid,
            recipient = %recipient.utorid,
            amount,
            "Transfer recorded"
        );

        // The sender's leg is the canonical receipt.
        self.detail(ids[0]).await
    }

    /// Manager toggles a transaction's suspicious flag. Flagging withholds
    /// the row's effect from the balance; clearing restores it.
    pub async fn set_suspicious(
        &self,
        manager: &UserEntity,
        transaction_id: i64,
        suspicious: bool,
    ) -> Result<TransactionRecord, EngineError> {
        // Distinguish unknown id from a legitimate no-op up front.
        self.transactions()
            .find_by_id(transaction_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Transaction not found".to_string()))?;

        let changed = self
            .ledger()
            .set_suspicious(transaction_id, suspicious)
            .await?;

        if changed {
            info!(
                transaction_id,
                manager = %manager.utorid,
                suspicious,
                "Suspicious flag updated"
            );
        }

        self.detail(transaction_id).await
    }
}

fn message_of(err: validator::ValidationError) -> String {
    err.message
        .map(|m| m.to_string())
        .unwrap_or_else(|| "invalid value".to_string())
}
