//! Promotion evaluator: which promotions apply to a purchase.
//!
//! The window and threshold predicates are pure domain logic; this service
//! adds the store lookups — active automatic promotions, and the one-time
//! consumption check against the user's transaction history.

use chrono::{DateTime, Utc};
use domain::models::promotion::{Promotion, PromotionKind};
use sqlx::PgPool;

use persistence::repositories::{PromotionRepository, TransactionRepository};

use super::EngineError;

pub struct PromotionEvaluator {
    promotions: PromotionRepository,
    transactions: TransactionRepository,
}

impl PromotionEvaluator {
    pub fn new(pool: PgPool) -> Self {
        Self {
            promotions: PromotionRepository::new(pool.clone()),
            transactions: TransactionRepository::new(pool),
        }
    }

    /// Automatic promotions qualifying for this purchase. Applied silently;
    /// the customer never has to name them.
    pub async fn eligible_automatic(
        &self,
        spent: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Promotion>, EngineError> {
        let active = self.promotions.active_automatic(now).await?;
        Ok(active
            .into_iter()
            .map(Promotion::from)
            .filter(|p| p.qualifies(spent, now))
            .collect())
    }

    /// Whether the user can still consume a one-time promotion at `now`.
    pub async fn can_consume_onetime(
        &self,
        user_id: i64,
        promotion: &Promotion,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        if !promotion.window_contains(now) {
            return Ok(false);
        }
        let used = self
            .transactions
            .has_promotion_use(user_id, promotion.id)
            .await?;
        Ok(!used)
    }

    /// Resolve explicitly requested promotion ids against this purchase.
    ///
    /// Returns the one-time promotions to apply. Requested automatic
    /// promotions are accepted when valid but contribute nothing here — the
    /// eligible_automatic sweep already covers them. Unknown ids are
    /// NotFound; expired, not-yet-started, threshold-unmet or
    /// already-consumed requests are validation failures.
    pub async fn resolve_requested(
        &self,
        user_id: i64,
        requested: &[i64],
        spent: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Promotion>, EngineError> {
        let mut ids: Vec<i64> = requested.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = self.promotions.find_many(&ids).await?;
        if found.len() != ids.len() {
            return Err(EngineError::NotFound(
                "One or more requested promotions do not exist".to_string(),
            ));
        }

        let mut onetime = Vec::new();
        for promotion in found.into_iter().map(Promotion::from) {
            if !promotion.window_contains(now) {
                return Err(EngineError::Validation(format!(
                    "Promotion {} is not active",
                    promotion.id
                )));
            }
            if !promotion.min_spending_met(spent) {
                return Err(EngineError::Validation(format!(
                    "Purchase does not meet the minimum spending for promotion {}",
                    promotion.id
                )));
            }
            match promotion.kind {
                PromotionKind::OneTime => {
                    let used = self
                        .transactions
                        .has_promotion_use(user_id, promotion.id)
                        .await?;
                    if used {
                        return Err(EngineError::Validation(format!(
                            "Promotion {} has already been used",
                            promotion.id
                        )));
                    }
                    onetime.push(promotion);
                }
                // Valid but redundant: the automatic sweep applies it.
                PromotionKind::Automatic => {}
            }
        }

        Ok(onetime)
    }
}
