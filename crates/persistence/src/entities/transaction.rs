//! Transaction entities.

use chrono::{DateTime, Utc};
use domain::models::transaction::{TransactionKind, TransactionRecord};

/// Row mapping for the `transactions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionEntity {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub amount: i64,
    pub spent: Option<f64>,
    pub redeemed: Option<i64>,
    pub related_id: Option<i64>,
    pub remark: String,
    pub suspicious: bool,
    pub created_by: i64,
    pub processed_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TransactionEntity {
    pub fn kind(&self) -> TransactionKind {
        self.kind.parse().unwrap_or(TransactionKind::Adjustment)
    }
}

/// Joined row carrying the utorids and promotion ids the outward shape
/// needs: owner, creator and processor resolved to handles, promotion ids
/// aggregated from the join table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionDetailRow {
    pub id: i64,
    pub user_id: i64,
    pub utorid: String,
    pub kind: String,
    pub amount: i64,
    pub spent: Option<f64>,
    pub redeemed: Option<i64>,
    pub related_id: Option<i64>,
    pub remark: String,
    pub suspicious: bool,
    pub created_by: String,
    pub processed_by: Option<String>,
    pub promotion_ids: Vec<i64>,
}

impl From<TransactionDetailRow> for TransactionRecord {
    fn from(row: TransactionDetailRow) -> Self {
        let kind = row.kind.parse().unwrap_or(TransactionKind::Adjustment);
        TransactionRecord {
            id: row.id,
            utorid: row.utorid,
            kind,
            amount: row.amount,
            spent: row.spent,
            redeemed: row.redeemed,
            related_id: row.related_id,
            remark: row.remark,
            promotion_ids: row.promotion_ids,
            created_by: row.created_by,
            processed_by: row.processed_by,
            suspicious: row.suspicious,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_row_into_record() {
        let row = TransactionDetailRow {
            id: 5,
            user_id: 2,
            utorid: "loyal001".to_string(),
            kind: "purchase".to_string(),
            amount: 55,
            spent: Some(50.0),
            redeemed: None,
            related_id: None,
            remark: String::new(),
            suspicious: false,
            created_by: "cashier01".to_string(),
            processed_by: None,
            promotion_ids: vec![3],
        };
        let record: TransactionRecord = row.into();
        assert_eq!(record.kind, TransactionKind::Purchase);
        assert_eq!(record.promotion_ids, vec![3]);
        assert_eq!(record.created_by, "cashier01");
    }
}
