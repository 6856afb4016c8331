//! Transaction domain models and DTOs.
//!
//! Transaction records are append-only: once created, amount, kind and owner
//! never change. Post-creation updates are limited to the suspicious flag
//! and, for redemptions, the processing stamp.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five balance-affecting operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Purchase,
    Redemption,
    Adjustment,
    Transfer,
    Event,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Purchase => "purchase",
            TransactionKind::Redemption => "redemption",
            TransactionKind::Adjustment => "adjustment",
            TransactionKind::Transfer => "transfer",
            TransactionKind::Event => "event",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "purchase" => Ok(TransactionKind::Purchase),
            "redemption" => Ok(TransactionKind::Redemption),
            "adjustment" => Ok(TransactionKind::Adjustment),
            "transfer" => Ok(TransactionKind::Transfer),
            "event" => Ok(TransactionKind::Event),
            _ => Err(format!("Invalid transaction type: {}", s)),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outward transaction shape.
///
/// `utorid` names the owning user; `created_by`/`processed_by` carry the
/// acting principals' utorids, not ids.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: i64,
    pub utorid: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<i64>,
    pub remark: String,
    pub promotion_ids: Vec<i64>,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<String>,
    pub suspicious: bool,
}

/// POST /transactions body — dispatches to purchase or adjustment by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub utorid: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Purchase: currency spent, two decimals.
    pub spent: Option<f64>,
    /// Adjustment: signed point amount.
    pub amount: Option<i64>,
    /// Adjustment: prior transaction this one corrects.
    pub related_id: Option<i64>,
    /// Purchase: one-time promotions the customer wants applied.
    pub promotion_ids: Option<Vec<i64>>,
    pub remark: Option<String>,
}

/// POST /users/me/transactions body — a redemption request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: i64,
    pub remark: Option<String>,
}

/// POST /users/:userId/transactions body — a peer transfer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: i64,
    pub remark: Option<String>,
}

/// PATCH /transactions/:id/suspicious body.
#[derive(Debug, Clone, Deserialize)]
pub struct SetSuspiciousRequest {
    pub suspicious: bool,
}

/// PATCH /transactions/:id/processed body.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessRequest {
    pub processed: bool,
}

/// Comparison operator for the amount filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountOperator {
    Gte,
    Lte,
}

/// GET /transactions and GET /users/me/transactions query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsQuery {
    /// Owner utorid or name fragment (manager listing only).
    pub name: Option<String>,
    pub created_by: Option<String>,
    pub suspicious: Option<bool>,
    pub promotion_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub related_id: Option<i64>,
    pub amount: Option<i64>,
    pub operator: Option<AmountOperator>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
