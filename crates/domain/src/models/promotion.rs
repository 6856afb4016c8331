//! Promotion domain models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Promotion kinds.
///
/// Automatic promotions apply silently to every qualifying purchase inside
/// their window; one-time promotions are consumed at most once per user,
/// tracked through the user's transaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionKind {
    #[serde(rename = "automatic")]
    Automatic,
    #[serde(rename = "onetime")]
    OneTime,
}

impl PromotionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionKind::Automatic => "automatic",
            PromotionKind::OneTime => "onetime",
        }
    }
}

impl FromStr for PromotionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "automatic" => Ok(PromotionKind::Automatic),
            "onetime" | "one-time" => Ok(PromotionKind::OneTime),
            _ => Err(format!("Invalid promotion type: {}", s)),
        }
    }
}

impl fmt::Display for PromotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A promotion definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: PromotionKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_spending: Option<f64>,
    /// Fractional bonus per currency unit spent (automatic only).
    pub rate: Option<f64>,
    /// Fixed bonus points (one-time only).
    pub points: Option<i64>,
}

impl Promotion {
    /// Whether `now` falls inside the half-open active window.
    pub fn window_contains(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now < self.end_time
    }

    /// Whether the spend threshold (if any) is met.
    pub fn min_spending_met(&self, spent: f64) -> bool {
        self.min_spending.map_or(true, |min| spent >= min)
    }

    /// Window plus threshold in one check.
    pub fn qualifies(&self, spent: f64, now: DateTime<Utc>) -> bool {
        self.window_contains(now) && self.min_spending_met(spent)
    }
}

/// POST /promotions body.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromotionRequest {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_spending: Option<f64>,
    pub rate: Option<f64>,
    pub points: Option<i64>,
}

/// PATCH /promotions/:id body. Only provided fields are touched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePromotionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub min_spending: Option<f64>,
    pub rate: Option<f64>,
    pub points: Option<i64>,
}

/// GET /promotions query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPromotionsQuery {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub started: Option<bool>,
    pub ended: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn promo(min_spending: Option<f64>) -> Promotion {
        Promotion {
            id: 1,
            name: "Campus Starter Pack".to_string(),
            description: "10% extra on bookstore purchases".to_string(),
            kind: PromotionKind::Automatic,
            start_time: Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap(),
            min_spending,
            rate: Some(0.1),
            points: None,
        }
    }

    #[test]
    fn test_kind_roundtrip() {
        assert_eq!(
            PromotionKind::from_str("automatic").unwrap(),
            PromotionKind::Automatic
        );
        assert_eq!(
            PromotionKind::from_str("onetime").unwrap(),
            PromotionKind::OneTime
        );
        assert!(PromotionKind::from_str("weekly").is_err());
    }

    #[test]
    fn test_kind_serde_rename() {
        assert_eq!(
            serde_json::to_string(&PromotionKind::OneTime).unwrap(),
            "\"onetime\""
        );
    }

    #[test]
    fn test_window_is_half_open() {
        let p = promo(None);
        assert!(p.window_contains(p.start_time));
        assert!(!p.window_contains(p.end_time));
        let inside = Utc.with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap();
        assert!(p.window_contains(inside));
    }

    #[test]
    fn test_min_spending_gate() {
        let p = promo(Some(25.0));
        assert!(p.min_spending_met(25.0));
        assert!(p.min_spending_met(50.0));
        assert!(!p.min_spending_met(24.99));
        assert!(promo(None).min_spending_met(0.0));
    }

    #[test]
    fn test_qualifies_combines_both() {
        let p = promo(Some(25.0));
        let inside = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(p.qualifies(30.0, inside));
        assert!(!p.qualifies(10.0, inside));
        assert!(!p.qualifies(30.0, outside));
    }
}
