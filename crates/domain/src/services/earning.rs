//! Points earning math for purchases.
//!
//! All rounding is floor, applied independently to the base and to each
//! promotion bonus; results are integer points. Callers pass `now`
//! explicitly so eligibility windows are deterministic under test.

use chrono::{DateTime, Utc};

use crate::models::promotion::{Promotion, PromotionKind};

/// Base points for a purchase: floor(spent × earn_rate).
pub fn base_points(spent: f64, earn_rate: f64) -> i64 {
    (spent * earn_rate).floor() as i64
}

/// Bonus from one automatic promotion: floor(spent × rate).
pub fn automatic_bonus(promotion: &Promotion, spent: f64) -> i64 {
    match promotion.rate {
        Some(rate) => (spent * rate).floor() as i64,
        None => 0,
    }
}

/// Summed bonus across every qualifying automatic promotion. Stacking is
/// additive; non-qualifying and one-time promotions contribute nothing here.
pub fn stacked_automatic_bonus(
    promotions: &[Promotion],
    spent: f64,
    now: DateTime<Utc>,
) -> i64 {
    promotions
        .iter()
        .filter(|p| p.kind == PromotionKind::Automatic && p.qualifies(spent, now))
        .map(|p| automatic_bonus(p, spent))
        .sum()
}

/// Fixed bonus of a one-time promotion.
pub fn onetime_bonus(promotion: &Promotion) -> i64 {
    promotion.points.unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn automatic(id: i64, rate: f64, min_spending: Option<f64>) -> Promotion {
        Promotion {
            id,
            name: format!("auto-{id}"),
            description: String::new(),
            kind: PromotionKind::Automatic,
            start_time: Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap(),
            min_spending,
            rate: Some(rate),
            points: None,
        }
    }

    fn in_window() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_base_points_floors() {
        assert_eq!(base_points(50.0, 1.0), 50);
        assert_eq!(base_points(19.99, 1.0), 19);
        assert_eq!(base_points(0.99, 1.0), 0);
        assert_eq!(base_points(10.0, 0.5), 5);
    }

    #[test]
    fn test_automatic_bonus_floors_per_promotion() {
        let p = automatic(1, 0.1, None);
        assert_eq!(automatic_bonus(&p, 50.0), 5);
        assert_eq!(automatic_bonus(&p, 19.99), 1);
        assert_eq!(automatic_bonus(&p, 9.0), 0);
    }

    #[test]
    fn test_stacking_is_additive() {
        let promos = vec![automatic(1, 0.1, None), automatic(2, 0.2, None)];
        // floor(50*0.1) + floor(50*0.2) = 5 + 10
        assert_eq!(stacked_automatic_bonus(&promos, 50.0, in_window()), 15);
    }

    #[test]
    fn test_stacking_skips_unmet_threshold() {
        let promos = vec![automatic(1, 0.1, Some(25.0)), automatic(2, 0.2, Some(40.0))];
        assert_eq!(stacked_automatic_bonus(&promos, 30.0, in_window()), 3);
    }

    #[test]
    fn test_stacking_skips_outside_window() {
        let promos = vec![automatic(1, 0.1, None)];
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(stacked_automatic_bonus(&promos, 100.0, after), 0);
    }

    #[test]
    fn test_fifty_dollar_purchase_with_ten_percent_bonus() {
        // $50 purchase, one automatic 10% promotion with $25 minimum:
        // floor(50) + floor(50 * 0.10) = 55 total.
        let promos = vec![automatic(1, 0.1, Some(25.0))];
        let total = base_points(50.0, 1.0) + stacked_automatic_bonus(&promos, 50.0, in_window());
        assert_eq!(total, 55);
    }

    #[test]
    fn test_onetime_bonus_fixed_value() {
        let p = Promotion {
            id: 9,
            name: "Frosh Surprise".to_string(),
            description: String::new(),
            kind: PromotionKind::OneTime,
            start_time: Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
            min_spending: Some(50.0),
            rate: None,
            points: Some(300),
        };
        assert_eq!(onetime_bonus(&p), 300);
    }
}
