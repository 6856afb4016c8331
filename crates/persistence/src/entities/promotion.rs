//! Promotion entity.

use chrono::{DateTime, Utc};
use domain::models::promotion::{Promotion, PromotionKind};

/// Row mapping for the `promotions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromotionEntity {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub kind: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_spending: Option<f64>,
    pub rate: Option<f64>,
    pub points: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl PromotionEntity {
    pub fn kind(&self) -> PromotionKind {
        self.kind.parse().unwrap_or(PromotionKind::Automatic)
    }
}

impl From<PromotionEntity> for Promotion {
    fn from(entity: PromotionEntity) -> Self {
        let kind = entity.kind();
        Promotion {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            kind,
            start_time: entity.start_time,
            end_time: entity.end_time,
            min_spending: entity.min_spending,
            rate: entity.rate,
            points: entity.points,
        }
    }
}
