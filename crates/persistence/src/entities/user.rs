//! User entity.

use chrono::{DateTime, Utc};
use domain::models::user::{Role, User, UserSummary};

/// Row mapping for the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserEntity {
    pub id: i64,
    pub utorid: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub points: i64,
    pub verified: bool,
    pub suspicious: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserEntity {
    /// Parsed role. The column carries a CHECK constraint, so an unknown
    /// value can only mean schema drift; fall back to the least privilege.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Regular)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            utorid: self.utorid.clone(),
            name: self.name.clone(),
        }
    }
}

impl From<UserEntity> for User {
    fn from(entity: UserEntity) -> Self {
        let role = entity.role();
        User {
            id: entity.id,
            utorid: entity.utorid,
            name: entity.name,
            email: entity.email,
            role,
            points: entity.points,
            verified: entity.verified,
            suspicious: entity.suspicious,
            created_at: entity.created_at,
            last_login: entity.last_login,
        }
    }
}
