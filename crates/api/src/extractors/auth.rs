//! Authenticated principal extractor.
//!
//! Validates the Bearer token in the Authorization header and resolves the
//! acting user's row. Role, verified and suspicious state are read from the
//! store on every request — the token only carries identity, so a role
//! change or suspicious flag takes effect immediately.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use domain::models::user::Role;
use persistence::entities::UserEntity;
use persistence::repositories::UserRepository;

use crate::app::AppState;
use crate::error::ApiError;

/// The authenticated acting user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: UserEntity,
}

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn utorid(&self) -> &str {
        &self.user.utorid
    }

    pub fn role(&self) -> Role {
        self.user.role()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| {
                ApiError::Unauthorized("Invalid Authorization header format".to_string())
            })?;

        let claims = state
            .token_keys
            .verify(token)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| ApiError::Unauthorized("Invalid token subject".to_string()))?;

        let repo = UserRepository::new(state.pool.clone());
        let user = repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

        Ok(AuthUser { user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entity(role: &str) -> UserEntity {
        UserEntity {
            id: 1,
            utorid: "loyal001".to_string(),
            name: None,
            email: None,
            role: role.to_string(),
            points: 0,
            verified: true,
            suspicious: false,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_auth_user_accessors() {
        let auth = AuthUser {
            user: entity("cashier"),
        };
        assert_eq!(auth.id(), 1);
        assert_eq!(auth.utorid(), "loyal001");
        assert_eq!(auth.role(), Role::Cashier);
    }
}
