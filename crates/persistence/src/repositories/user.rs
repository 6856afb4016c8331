//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::entities::UserEntity;
use crate::metrics::QueryTimer;

const USER_COLUMNS: &str = "id, utorid, name, email, role, points, verified, suspicious, \
                            created_at, last_login";

/// Repository for user-related database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a user by utorid handle.
    pub async fn find_by_utorid(&self, utorid: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_utorid");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE utorid = $1"
        ))
        .bind(utorid)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Create a user account. Registration itself lives outside this
    /// service; this is used by fixtures and administrative tooling.
    pub async fn create_user(
        &self,
        utorid: &str,
        name: Option<&str>,
        email: Option<&str>,
        role: &str,
        verified: bool,
    ) -> Result<UserEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_user");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            INSERT INTO users (utorid, name, email, role, verified)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(utorid)
        .bind(name)
        .bind(email)
        .bind(role)
        .bind(verified)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Partial update of the administrative flags. Only non-NULL arguments
    /// are applied.
    pub async fn update_standing(
        &self,
        id: i64,
        role: Option<&str>,
        verified: Option<bool>,
        suspicious: Option<bool>,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_user_standing");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            UPDATE users
            SET role = COALESCE($2, role),
                verified = COALESCE($3, verified),
                suspicious = COALESCE($4, suspicious)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(role)
        .bind(verified)
        .bind(suspicious)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Update the last-login timestamp.
    pub async fn update_last_login(
        &self,
        id: i64,
        last_login: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("update_user_last_login");
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(last_login)
            .bind(id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(())
    }

    /// List users with optional filters, newest id first is not wanted here:
    /// listings are stable by ascending id for pagination.
    pub async fn list(
        &self,
        name: Option<&str>,
        role: Option<&str>,
        verified: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<UserEntity>), sqlx::Error> {
        let timer = QueryTimer::new("list_users");

        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE ($1::text IS NULL OR utorid ILIKE '%' || $1 || '%'
                   OR name ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR role = $2)
              AND ($3::boolean IS NULL OR verified = $3)
            "#,
        )
        .bind(name)
        .bind(role)
        .bind(verified)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE ($1::text IS NULL OR utorid ILIKE '%' || $1 || '%'
                   OR name ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR role = $2)
              AND ($3::boolean IS NULL OR verified = $3)
            ORDER BY id ASC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(name)
        .bind(role)
        .bind(verified)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        timer.record();
        Ok((count, rows))
    }
}

#[cfg(test)]
mod tests {
    // UserRepository queries require a database connection and are covered
    // by the integration tests in the api crate.
}
