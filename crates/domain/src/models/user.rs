//! User and role domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Programme roles, ordered by privilege.
///
/// The derived ordering follows declaration order, so `Role::Cashier >=
/// Role::Regular` holds and higher roles implicitly carry every lower role's
/// capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Regular,
    Cashier,
    Manager,
    Superuser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Regular => "regular",
            Role::Cashier => "cashier",
            Role::Manager => "manager",
            Role::Superuser => "superuser",
        }
    }

    /// True when this role is at least as privileged as `other`.
    pub fn at_least(&self, other: Role) -> bool {
        *self >= other
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "regular" => Ok(Role::Regular),
            "cashier" => Ok(Role::Cashier),
            "manager" => Ok(Role::Manager),
            "superuser" => Ok(Role::Superuser),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user account in the loyalty programme.
///
/// Accounts are created at registration (outside this service) and never
/// deleted; only the Transaction Engine mutates `points`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub utorid: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub points: i64,
    pub verified: bool,
    pub suspicious: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Compact user reference embedded in event organizer/guest lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub utorid: String,
    pub name: Option<String>,
}

/// PATCH /users/:id body. All fields optional; role strings are resolved
/// against the access gate before being applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub role: Option<String>,
    pub verified: Option<bool>,
    pub suspicious: Option<bool>,
}

/// GET /users query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub name: Option<String>,
    pub role: Option<String>,
    pub verified: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
