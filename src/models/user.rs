use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::utils::validator::EMAIL_REGEX;

/// Corresponds to the PostgreSQL `user_role` enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Student,
    Provider,
    /// Never self-assigned at registration.
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Lower-cased institutional address.
    pub email: String,
    pub role: UserRole,
    pub major: String,
    pub grad_year: Option<i32>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Request payload for registration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    #[validate(regex(path = "*EMAIL_REGEX"))]
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub major: String,
    #[validate(range(min = 1900, max = 2100))]
    pub grad_year: Option<i32>,
}

impl RegisterRequest {
    pub fn normalized(self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            major: self.major.trim().to_string(),
            ..self
        }
    }
}

/// Partial profile update. Email and role are immutable here.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfilePatch {
    #[validate(length(min = 3, max = 32))]
    pub username: Option<String>,
    #[validate(length(max = 100))]
    pub major: Option<String>,
    #[validate(range(min = 1900, max = 2100))]
    pub grad_year: Option<i32>,
}

impl ProfilePatch {
    pub fn normalized(self) -> Self {
        Self {
            username: self.username.map(|s| s.trim().to_string()),
            major: self.major.map(|s| s.trim().to_string()),
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub major: String,
    pub grad_year: Option<i32>,
}
