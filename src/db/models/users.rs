//! Database models for users.

use crate::api::models::users::{Role, UserCreate};
use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub password_hash: Option<String>,
}

impl UserCreateDBRequest {
    /// Build from an API create request plus an already-hashed password.
    /// Hashing happens at the handler layer (on a blocking thread).
    pub fn from_api(api: UserCreate, password_hash: Option<String>) -> Self {
        Self {
            username: api.username,
            email: api.email,
            full_name: api.full_name,
            phone: api.phone,
            role: api.role,
            is_active: true,
            password_hash,
        }
    }
}

/// Database request for updating a user. Role is immutable and absent here.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
}

/// Database response for a user
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
