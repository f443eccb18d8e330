//! API request/response models for courses.

use super::pagination::Pagination;
use crate::db::models::courses::CourseDBResponse;
use crate::types::{CourseId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseCreate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Per-cycle fee charged for every 12-lesson block
    #[schema(value_type = String, example = "120.00")]
    pub price: Decimal,
    /// Owning teacher. Ignored for teacher callers, who always own the
    /// courses they create.
    #[schema(value_type = Option<String>, format = "uuid")]
    pub teacher_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CourseId,
    pub title: String,
    pub description: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    #[schema(value_type = String, format = "uuid")]
    pub teacher_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing courses
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListCoursesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

impl From<CourseDBResponse> for CourseResponse {
    fn from(db: CourseDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            description: db.description,
            price: db.price,
            teacher_id: db.teacher_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
