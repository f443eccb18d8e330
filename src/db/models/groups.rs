//! Database models for groups.

use crate::types::{CourseId, GroupId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct GroupCreateDBRequest {
    pub name: String,
    pub course_id: Option<CourseId>,
}

#[derive(Debug, Clone, Default)]
pub struct GroupUpdateDBRequest {
    pub name: Option<String>,
    pub course_id: Option<CourseId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct GroupDBResponse {
    pub id: GroupId,
    pub name: String,
    pub course_id: Option<CourseId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
