//! Database models for lessons.

use crate::types::{GroupId, LessonId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct LessonCreateDBRequest {
    pub topic: String,
    pub date: NaiveDate,
    pub teacher_id: UserId,
    pub group_id: GroupId,
}

#[derive(Debug, Clone, Default)]
pub struct LessonUpdateDBRequest {
    pub topic: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LessonDBResponse {
    pub id: LessonId,
    pub topic: String,
    pub date: NaiveDate,
    pub teacher_id: UserId,
    pub group_id: GroupId,
    pub created_at: DateTime<Utc>,
}
