//! Database models for attendance records.

use crate::api::models::attendance::AttendanceStatus;
use crate::types::{AttendanceId, LessonId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct AttendanceCreateDBRequest {
    pub student_id: UserId,
    pub lesson_id: LessonId,
    pub status: AttendanceStatus,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceUpdateDBRequest {
    pub status: Option<AttendanceStatus>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AttendanceDBResponse {
    pub id: AttendanceId,
    pub student_id: UserId,
    pub lesson_id: LessonId,
    pub status: AttendanceStatus,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
