//! API request/response models for attendance records.

use super::pagination::Pagination;
use crate::db::models::attendance::AttendanceDBResponse;
use crate::types::{AttendanceId, LessonId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Whether the student showed up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

/// Manual creation of a single attendance record. The lesson trigger creates
/// the roster-wide records automatically; this exists for corrections (e.g.
/// a student added to the roster after the lesson was recorded).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceCreate {
    #[schema(value_type = String, format = "uuid")]
    pub student_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub lesson_id: LessonId,
    pub status: AttendanceStatus,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceUpdate {
    pub status: Option<AttendanceStatus>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AttendanceId,
    #[schema(value_type = String, format = "uuid")]
    pub student_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub lesson_id: LessonId,
    pub status: AttendanceStatus,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing attendance records
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListAttendanceQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Restrict to a single lesson
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>)]
    pub lesson_id: Option<LessonId>,

    /// Filter by status
    pub status: Option<AttendanceStatus>,
}

impl From<AttendanceDBResponse> for AttendanceResponse {
    fn from(db: AttendanceDBResponse) -> Self {
        Self {
            id: db.id,
            student_id: db.student_id,
            lesson_id: db.lesson_id,
            status: db.status,
            comment: db.comment,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
