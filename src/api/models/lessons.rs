//! API request/response models for lessons.

use super::pagination::Pagination;
use crate::db::models::lessons::LessonDBResponse;
use crate::types::{GroupId, LessonId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonCreate {
    #[schema(example = "Past perfect, irregular verbs")]
    pub topic: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = String, format = "uuid")]
    pub group_id: GroupId,
    /// Teaching user. Ignored for teacher callers, who always teach the
    /// lessons they create.
    #[schema(value_type = Option<String>, format = "uuid")]
    pub teacher_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonUpdate {
    pub topic: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: LessonId,
    pub topic: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = String, format = "uuid")]
    pub teacher_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub group_id: GroupId,
    pub created_at: DateTime<Utc>,
}

/// Query parameters for listing lessons
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListLessonsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Restrict to a single group
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>)]
    pub group_id: Option<GroupId>,
}

impl From<LessonDBResponse> for LessonResponse {
    fn from(db: LessonDBResponse) -> Self {
        Self {
            id: db.id,
            topic: db.topic,
            date: db.date,
            teacher_id: db.teacher_id,
            group_id: db.group_id,
            created_at: db.created_at,
        }
    }
}
