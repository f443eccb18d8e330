//! API request/response models for groups and their rosters.

use super::pagination::Pagination;
use crate::api::models::users::UserResponse;
use crate::db::models::groups::GroupDBResponse;
use crate::types::{CourseId, GroupId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupCreate {
    #[schema(example = "B2 Evening Cohort")]
    pub name: String,
    /// Backing course. A group without a course has no billing policy: no
    /// payments are ever generated for it.
    #[schema(value_type = Option<String>, format = "uuid")]
    pub course_id: Option<CourseId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupUpdate {
    pub name: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub course_id: Option<CourseId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: GroupId,
    pub name: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub course_id: Option<CourseId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Roster (only included if requested)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub students: Option<Vec<UserResponse>>,
}

/// Batch enrollment request: every listed user must have the student role.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollStudentsRequest {
    #[schema(value_type = Vec<String>)]
    pub student_ids: Vec<UserId>,
}

/// Result of a batch enrollment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollStudentsResponse {
    /// Students newly added to the roster by this request
    #[schema(value_type = Vec<String>)]
    pub enrolled: Vec<UserId>,
    /// Students that were already members (no-op)
    #[schema(value_type = Vec<String>)]
    pub already_members: Vec<UserId>,
}

/// Query parameters for listing groups
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListGroupsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Include related data (comma-separated: "students")
    pub include: Option<String>,
}

impl From<GroupDBResponse> for GroupResponse {
    fn from(db: GroupDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            course_id: db.course_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
            students: None,
        }
    }
}

impl GroupResponse {
    /// Attach the roster to the response
    pub fn with_students(mut self, students: Vec<UserResponse>) -> Self {
        self.students = Some(students);
        self
    }
}
