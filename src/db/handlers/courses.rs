//! Database repository for courses.

use crate::types::{CourseId, abbrev_uuid};
use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::{
            courses::{CourseCreateDBRequest, CourseDBResponse, CourseUpdateDBRequest},
            encode_money,
        },
    },
    scope::AccessScope,
};
use chrono::Utc;
use sqlx::{QueryBuilder, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing courses
#[derive(Debug, Clone)]
pub struct CourseFilter {
    pub scope: AccessScope,
    pub skip: i64,
    pub limit: i64,
}

impl CourseFilter {
    pub fn new(scope: AccessScope, skip: i64, limit: i64) -> Self {
        Self { scope, skip, limit }
    }
}

pub struct Courses<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Courses<'c> {
    type CreateRequest = CourseCreateDBRequest;
    type UpdateRequest = CourseUpdateDBRequest;
    type Response = CourseDBResponse;
    type Id = CourseId;
    type Filter = CourseFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let course = sqlx::query_as::<_, CourseDBResponse>(
            r#"
            INSERT INTO courses (id, title, description, price, teacher_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.title)
        .bind(&request.description)
        .bind(encode_money(request.price))
        .bind(request.teacher_id)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(course)
    }

    #[instrument(skip(self), fields(course_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let course = sqlx::query_as::<_, CourseDBResponse>("SELECT * FROM courses WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(course)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<CourseId>) -> Result<std::collections::HashMap<Self::Id, CourseDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }

        let mut builder = QueryBuilder::new("SELECT * FROM courses WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let courses: Vec<CourseDBResponse> = builder.build_query_as().fetch_all(&mut *self.db).await?;

        Ok(courses.into_iter().map(|c| (c.id, c)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let courses = match filter.scope {
            AccessScope::Admin => {
                sqlx::query_as::<_, CourseDBResponse>("SELECT * FROM courses ORDER BY created_at DESC LIMIT ?1 OFFSET ?2")
                    .bind(filter.limit)
                    .bind(filter.skip)
                    .fetch_all(&mut *self.db)
                    .await?
            }
            AccessScope::Teacher(teacher_id) => {
                sqlx::query_as::<_, CourseDBResponse>(
                    "SELECT * FROM courses WHERE teacher_id = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
                )
                .bind(teacher_id)
                .bind(filter.limit)
                .bind(filter.skip)
                .fetch_all(&mut *self.db)
                .await?
            }
            AccessScope::Student(student_id) => {
                sqlx::query_as::<_, CourseDBResponse>(
                    r#"
                    SELECT c.* FROM courses c
                    WHERE c.id IN (
                        SELECT g.course_id FROM groups g
                        JOIN group_students gs ON gs.group_id = g.id
                        WHERE gs.student_id = ?1 AND g.course_id IS NOT NULL
                    )
                    ORDER BY c.created_at DESC LIMIT ?2 OFFSET ?3
                    "#,
                )
                .bind(student_id)
                .bind(filter.limit)
                .bind(filter.skip)
                .fetch_all(&mut *self.db)
                .await?
            }
        };

        Ok(courses)
    }

    #[instrument(skip(self), fields(course_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM courses WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(course_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let course = sqlx::query_as::<_, CourseDBResponse>(
            r#"
            UPDATE courses SET
                title = COALESCE(?2, title),
                description = COALESCE(?3, description),
                price = COALESCE(?4, price),
                updated_at = ?5
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.price.map(encode_money))
        .bind(Utc::now())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(course)
    }
}

impl<'c> Courses<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Scoped single-entity fetch: returns None when the course exists but is
    /// outside the caller's scope.
    #[instrument(skip(self), fields(course_id = %abbrev_uuid(&id)), err)]
    pub async fn get_scoped(&mut self, id: CourseId, scope: &AccessScope) -> Result<Option<CourseDBResponse>> {
        let course = match scope {
            AccessScope::Admin => self.get_by_id(id).await?,
            AccessScope::Teacher(teacher_id) => {
                sqlx::query_as::<_, CourseDBResponse>("SELECT * FROM courses WHERE id = ?1 AND teacher_id = ?2")
                    .bind(id)
                    .bind(teacher_id)
                    .fetch_optional(&mut *self.db)
                    .await?
            }
            AccessScope::Student(student_id) => {
                sqlx::query_as::<_, CourseDBResponse>(
                    r#"
                    SELECT c.* FROM courses c
                    WHERE c.id = ?1 AND c.id IN (
                        SELECT g.course_id FROM groups g
                        JOIN group_students gs ON gs.group_id = g.id
                        WHERE gs.student_id = ?2 AND g.course_id IS NOT NULL
                    )
                    "#,
                )
                .bind(id)
                .bind(student_id)
                .fetch_optional(&mut *self.db)
                .await?
            }
        };

        Ok(course)
    }
}
