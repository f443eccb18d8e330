//! Database repository for attendance records.

use crate::api::models::attendance::AttendanceStatus;
use crate::types::{AttendanceId, LessonId, UserId, abbrev_uuid};
use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::attendance::{AttendanceCreateDBRequest, AttendanceDBResponse, AttendanceUpdateDBRequest},
    },
    scope::AccessScope,
};
use chrono::Utc;
use sqlx::{QueryBuilder, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing attendance records
#[derive(Debug, Clone)]
pub struct AttendanceFilter {
    pub scope: AccessScope,
    pub skip: i64,
    pub limit: i64,
    pub lesson_id: Option<LessonId>,
    pub status: Option<AttendanceStatus>,
}

impl AttendanceFilter {
    pub fn new(scope: AccessScope, skip: i64, limit: i64) -> Self {
        Self {
            scope,
            skip,
            limit,
            lesson_id: None,
            status: None,
        }
    }

    pub fn with_lesson(mut self, lesson_id: Option<LessonId>) -> Self {
        self.lesson_id = lesson_id;
        self
    }

    pub fn with_status(mut self, status: Option<AttendanceStatus>) -> Self {
        self.status = status;
        self
    }
}

pub struct Attendance<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Attendance<'c> {
    type CreateRequest = AttendanceCreateDBRequest;
    type UpdateRequest = AttendanceUpdateDBRequest;
    type Response = AttendanceDBResponse;
    type Id = AttendanceId;
    type Filter = AttendanceFilter;

    #[instrument(skip(self, request), fields(student_id = %abbrev_uuid(&request.student_id), lesson_id = %abbrev_uuid(&request.lesson_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let record = sqlx::query_as::<_, AttendanceDBResponse>(
            r#"
            INSERT INTO attendance (id, student_id, lesson_id, status, comment, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.student_id)
        .bind(request.lesson_id)
        .bind(request.status)
        .bind(&request.comment)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(record)
    }

    #[instrument(skip(self), fields(attendance_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let record = sqlx::query_as::<_, AttendanceDBResponse>("SELECT * FROM attendance WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(record)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<AttendanceId>) -> Result<std::collections::HashMap<Self::Id, AttendanceDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }

        let mut builder = QueryBuilder::new("SELECT * FROM attendance WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let records: Vec<AttendanceDBResponse> = builder.build_query_as().fetch_all(&mut *self.db).await?;

        Ok(records.into_iter().map(|r| (r.id, r)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut builder = QueryBuilder::new("SELECT * FROM attendance WHERE 1=1");

        match filter.scope {
            AccessScope::Admin => {}
            AccessScope::Teacher(teacher_id) => {
                builder.push(" AND lesson_id IN (SELECT id FROM lessons WHERE teacher_id = ");
                builder.push_bind(teacher_id);
                builder.push(")");
            }
            AccessScope::Student(student_id) => {
                builder.push(" AND student_id = ");
                builder.push_bind(student_id);
            }
        }

        if let Some(lesson_id) = filter.lesson_id {
            builder.push(" AND lesson_id = ");
            builder.push_bind(lesson_id);
        }

        if let Some(status) = filter.status {
            builder.push(" AND status = ");
            builder.push_bind(status);
        }

        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(filter.limit);
        builder.push(" OFFSET ");
        builder.push_bind(filter.skip);

        let records: Vec<AttendanceDBResponse> = builder.build_query_as().fetch_all(&mut *self.db).await?;

        Ok(records)
    }

    #[instrument(skip(self), fields(attendance_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM attendance WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(attendance_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let record = sqlx::query_as::<_, AttendanceDBResponse>(
            r#"
            UPDATE attendance SET
                status = COALESCE(?2, status),
                comment = COALESCE(?3, comment),
                updated_at = ?4
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.status)
        .bind(&request.comment)
        .bind(Utc::now())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(record)
    }
}

impl<'c> Attendance<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Scoped single-entity fetch: returns None when the record exists but is
    /// outside the caller's scope.
    #[instrument(skip(self), fields(attendance_id = %abbrev_uuid(&id)), err)]
    pub async fn get_scoped(&mut self, id: AttendanceId, scope: &AccessScope) -> Result<Option<AttendanceDBResponse>> {
        let record = match scope {
            AccessScope::Admin => self.get_by_id(id).await?,
            AccessScope::Teacher(teacher_id) => {
                sqlx::query_as::<_, AttendanceDBResponse>(
                    "SELECT * FROM attendance WHERE id = ?1 AND lesson_id IN (SELECT id FROM lessons WHERE teacher_id = ?2)",
                )
                .bind(id)
                .bind(teacher_id)
                .fetch_optional(&mut *self.db)
                .await?
            }
            AccessScope::Student(student_id) => {
                sqlx::query_as::<_, AttendanceDBResponse>("SELECT * FROM attendance WHERE id = ?1 AND student_id = ?2")
                    .bind(id)
                    .bind(student_id)
                    .fetch_optional(&mut *self.db)
                    .await?
            }
        };

        Ok(record)
    }

    /// Student ids that already have a record for this lesson. Used by the
    /// lesson trigger to stay idempotent.
    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&lesson_id)), err)]
    pub async fn student_ids_for_lesson(&mut self, lesson_id: LessonId) -> Result<Vec<UserId>> {
        let ids = sqlx::query_scalar::<_, UserId>("SELECT student_id FROM attendance WHERE lesson_id = ?1")
            .bind(lesson_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(ids)
    }

    /// Bulk insert, skipping (student, lesson) pairs that already have a row.
    /// Returns the number of rows actually inserted.
    #[instrument(skip(self, requests), fields(count = requests.len()), err)]
    pub async fn create_bulk(&mut self, requests: &[AttendanceCreateDBRequest]) -> Result<u64> {
        if requests.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut builder = QueryBuilder::new("INSERT INTO attendance (id, student_id, lesson_id, status, comment, created_at, updated_at) ");
        builder.push_values(requests, |mut b, request| {
            b.push_bind(Uuid::new_v4())
                .push_bind(request.student_id)
                .push_bind(request.lesson_id)
                .push_bind(request.status)
                .push_bind(request.comment.clone())
                .push_bind(now)
                .push_bind(now);
        });
        builder.push(" ON CONFLICT DO NOTHING");

        let result = builder.build().execute(&mut *self.db).await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::Repository;
    use super::*;
    use crate::api::models::users::Role;
    use crate::test_utils::{seed_group, seed_lesson, seed_user};
    use sqlx::SqlitePool;

    fn record(student: UserId, lesson: LessonId) -> AttendanceCreateDBRequest {
        AttendanceCreateDBRequest {
            student_id: student,
            lesson_id: lesson,
            status: AttendanceStatus::Present,
            comment: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_pair_rejected(pool: SqlitePool) {
        let teacher = seed_user(&pool, "t", Role::Teacher).await;
        let group = seed_group(&pool, None).await;
        let lesson = seed_lesson(&pool, group.id, teacher.id, "topic").await;
        let student = seed_user(&pool, "s", Role::Student).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Attendance::new(&mut conn);

        repo.create(&record(student.id, lesson.id)).await.unwrap();
        let err = repo.create(&record(student.id, lesson.id)).await.unwrap_err();
        assert!(err.is_unique_violation(), "expected unique violation, got {err:?}");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_bulk_skips_existing(pool: SqlitePool) {
        let teacher = seed_user(&pool, "t", Role::Teacher).await;
        let group = seed_group(&pool, None).await;
        let lesson = seed_lesson(&pool, group.id, teacher.id, "topic").await;
        let s1 = seed_user(&pool, "s1", Role::Student).await;
        let s2 = seed_user(&pool, "s2", Role::Student).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Attendance::new(&mut conn);

        repo.create(&record(s1.id, lesson.id)).await.unwrap();

        let inserted = repo.create_bulk(&[record(s1.id, lesson.id), record(s2.id, lesson.id)]).await.unwrap();
        assert_eq!(inserted, 1);

        let ids = repo.student_ids_for_lesson(lesson.id).await.unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_teacher_scope_on_list(pool: SqlitePool) {
        let t1 = seed_user(&pool, "t1", Role::Teacher).await;
        let t2 = seed_user(&pool, "t2", Role::Teacher).await;
        let group = seed_group(&pool, None).await;
        let own_lesson = seed_lesson(&pool, group.id, t1.id, "own").await;
        let other_lesson = seed_lesson(&pool, group.id, t2.id, "other").await;
        let student = seed_user(&pool, "s", Role::Student).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Attendance::new(&mut conn);
        repo.create(&record(student.id, own_lesson.id)).await.unwrap();
        repo.create(&record(student.id, other_lesson.id)).await.unwrap();

        let visible = repo.list(&AttendanceFilter::new(AccessScope::Teacher(t1.id), 0, 100)).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].lesson_id, own_lesson.id);

        // The student sees both of their own records
        let own = repo.list(&AttendanceFilter::new(AccessScope::Student(student.id), 0, 100)).await.unwrap();
        assert_eq!(own.len(), 2);
    }
}
