//! Database repository for lessons.

use crate::types::{GroupId, LessonId, abbrev_uuid};
use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::lessons::{LessonCreateDBRequest, LessonDBResponse, LessonUpdateDBRequest},
    },
    scope::AccessScope,
};
use chrono::Utc;
use sqlx::{QueryBuilder, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing lessons
#[derive(Debug, Clone)]
pub struct LessonFilter {
    pub scope: AccessScope,
    pub skip: i64,
    pub limit: i64,
    pub group_id: Option<GroupId>,
}

impl LessonFilter {
    pub fn new(scope: AccessScope, skip: i64, limit: i64) -> Self {
        Self {
            scope,
            skip,
            limit,
            group_id: None,
        }
    }

    pub fn with_group(mut self, group_id: Option<GroupId>) -> Self {
        self.group_id = group_id;
        self
    }
}

pub struct Lessons<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Lessons<'c> {
    type CreateRequest = LessonCreateDBRequest;
    type UpdateRequest = LessonUpdateDBRequest;
    type Response = LessonDBResponse;
    type Id = LessonId;
    type Filter = LessonFilter;

    #[instrument(skip(self, request), fields(topic = %request.topic, group_id = %abbrev_uuid(&request.group_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let lesson = sqlx::query_as::<_, LessonDBResponse>(
            r#"
            INSERT INTO lessons (id, topic, date, teacher_id, group_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.topic)
        .bind(request.date)
        .bind(request.teacher_id)
        .bind(request.group_id)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(lesson)
    }

    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let lesson = sqlx::query_as::<_, LessonDBResponse>("SELECT * FROM lessons WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(lesson)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<LessonId>) -> Result<std::collections::HashMap<Self::Id, LessonDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }

        let mut builder = QueryBuilder::new("SELECT * FROM lessons WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let lessons: Vec<LessonDBResponse> = builder.build_query_as().fetch_all(&mut *self.db).await?;

        Ok(lessons.into_iter().map(|l| (l.id, l)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        // Scope predicate first, then the optional group filter on top
        let mut builder = QueryBuilder::new("SELECT * FROM lessons WHERE 1=1");

        match filter.scope {
            AccessScope::Admin => {}
            AccessScope::Teacher(teacher_id) => {
                builder.push(" AND teacher_id = ");
                builder.push_bind(teacher_id);
            }
            AccessScope::Student(student_id) => {
                builder.push(" AND group_id IN (SELECT group_id FROM group_students WHERE student_id = ");
                builder.push_bind(student_id);
                builder.push(")");
            }
        }

        if let Some(group_id) = filter.group_id {
            builder.push(" AND group_id = ");
            builder.push_bind(group_id);
        }

        builder.push(" ORDER BY date DESC, created_at DESC LIMIT ");
        builder.push_bind(filter.limit);
        builder.push(" OFFSET ");
        builder.push_bind(filter.skip);

        let lessons: Vec<LessonDBResponse> = builder.build_query_as().fetch_all(&mut *self.db).await?;

        Ok(lessons)
    }

    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM lessons WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(lesson_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let lesson = sqlx::query_as::<_, LessonDBResponse>(
            r#"
            UPDATE lessons SET
                topic = COALESCE(?2, topic),
                date = COALESCE(?3, date)
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.topic)
        .bind(request.date)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(lesson)
    }
}

impl<'c> Lessons<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Scoped single-entity fetch: returns None when the lesson exists but is
    /// outside the caller's scope.
    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&id)), err)]
    pub async fn get_scoped(&mut self, id: LessonId, scope: &AccessScope) -> Result<Option<LessonDBResponse>> {
        let lesson = match scope {
            AccessScope::Admin => self.get_by_id(id).await?,
            AccessScope::Teacher(teacher_id) => {
                sqlx::query_as::<_, LessonDBResponse>("SELECT * FROM lessons WHERE id = ?1 AND teacher_id = ?2")
                    .bind(id)
                    .bind(teacher_id)
                    .fetch_optional(&mut *self.db)
                    .await?
            }
            AccessScope::Student(student_id) => {
                sqlx::query_as::<_, LessonDBResponse>(
                    r#"
                    SELECT * FROM lessons
                    WHERE id = ?1 AND group_id IN (SELECT group_id FROM group_students WHERE student_id = ?2)
                    "#,
                )
                .bind(id)
                .bind(student_id)
                .fetch_optional(&mut *self.db)
                .await?
            }
        };

        Ok(lesson)
    }

    /// Number of lessons recorded for a group. Drives the cycle arithmetic in
    /// the lifecycle engine.
    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&group_id)), err)]
    pub async fn count_for_group(&mut self, group_id: GroupId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM lessons WHERE group_id = ?1")
            .bind(group_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::Repository;
    use super::*;
    use crate::api::models::users::Role;
    use crate::test_utils::{seed_group, seed_lesson, seed_user};
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_count_for_group(pool: SqlitePool) {
        let teacher = seed_user(&pool, "t", Role::Teacher).await;
        let group = seed_group(&pool, None).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Lessons::new(&mut conn);
        assert_eq!(repo.count_for_group(group.id).await.unwrap(), 0);

        for i in 0..3 {
            seed_lesson(&pool, group.id, teacher.id, &format!("lesson {i}")).await;
        }
        assert_eq!(repo.count_for_group(group.id).await.unwrap(), 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_student_sees_only_member_group_lessons(pool: SqlitePool) {
        let teacher = seed_user(&pool, "t", Role::Teacher).await;
        let member_group = seed_group(&pool, None).await;
        let other_group = seed_group(&pool, None).await;
        let student = seed_user(&pool, "s", Role::Student).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut groups = super::super::groups::Groups::new(&mut conn);
        groups.add_students(member_group.id, &[student.id]).await.unwrap();

        let visible = seed_lesson(&pool, member_group.id, teacher.id, "visible").await;
        seed_lesson(&pool, other_group.id, teacher.id, "hidden").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Lessons::new(&mut conn);
        let lessons = repo.list(&LessonFilter::new(AccessScope::Student(student.id), 0, 100)).await.unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].id, visible.id);

        // Teacher scope keys off the lesson's teacher
        let lessons = repo.list(&LessonFilter::new(AccessScope::Teacher(teacher.id), 0, 100)).await.unwrap();
        assert_eq!(lessons.len(), 2);
    }
}
