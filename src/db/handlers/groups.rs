//! Database repository for groups and their rosters.

use crate::types::{GroupId, UserId, abbrev_uuid};
use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::{
            groups::{GroupCreateDBRequest, GroupDBResponse, GroupUpdateDBRequest},
            users::UserDBResponse,
        },
    },
    scope::AccessScope,
};
use chrono::Utc;
use sqlx::{QueryBuilder, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing groups
#[derive(Debug, Clone)]
pub struct GroupFilter {
    pub scope: AccessScope,
    pub skip: i64,
    pub limit: i64,
}

impl GroupFilter {
    pub fn new(scope: AccessScope, skip: i64, limit: i64) -> Self {
        Self { scope, skip, limit }
    }
}

pub struct Groups<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Groups<'c> {
    type CreateRequest = GroupCreateDBRequest;
    type UpdateRequest = GroupUpdateDBRequest;
    type Response = GroupDBResponse;
    type Id = GroupId;
    type Filter = GroupFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let group = sqlx::query_as::<_, GroupDBResponse>(
            r#"
            INSERT INTO groups (id, name, course_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(request.course_id)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(group)
    }

    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let group = sqlx::query_as::<_, GroupDBResponse>("SELECT * FROM groups WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(group)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<GroupId>) -> Result<std::collections::HashMap<Self::Id, GroupDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }

        let mut builder = QueryBuilder::new("SELECT * FROM groups WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let groups: Vec<GroupDBResponse> = builder.build_query_as().fetch_all(&mut *self.db).await?;

        Ok(groups.into_iter().map(|g| (g.id, g)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let groups = match filter.scope {
            AccessScope::Admin => {
                sqlx::query_as::<_, GroupDBResponse>("SELECT * FROM groups ORDER BY created_at DESC LIMIT ?1 OFFSET ?2")
                    .bind(filter.limit)
                    .bind(filter.skip)
                    .fetch_all(&mut *self.db)
                    .await?
            }
            AccessScope::Teacher(teacher_id) => {
                sqlx::query_as::<_, GroupDBResponse>(
                    r#"
                    SELECT * FROM groups
                    WHERE course_id IN (SELECT id FROM courses WHERE teacher_id = ?1)
                    ORDER BY created_at DESC LIMIT ?2 OFFSET ?3
                    "#,
                )
                .bind(teacher_id)
                .bind(filter.limit)
                .bind(filter.skip)
                .fetch_all(&mut *self.db)
                .await?
            }
            AccessScope::Student(student_id) => {
                sqlx::query_as::<_, GroupDBResponse>(
                    r#"
                    SELECT * FROM groups
                    WHERE id IN (SELECT group_id FROM group_students WHERE student_id = ?1)
                    ORDER BY created_at DESC LIMIT ?2 OFFSET ?3
                    "#,
                )
                .bind(student_id)
                .bind(filter.limit)
                .bind(filter.skip)
                .fetch_all(&mut *self.db)
                .await?
            }
        };

        Ok(groups)
    }

    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM groups WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(group_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let group = sqlx::query_as::<_, GroupDBResponse>(
            r#"
            UPDATE groups SET
                name = COALESCE(?2, name),
                course_id = COALESCE(?3, course_id),
                updated_at = ?4
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(request.course_id)
        .bind(Utc::now())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(group)
    }
}

impl<'c> Groups<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Scoped single-entity fetch: returns None when the group exists but is
    /// outside the caller's scope.
    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&id)), err)]
    pub async fn get_scoped(&mut self, id: GroupId, scope: &AccessScope) -> Result<Option<GroupDBResponse>> {
        let group = match scope {
            AccessScope::Admin => self.get_by_id(id).await?,
            AccessScope::Teacher(teacher_id) => {
                sqlx::query_as::<_, GroupDBResponse>(
                    r#"
                    SELECT * FROM groups
                    WHERE id = ?1 AND course_id IN (SELECT id FROM courses WHERE teacher_id = ?2)
                    "#,
                )
                .bind(id)
                .bind(teacher_id)
                .fetch_optional(&mut *self.db)
                .await?
            }
            AccessScope::Student(student_id) => {
                sqlx::query_as::<_, GroupDBResponse>(
                    r#"
                    SELECT * FROM groups
                    WHERE id = ?1 AND id IN (SELECT group_id FROM group_students WHERE student_id = ?2)
                    "#,
                )
                .bind(id)
                .bind(student_id)
                .fetch_optional(&mut *self.db)
                .await?
            }
        };

        Ok(group)
    }

    /// Add students to the roster, skipping existing memberships. Returns the
    /// ids that were newly added; the caller fires the enrollment trigger for
    /// exactly that set.
    #[instrument(skip(self, student_ids), fields(group_id = %abbrev_uuid(&group_id), count = student_ids.len()), err)]
    pub async fn add_students(&mut self, group_id: GroupId, student_ids: &[UserId]) -> Result<Vec<UserId>> {
        let now = Utc::now();
        let mut newly_added = Vec::new();

        for student_id in student_ids {
            let result = sqlx::query(
                "INSERT INTO group_students (group_id, student_id, added_at) VALUES (?1, ?2, ?3) ON CONFLICT DO NOTHING",
            )
            .bind(group_id)
            .bind(student_id)
            .bind(now)
            .execute(&mut *self.db)
            .await?;

            if result.rows_affected() > 0 {
                newly_added.push(*student_id);
            }
        }

        Ok(newly_added)
    }

    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&group_id), student_id = %abbrev_uuid(&student_id)), err)]
    pub async fn remove_student(&mut self, group_id: GroupId, student_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM group_students WHERE group_id = ?1 AND student_id = ?2")
            .bind(group_id)
            .bind(student_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Full roster of a group
    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&group_id)), err)]
    pub async fn get_roster(&mut self, group_id: GroupId) -> Result<Vec<UserDBResponse>> {
        let students = sqlx::query_as::<_, UserDBResponse>(
            r#"
            SELECT u.* FROM users u
            JOIN group_students gs ON gs.student_id = u.id
            WHERE gs.group_id = ?1
            ORDER BY u.full_name
            "#,
        )
        .bind(group_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(students)
    }

    /// Roster as bare ids, for the lifecycle triggers
    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&group_id)), err)]
    pub async fn get_roster_ids(&mut self, group_id: GroupId) -> Result<Vec<UserId>> {
        let ids = sqlx::query_scalar::<_, UserId>("SELECT student_id FROM group_students WHERE group_id = ?1")
            .bind(group_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(ids)
    }

    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&group_id), student_id = %abbrev_uuid(&student_id)), err)]
    pub async fn is_member(&mut self, group_id: GroupId, student_id: UserId) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM group_students WHERE group_id = ?1 AND student_id = ?2)",
        )
        .bind(group_id)
        .bind(student_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::Repository;
    use super::*;
    use crate::api::models::users::Role;
    use crate::test_utils::{seed_course, seed_group, seed_user};
    use rust_decimal::Decimal;
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_add_students_reports_newly_added(pool: SqlitePool) {
        let group = seed_group(&pool, None).await;
        let s1 = seed_user(&pool, "s1", Role::Student).await;
        let s2 = seed_user(&pool, "s2", Role::Student).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);

        let added = repo.add_students(group.id, &[s1.id, s2.id]).await.unwrap();
        assert_eq!(added.len(), 2);

        // Re-adding one of them is a no-op
        let added = repo.add_students(group.id, &[s1.id]).await.unwrap();
        assert!(added.is_empty());

        let roster = repo.get_roster_ids(group.id).await.unwrap();
        assert_eq!(roster.len(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_scoped_visibility(pool: SqlitePool) {
        let teacher = seed_user(&pool, "t", Role::Teacher).await;
        let course = seed_course(&pool, teacher.id, Decimal::new(100, 0)).await;
        let own_group = seed_group(&pool, Some(course.id)).await;
        let other_group = seed_group(&pool, None).await;

        let student = seed_user(&pool, "s", Role::Student).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);
        repo.add_students(other_group.id, &[student.id]).await.unwrap();

        // Teacher sees only the group backed by their course
        let groups = repo.list(&GroupFilter::new(AccessScope::Teacher(teacher.id), 0, 100)).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, own_group.id);

        // Student sees only the group they belong to
        let groups = repo.list(&GroupFilter::new(AccessScope::Student(student.id), 0, 100)).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, other_group.id);

        // Scoped get agrees with the list
        assert!(repo.get_scoped(own_group.id, &AccessScope::Teacher(teacher.id)).await.unwrap().is_some());
        assert!(repo.get_scoped(other_group.id, &AccessScope::Teacher(teacher.id)).await.unwrap().is_none());
        assert!(repo.get_scoped(other_group.id, &AccessScope::Student(student.id)).await.unwrap().is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_group_delete_cascades_membership(pool: SqlitePool) {
        let group = seed_group(&pool, None).await;
        let student = seed_user(&pool, "s", Role::Student).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);
        repo.add_students(group.id, &[student.id]).await.unwrap();

        assert!(repo.delete(group.id).await.unwrap());

        let memberships = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM group_students")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(memberships, 0);
    }
}
