//! Database repository for payments.

use crate::types::{GroupId, PaymentId, UserId, abbrev_uuid};
use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::{
            encode_money,
            payments::{PaymentCreateDBRequest, PaymentDBResponse, PaymentUpdateDBRequest},
        },
    },
    scope::AccessScope,
};
use chrono::Utc;
use sqlx::{QueryBuilder, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing payments
#[derive(Debug, Clone)]
pub struct PaymentFilter {
    pub scope: AccessScope,
    pub skip: i64,
    pub limit: i64,
    pub group_id: Option<GroupId>,
    pub is_paid: Option<bool>,
}

impl PaymentFilter {
    pub fn new(scope: AccessScope, skip: i64, limit: i64) -> Self {
        Self {
            scope,
            skip,
            limit,
            group_id: None,
            is_paid: None,
        }
    }

    pub fn with_group(mut self, group_id: Option<GroupId>) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn with_is_paid(mut self, is_paid: Option<bool>) -> Self {
        self.is_paid = is_paid;
        self
    }
}

pub struct Payments<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Payments<'c> {
    type CreateRequest = PaymentCreateDBRequest;
    type UpdateRequest = PaymentUpdateDBRequest;
    type Response = PaymentDBResponse;
    type Id = PaymentId;
    type Filter = PaymentFilter;

    #[instrument(skip(self, request), fields(student_id = %abbrev_uuid(&request.student_id), cycle = request.cycle_index), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>(
            r#"
            INSERT INTO payments (id, student_id, group_id, cycle_index, amount_due, is_paid, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.student_id)
        .bind(request.group_id)
        .bind(request.cycle_index)
        .bind(encode_money(request.amount_due))
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(payment)
    }

    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>("SELECT * FROM payments WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(payment)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<PaymentId>) -> Result<std::collections::HashMap<Self::Id, PaymentDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }

        let mut builder = QueryBuilder::new("SELECT * FROM payments WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let payments: Vec<PaymentDBResponse> = builder.build_query_as().fetch_all(&mut *self.db).await?;

        Ok(payments.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut builder = QueryBuilder::new("SELECT * FROM payments WHERE 1=1");

        match filter.scope {
            // Teachers keep unrestricted payment visibility (financial oversight)
            AccessScope::Admin | AccessScope::Teacher(_) => {}
            AccessScope::Student(student_id) => {
                builder.push(" AND student_id = ");
                builder.push_bind(student_id);
            }
        }

        if let Some(group_id) = filter.group_id {
            builder.push(" AND group_id = ");
            builder.push_bind(group_id);
        }

        if let Some(is_paid) = filter.is_paid {
            builder.push(" AND is_paid = ");
            builder.push_bind(is_paid);
        }

        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(filter.limit);
        builder.push(" OFFSET ");
        builder.push_bind(filter.skip);

        let payments: Vec<PaymentDBResponse> = builder.build_query_as().fetch_all(&mut *self.db).await?;

        Ok(payments)
    }

    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM payments WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(payment_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>(
            "UPDATE payments SET is_paid = ?2, updated_at = ?3 WHERE id = ?1 RETURNING *",
        )
        .bind(id)
        .bind(request.is_paid)
        .bind(Utc::now())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(payment)
    }
}

impl<'c> Payments<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Scoped single-entity fetch: returns None when the payment exists but
    /// is outside the caller's scope.
    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id)), err)]
    pub async fn get_scoped(&mut self, id: PaymentId, scope: &AccessScope) -> Result<Option<PaymentDBResponse>> {
        let payment = match scope {
            AccessScope::Admin | AccessScope::Teacher(_) => self.get_by_id(id).await?,
            AccessScope::Student(student_id) => {
                sqlx::query_as::<_, PaymentDBResponse>("SELECT * FROM payments WHERE id = ?1 AND student_id = ?2")
                    .bind(id)
                    .bind(student_id)
                    .fetch_optional(&mut *self.db)
                    .await?
            }
        };

        Ok(payment)
    }

    /// Whether a payment already exists for this (student, group, cycle)
    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&student_id), cycle = cycle_index), err)]
    pub async fn exists(&mut self, student_id: UserId, group_id: GroupId, cycle_index: i64) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM payments WHERE student_id = ?1 AND group_id = ?2 AND cycle_index = ?3)",
        )
        .bind(student_id)
        .bind(group_id)
        .bind(cycle_index)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(exists)
    }

    /// Insert unless a payment for the (student, group, cycle) triple already
    /// exists. Returns true when a row was inserted. A concurrent duplicate
    /// resolves to false instead of an error, which is what keeps the
    /// lifecycle triggers idempotent under double-firing.
    #[instrument(skip(self, request), fields(student_id = %abbrev_uuid(&request.student_id), cycle = request.cycle_index), err)]
    pub async fn create_if_absent(&mut self, request: &PaymentCreateDBRequest) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (id, student_id, group_id, cycle_index, amount_due, is_paid, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.student_id)
        .bind(request.group_id)
        .bind(request.cycle_index)
        .bind(encode_money(request.amount_due))
        .bind(Utc::now())
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::Repository;
    use super::*;
    use crate::api::models::users::Role;
    use crate::test_utils::{seed_group, seed_user};
    use rust_decimal::Decimal;
    use sqlx::SqlitePool;

    fn request(student: UserId, group: GroupId, cycle: i64) -> PaymentCreateDBRequest {
        PaymentCreateDBRequest {
            student_id: student,
            group_id: group,
            cycle_index: cycle,
            amount_due: Decimal::new(10000, 2),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_triple_rejected(pool: SqlitePool) {
        let group = seed_group(&pool, None).await;
        let student = seed_user(&pool, "s", Role::Student).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Payments::new(&mut conn);

        repo.create(&request(student.id, group.id, 1)).await.unwrap();
        let err = repo.create(&request(student.id, group.id, 1)).await.unwrap_err();
        assert!(err.is_unique_violation(), "expected unique violation, got {err:?}");

        // A different cycle is fine
        repo.create(&request(student.id, group.id, 2)).await.unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_if_absent(pool: SqlitePool) {
        let group = seed_group(&pool, None).await;
        let student = seed_user(&pool, "s", Role::Student).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Payments::new(&mut conn);

        assert!(!repo.exists(student.id, group.id, 1).await.unwrap());
        assert!(repo.create_if_absent(&request(student.id, group.id, 1)).await.unwrap());
        assert!(repo.exists(student.id, group.id, 1).await.unwrap());
        // Second attempt is a silent no-op
        assert!(!repo.create_if_absent(&request(student.id, group.id, 1)).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_scope_on_list(pool: SqlitePool) {
        let group = seed_group(&pool, None).await;
        let s1 = seed_user(&pool, "s1", Role::Student).await;
        let s2 = seed_user(&pool, "s2", Role::Student).await;
        let teacher = seed_user(&pool, "t", Role::Teacher).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Payments::new(&mut conn);
        repo.create(&request(s1.id, group.id, 1)).await.unwrap();
        repo.create(&request(s2.id, group.id, 1)).await.unwrap();

        // Students see only their own payments
        let own = repo.list(&PaymentFilter::new(AccessScope::Student(s1.id), 0, 100)).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].student_id, s1.id);

        // Teachers read all payments
        let all = repo.list(&PaymentFilter::new(AccessScope::Teacher(teacher.id), 0, 100)).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_group_delete_cascades_payments(pool: SqlitePool) {
        let group = seed_group(&pool, None).await;
        let student = seed_user(&pool, "s", Role::Student).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Payments::new(&mut conn);
        repo.create(&request(student.id, group.id, 1)).await.unwrap();

        sqlx::query("DELETE FROM groups WHERE id = ?1")
            .bind(group.id)
            .execute(&mut *conn)
            .await
            .unwrap();

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payments")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_mark_paid(pool: SqlitePool) {
        let group = seed_group(&pool, None).await;
        let student = seed_user(&pool, "s", Role::Student).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Payments::new(&mut conn);
        let payment = repo.create(&request(student.id, group.id, 1)).await.unwrap();
        assert!(!payment.is_paid);

        let updated = repo.update(payment.id, &PaymentUpdateDBRequest { is_paid: true }).await.unwrap();
        assert!(updated.is_paid);
        assert_eq!(updated.amount_due, payment.amount_due);
    }
}
