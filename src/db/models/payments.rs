//! Database models for payments.

use super::decode_money;
use crate::types::{GroupId, PaymentId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

#[derive(Debug, Clone)]
pub struct PaymentCreateDBRequest {
    pub student_id: UserId,
    pub group_id: GroupId,
    pub cycle_index: i64,
    pub amount_due: Decimal,
}

#[derive(Debug, Clone)]
pub struct PaymentUpdateDBRequest {
    pub is_paid: bool,
}

#[derive(Debug, Clone)]
pub struct PaymentDBResponse {
    pub id: PaymentId,
    pub student_id: UserId,
    pub group_id: GroupId,
    pub cycle_index: i64,
    pub amount_due: Decimal,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Manual FromRow: amount_due is stored as decimal text (see db::models::encode_money)
impl<'r> sqlx::FromRow<'r, SqliteRow> for PaymentDBResponse {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            student_id: row.try_get("student_id")?,
            group_id: row.try_get("group_id")?,
            cycle_index: row.try_get("cycle_index")?,
            amount_due: decode_money(row, "amount_due")?,
            is_paid: row.try_get("is_paid")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
