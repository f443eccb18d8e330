//! Database models for courses.

use super::decode_money;
use crate::types::{CourseId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

#[derive(Debug, Clone)]
pub struct CourseCreateDBRequest {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub teacher_id: UserId,
}

#[derive(Debug, Clone, Default)]
pub struct CourseUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct CourseDBResponse {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub teacher_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Manual FromRow: price is stored as decimal text (see db::models::encode_money)
impl<'r> sqlx::FromRow<'r, SqliteRow> for CourseDBResponse {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            price: decode_money(row, "price")?,
            teacher_id: row.try_get("teacher_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
