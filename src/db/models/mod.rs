//! Database request/response models.
//!
//! Each entity has a `*CreateDBRequest` / `*UpdateDBRequest` pair consumed by
//! its repository, and a `*DBResponse` returned from queries. API-layer
//! models convert from these.

pub mod attendance;
pub mod courses;
pub mod groups;
pub mod lessons;
pub mod payments;
pub mod users;

use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::str::FromStr;

/// Canonical storage form for money columns: 2dp decimal text.
///
/// SQLite has no decimal type and sqlx has no `Decimal` codec for it, so
/// amounts round-trip through text. Rescaling on write keeps comparisons and
/// display stable ("120" and "120.00" are the same fee).
pub(crate) fn encode_money(amount: Decimal) -> String {
    let mut amount = amount;
    amount.rescale(2);
    amount.to_string()
}

/// Decode a money column from its text form.
pub(crate) fn decode_money(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_money_rescales_to_two_places() {
        assert_eq!(encode_money(Decimal::new(120, 0)), "120.00");
        assert_eq!(encode_money(Decimal::new(7000, 2)), "70.00");
        assert_eq!(encode_money(Decimal::new(995, 1)), "99.50");
    }
}
