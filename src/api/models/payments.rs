//! API request/response models for payments.

use super::pagination::Pagination;
use crate::db::models::payments::PaymentDBResponse;
use crate::types::{GroupId, PaymentId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Settle or un-settle a payment. Amounts are never editable; they are fixed
/// by the lifecycle engine when the payment is generated.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentUpdate {
    pub is_paid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PaymentId,
    #[schema(value_type = String, format = "uuid")]
    pub student_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub group_id: GroupId,
    /// 1-based index of the 12-lesson billing cycle this payment covers
    pub cycle_index: i64,
    #[schema(value_type = String)]
    pub amount_due: Decimal,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing payments
#[serde_as]
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListPaymentsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Restrict to a single group
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>)]
    pub group_id: Option<GroupId>,

    /// Filter by settlement state
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub is_paid: Option<bool>,
}

impl From<PaymentDBResponse> for PaymentResponse {
    fn from(db: PaymentDBResponse) -> Self {
        Self {
            id: db.id,
            student_id: db.student_id,
            group_id: db.group_id,
            cycle_index: db.cycle_index,
            amount_due: db.amount_due,
            is_paid: db.is_paid,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
