//! Payment endpoints.
//!
//! Payments are generated exclusively by the lifecycle engine; the API
//! surface reads them and settles them. Amounts are never editable.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::payments::{ListPaymentsQuery, PaymentResponse, PaymentUpdate},
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Payments, Repository, payments::PaymentFilter},
        models::payments::PaymentUpdateDBRequest,
    },
    errors::{Error, Result},
    scope::AccessScope,
    types::PaymentId,
};

fn payment_not_found(id: PaymentId) -> Error {
    Error::NotFound {
        resource: "payment".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/payments",
    tag = "payments",
    summary = "List payments",
    params(ListPaymentsQuery),
    responses(
        (status = 200, description = "Payments visible to the caller", body = Vec<PaymentResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentsQuery>,
    current_user: RequiresPermission<resource::Payments, operation::ReadOwn>,
) -> Result<Json<Vec<PaymentResponse>>> {
    let scope = AccessScope::from(&current_user.user);
    let (skip, limit) = query.pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let payments = Payments::new(&mut conn)
        .list(
            &PaymentFilter::new(scope, skip, limit)
                .with_group(query.group_id)
                .with_is_paid(query.is_paid),
        )
        .await?;

    Ok(Json(payments.into_iter().map(PaymentResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/payments/{id}",
    tag = "payments",
    summary = "Get payment",
    responses(
        (status = 200, description = "Payment details", body = PaymentResponse),
        (status = 404, description = "Not found or not visible"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
    current_user: RequiresPermission<resource::Payments, operation::ReadOwn>,
) -> Result<Json<PaymentResponse>> {
    let scope = AccessScope::from(&current_user.user);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let payment = Payments::new(&mut conn)
        .get_scoped(id, &scope)
        .await?
        .ok_or_else(|| payment_not_found(id))?;

    Ok(Json(PaymentResponse::from(payment)))
}

#[utoipa::path(
    patch,
    path = "/payments/{id}",
    tag = "payments",
    summary = "Settle or un-settle payment",
    request_body = PaymentUpdate,
    responses(
        (status = 200, description = "Payment updated", body = PaymentResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_payment(
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
    _: RequiresPermission<resource::Payments, operation::UpdateAll>,
    Json(update): Json<PaymentUpdate>,
) -> Result<Json<PaymentResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let payment = Payments::new(&mut conn)
        .update(id, &PaymentUpdateDBRequest { is_paid: update.is_paid })
        .await?;

    Ok(Json(PaymentResponse::from(payment)))
}
