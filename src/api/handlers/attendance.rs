//! Attendance record endpoints.
//!
//! The lesson trigger generates roster-wide records automatically; these
//! endpoints exist to review and correct them, plus manual creation for
//! students who joined the roster after a lesson was recorded.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::attendance::{AttendanceCreate, AttendanceResponse, AttendanceUpdate, ListAttendanceQuery},
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Attendance, Groups, Lessons, Repository, attendance::AttendanceFilter},
        models::attendance::{AttendanceCreateDBRequest, AttendanceUpdateDBRequest},
    },
    errors::{Error, Result},
    scope::AccessScope,
    types::AttendanceId,
};

fn attendance_not_found(id: AttendanceId) -> Error {
    Error::NotFound {
        resource: "attendance record".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/attendance",
    tag = "attendance",
    summary = "List attendance records",
    params(ListAttendanceQuery),
    responses(
        (status = 200, description = "Records visible to the caller", body = Vec<AttendanceResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_attendance(
    State(state): State<AppState>,
    Query(query): Query<ListAttendanceQuery>,
    current_user: RequiresPermission<resource::Attendance, operation::ReadOwn>,
) -> Result<Json<Vec<AttendanceResponse>>> {
    let scope = AccessScope::from(&current_user.user);
    let (skip, limit) = query.pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let records = Attendance::new(&mut conn)
        .list(
            &AttendanceFilter::new(scope, skip, limit)
                .with_lesson(query.lesson_id)
                .with_status(query.status),
        )
        .await?;

    Ok(Json(records.into_iter().map(AttendanceResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/attendance",
    tag = "attendance",
    summary = "Create attendance record",
    request_body = AttendanceCreate,
    responses(
        (status = 201, description = "Record created", body = AttendanceResponse),
        (status = 400, description = "Student is not a member of the lesson's group"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Lesson not found or not visible"),
        (status = 409, description = "Record already exists for this student and lesson"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_attendance(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Attendance, operation::CreateOwn>,
    Json(create): Json<AttendanceCreate>,
) -> Result<(StatusCode, Json<AttendanceResponse>)> {
    let scope = AccessScope::from(&current_user.user);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Teachers may only write records against their own lessons
    let lesson = Lessons::new(&mut conn)
        .get_scoped(create.lesson_id, &scope)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "lesson".to_string(),
            id: create.lesson_id.to_string(),
        })?;

    // The student must belong to the lesson's group
    if !Groups::new(&mut conn).is_member(lesson.group_id, create.student_id).await? {
        return Err(Error::BadRequest {
            message: "Student is not a member of the group this lesson belongs to".to_string(),
        });
    }

    let record = Attendance::new(&mut conn)
        .create(&AttendanceCreateDBRequest {
            student_id: create.student_id,
            lesson_id: create.lesson_id,
            status: create.status,
            comment: create.comment,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(AttendanceResponse::from(record))))
}

#[utoipa::path(
    get,
    path = "/attendance/{id}",
    tag = "attendance",
    summary = "Get attendance record",
    responses(
        (status = 200, description = "Record details", body = AttendanceResponse),
        (status = 404, description = "Not found or not visible"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_attendance(
    State(state): State<AppState>,
    Path(id): Path<AttendanceId>,
    current_user: RequiresPermission<resource::Attendance, operation::ReadOwn>,
) -> Result<Json<AttendanceResponse>> {
    let scope = AccessScope::from(&current_user.user);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let record = Attendance::new(&mut conn)
        .get_scoped(id, &scope)
        .await?
        .ok_or_else(|| attendance_not_found(id))?;

    Ok(Json(AttendanceResponse::from(record)))
}

#[utoipa::path(
    patch,
    path = "/attendance/{id}",
    tag = "attendance",
    summary = "Update attendance record",
    request_body = AttendanceUpdate,
    responses(
        (status = 200, description = "Record updated", body = AttendanceResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_attendance(
    State(state): State<AppState>,
    Path(id): Path<AttendanceId>,
    current_user: RequiresPermission<resource::Attendance, operation::UpdateOwn>,
    Json(update): Json<AttendanceUpdate>,
) -> Result<Json<AttendanceResponse>> {
    let scope = AccessScope::from(&current_user.user);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Attendance::new(&mut conn);

    repo.get_scoped(id, &scope).await?.ok_or_else(|| attendance_not_found(id))?;

    let record = repo
        .update(
            id,
            &AttendanceUpdateDBRequest {
                status: update.status,
                comment: update.comment,
            },
        )
        .await?;

    Ok(Json(AttendanceResponse::from(record)))
}

#[utoipa::path(
    delete,
    path = "/attendance/{id}",
    tag = "attendance",
    summary = "Delete attendance record",
    responses(
        (status = 204, description = "Record deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_attendance(
    State(state): State<AppState>,
    Path(id): Path<AttendanceId>,
    current_user: RequiresPermission<resource::Attendance, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let scope = AccessScope::from(&current_user.user);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Attendance::new(&mut conn);

    repo.get_scoped(id, &scope).await?.ok_or_else(|| attendance_not_found(id))?;
    repo.delete(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
