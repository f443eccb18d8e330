//! Lesson management endpoints.
//!
//! Creating a lesson fires the lesson half of the lifecycle engine inside
//! the same transaction: roster attendance rows, and the next cycle's
//! payments when the 12-lesson boundary is crossed.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        lessons::{LessonCreate, LessonResponse, LessonUpdate, ListLessonsQuery},
        users::Role,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Groups, Lessons, Repository, Users, lessons::LessonFilter},
        models::lessons::{LessonCreateDBRequest, LessonUpdateDBRequest},
    },
    errors::{Error, Result},
    lifecycle,
    scope::AccessScope,
    types::{LessonId, UserId},
};

fn lesson_not_found(id: LessonId) -> Error {
    Error::NotFound {
        resource: "lesson".to_string(),
        id: id.to_string(),
    }
}

/// Resolve the teaching user for a new lesson: teachers teach what they
/// create; admins must name a user with the teacher role.
async fn resolve_teacher(
    conn: &mut sqlx::SqliteConnection,
    caller: &crate::api::models::users::CurrentUser,
    requested: Option<UserId>,
) -> Result<UserId> {
    match caller.role {
        Role::Teacher => Ok(caller.id),
        _ => {
            let teacher_id = requested.ok_or_else(|| Error::BadRequest {
                message: "teacher_id is required".to_string(),
            })?;

            let teacher = Users::new(conn).get_by_id(teacher_id).await?.ok_or_else(|| Error::BadRequest {
                message: format!("No such user: {teacher_id}"),
            })?;

            if teacher.role != Role::Teacher {
                return Err(Error::BadRequest {
                    message: format!("User {teacher_id} does not have the teacher role"),
                });
            }

            Ok(teacher_id)
        }
    }
}

#[utoipa::path(
    get,
    path = "/lessons",
    tag = "lessons",
    summary = "List lessons",
    params(ListLessonsQuery),
    responses(
        (status = 200, description = "Lessons visible to the caller", body = Vec<LessonResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_lessons(
    State(state): State<AppState>,
    Query(query): Query<ListLessonsQuery>,
    current_user: RequiresPermission<resource::Lessons, operation::ReadOwn>,
) -> Result<Json<Vec<LessonResponse>>> {
    let scope = AccessScope::from(&current_user.user);
    let (skip, limit) = query.pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lessons = Lessons::new(&mut conn)
        .list(&LessonFilter::new(scope, skip, limit).with_group(query.group_id))
        .await?;

    Ok(Json(lessons.into_iter().map(LessonResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/lessons",
    tag = "lessons",
    summary = "Create lesson",
    request_body = LessonCreate,
    responses(
        (status = 201, description = "Lesson created; attendance rows generated for the whole roster", body = LessonResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Group not found or not visible"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_lesson(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Lessons, operation::CreateOwn>,
    Json(create): Json<LessonCreate>,
) -> Result<(StatusCode, Json<LessonResponse>)> {
    let scope = AccessScope::from(&current_user.user);

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    // Teachers may only schedule lessons for groups backed by their own
    // courses; the scoped fetch hides everything else
    Groups::new(&mut tx)
        .get_scoped(create.group_id, &scope)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "group".to_string(),
            id: create.group_id.to_string(),
        })?;

    let teacher_id = resolve_teacher(&mut tx, &current_user.user, create.teacher_id).await?;

    let lesson = Lessons::new(&mut tx)
        .create(&LessonCreateDBRequest {
            topic: create.topic,
            date: create.date,
            teacher_id,
            group_id: create.group_id,
        })
        .await?;

    // Attendance and cycle billing commit atomically with the lesson
    lifecycle::on_lesson_created(&mut tx, &lesson).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(LessonResponse::from(lesson))))
}

#[utoipa::path(
    get,
    path = "/lessons/{id}",
    tag = "lessons",
    summary = "Get lesson",
    responses(
        (status = 200, description = "Lesson details", body = LessonResponse),
        (status = 404, description = "Not found or not visible"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_lesson(
    State(state): State<AppState>,
    Path(id): Path<LessonId>,
    current_user: RequiresPermission<resource::Lessons, operation::ReadOwn>,
) -> Result<Json<LessonResponse>> {
    let scope = AccessScope::from(&current_user.user);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lesson = Lessons::new(&mut conn)
        .get_scoped(id, &scope)
        .await?
        .ok_or_else(|| lesson_not_found(id))?;

    Ok(Json(LessonResponse::from(lesson)))
}

#[utoipa::path(
    patch,
    path = "/lessons/{id}",
    tag = "lessons",
    summary = "Update lesson",
    request_body = LessonUpdate,
    responses(
        (status = 200, description = "Lesson updated", body = LessonResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_lesson(
    State(state): State<AppState>,
    Path(id): Path<LessonId>,
    current_user: RequiresPermission<resource::Lessons, operation::UpdateOwn>,
    Json(update): Json<LessonUpdate>,
) -> Result<Json<LessonResponse>> {
    let scope = AccessScope::from(&current_user.user);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Lessons::new(&mut conn);

    repo.get_scoped(id, &scope).await?.ok_or_else(|| lesson_not_found(id))?;

    let lesson = repo
        .update(
            id,
            &LessonUpdateDBRequest {
                topic: update.topic,
                date: update.date,
            },
        )
        .await?;

    Ok(Json(LessonResponse::from(lesson)))
}

#[utoipa::path(
    delete,
    path = "/lessons/{id}",
    tag = "lessons",
    summary = "Delete lesson",
    responses(
        (status = 204, description = "Lesson deleted, cascading to its attendance records"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_lesson(
    State(state): State<AppState>,
    Path(id): Path<LessonId>,
    current_user: RequiresPermission<resource::Lessons, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let scope = AccessScope::from(&current_user.user);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Lessons::new(&mut conn);

    repo.get_scoped(id, &scope).await?.ok_or_else(|| lesson_not_found(id))?;
    repo.delete(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
