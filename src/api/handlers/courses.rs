//! Course management endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        courses::{CourseCreate, CourseResponse, CourseUpdate, ListCoursesQuery},
        users::Role,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Courses, Repository, Users, courses::CourseFilter},
        models::courses::{CourseCreateDBRequest, CourseUpdateDBRequest},
    },
    errors::{Error, Result},
    scope::AccessScope,
    types::{CourseId, UserId},
};

fn course_not_found(id: CourseId) -> Error {
    Error::NotFound {
        resource: "course".to_string(),
        id: id.to_string(),
    }
}

/// Resolve the owning teacher for a new course: teachers own what they
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
    path = "/courses",
    tag = "courses",
    summary = "List courses",
    params(ListCoursesQuery),
    responses(
        (status = 200, description = "Courses visible to the caller", body = Vec<CourseResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<ListCoursesQuery>,
    current_user: RequiresPermission<resource::Courses, operation::ReadOwn>,
) -> Result<Json<Vec<CourseResponse>>> {
    let scope = AccessScope::from(&current_user.user);
    let (skip, limit) = query.pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let courses = Courses::new(&mut conn).list(&CourseFilter::new(scope, skip, limit)).await?;

    Ok(Json(courses.into_iter().map(CourseResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/courses",
    tag = "courses",
    summary = "Create course",
    request_body = CourseCreate,
    responses(
        (status = 201, description = "Course created", body = CourseResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_course(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Courses, operation::CreateOwn>,
    Json(create): Json<CourseCreate>,
) -> Result<(StatusCode, Json<CourseResponse>)> {
    if create.price.is_sign_negative() {
        return Err(Error::BadRequest {
            message: "price cannot be negative".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let teacher_id = resolve_teacher(&mut conn, &current_user.user, create.teacher_id).await?;

    let course = Courses::new(&mut conn)
        .create(&CourseCreateDBRequest {
            title: create.title,
            description: create.description,
            price: create.price,
            teacher_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CourseResponse::from(course))))
}

#[utoipa::path(
    get,
    path = "/courses/{id}",
    tag = "courses",
    summary = "Get course",
    responses(
        (status = 200, description = "Course details", body = CourseResponse),
        (status = 404, description = "Not found or not visible"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<CourseId>,
    current_user: RequiresPermission<resource::Courses, operation::ReadOwn>,
) -> Result<Json<CourseResponse>> {
    let scope = AccessScope::from(&current_user.user);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let course = Courses::new(&mut conn)
        .get_scoped(id, &scope)
        .await?
        .ok_or_else(|| course_not_found(id))?;

    Ok(Json(CourseResponse::from(course)))
}

#[utoipa::path(
    patch,
    path = "/courses/{id}",
    tag = "courses",
    summary = "Update course",
    request_body = CourseUpdate,
    responses(
        (status = 200, description = "Course updated", body = CourseResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_course(
    State(state): State<AppState>,
    Path(id): Path<CourseId>,
    current_user: RequiresPermission<resource::Courses, operation::UpdateOwn>,
    Json(update): Json<CourseUpdate>,
) -> Result<Json<CourseResponse>> {
    if update.price.is_some_and(|p| p.is_sign_negative()) {
        return Err(Error::BadRequest {
            message: "price cannot be negative".to_string(),
        });
    }

    let scope = AccessScope::from(&current_user.user);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Courses::new(&mut conn);

    // Ownership check via the scoped fetch; a foreign course is invisible
    repo.get_scoped(id, &scope).await?.ok_or_else(|| course_not_found(id))?;

    let course = repo
        .update(
            id,
            &CourseUpdateDBRequest {
                title: update.title,
                description: update.description,
                price: update.price,
            },
        )
        .await?;

    Ok(Json(CourseResponse::from(course)))
}

#[utoipa::path(
    delete,
    path = "/courses/{id}",
    tag = "courses",
    summary = "Delete course",
    responses(
        (status = 204, description = "Course deleted, cascading to its groups, lessons, and payments"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<CourseId>,
    current_user: RequiresPermission<resource::Courses, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let scope = AccessScope::from(&current_user.user);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Courses::new(&mut conn);

    repo.get_scoped(id, &scope).await?.ok_or_else(|| course_not_found(id))?;
    repo.delete(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
