//! Group management and roster endpoints.
//!
//! Enrolling students here is what fires the enrollment half of the
//! lifecycle engine: the membership insert and the resulting payment rows
//! commit atomically.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        groups::{EnrollStudentsRequest, EnrollStudentsResponse, GroupCreate, GroupResponse, GroupUpdate, ListGroupsQuery},
        users::{Role, UserResponse},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Courses, Groups, Repository, Users, groups::GroupFilter},
        models::groups::{GroupCreateDBRequest, GroupUpdateDBRequest},
    },
    errors::{Error, Result},
    lifecycle,
    scope::AccessScope,
    types::{GroupId, UserId},
};

fn group_not_found(id: GroupId) -> Error {
    Error::NotFound {
        resource: "group".to_string(),
        id: id.to_string(),
    }
}

async fn validate_course_exists(conn: &mut sqlx::SqliteConnection, course_id: crate::types::CourseId) -> Result<()> {
    if Courses::new(conn).get_by_id(course_id).await?.is_none() {
        return Err(Error::BadRequest {
            message: format!("No such course: {course_id}"),
        });
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/groups",
    tag = "groups",
    summary = "List groups",
    params(ListGroupsQuery),
    responses(
        (status = 200, description = "Groups visible to the caller", body = Vec<GroupResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_groups(
    State(state): State<AppState>,
    Query(query): Query<ListGroupsQuery>,
    current_user: RequiresPermission<resource::Groups, operation::ReadOwn>,
) -> Result<Json<Vec<GroupResponse>>> {
    let scope = AccessScope::from(&current_user.user);
    let (skip, limit) = query.pagination.params();
    let include_students = query
        .include
        .as_deref()
        .unwrap_or("")
        .split(',')
        .any(|part| part.trim() == "students");

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Groups::new(&mut conn);
    let groups = repo.list(&GroupFilter::new(scope, skip, limit)).await?;

    let mut response_groups = Vec::with_capacity(groups.len());
    for group in groups {
        let response = if include_students {
            let roster = repo.get_roster(group.id).await?;
            GroupResponse::from(group).with_students(roster.into_iter().map(UserResponse::from).collect())
        } else {
            GroupResponse::from(group)
        };
        response_groups.push(response);
    }

    Ok(Json(response_groups))
}

#[utoipa::path(
    post,
    path = "/groups",
    tag = "groups",
    summary = "Create group",
    request_body = GroupCreate,
    responses(
        (status = 201, description = "Group created", body = GroupResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_group(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Groups, operation::CreateAll>,
    Json(create): Json<GroupCreate>,
) -> Result<(StatusCode, Json<GroupResponse>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if let Some(course_id) = create.course_id {
        validate_course_exists(&mut conn, course_id).await?;
    }

    let group = Groups::new(&mut conn)
        .create(&GroupCreateDBRequest {
            name: create.name,
            course_id: create.course_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(GroupResponse::from(group))))
}

#[utoipa::path(
    get,
    path = "/groups/{id}",
    tag = "groups",
    summary = "Get group",
    responses(
        (status = 200, description = "Group details", body = GroupResponse),
        (status = 404, description = "Not found or not visible"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<GroupId>,
    current_user: RequiresPermission<resource::Groups, operation::ReadOwn>,
) -> Result<Json<GroupResponse>> {
    let scope = AccessScope::from(&current_user.user);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Groups::new(&mut conn);
    let group = repo.get_scoped(id, &scope).await?.ok_or_else(|| group_not_found(id))?;
    let roster = repo.get_roster(group.id).await?;

    Ok(Json(
        GroupResponse::from(group).with_students(roster.into_iter().map(UserResponse::from).collect()),
    ))
}

#[utoipa::path(
    patch,
    path = "/groups/{id}",
    tag = "groups",
    summary = "Update group",
    request_body = GroupUpdate,
    responses(
        (status = 200, description = "Group updated", body = GroupResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<GroupId>,
    _: RequiresPermission<resource::Groups, operation::UpdateAll>,
    Json(update): Json<GroupUpdate>,
) -> Result<Json<GroupResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if let Some(course_id) = update.course_id {
        validate_course_exists(&mut conn, course_id).await?;
    }

    let group = Groups::new(&mut conn)
        .update(
            id,
            &GroupUpdateDBRequest {
                name: update.name,
                course_id: update.course_id,
            },
        )
        .await?;

    Ok(Json(GroupResponse::from(group)))
}

#[utoipa::path(
    delete,
    path = "/groups/{id}",
    tag = "groups",
    summary = "Delete group",
    responses(
        (status = 204, description = "Group deleted, cascading to its lessons, attendance, and payments"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_group(
    State(state): State<AppState>,
    Path(id): Path<GroupId>,
    _: RequiresPermission<resource::Groups, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let deleted = Groups::new(&mut conn).delete(id).await?;

    if !deleted {
        return Err(group_not_found(id));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/groups/{id}/students",
    tag = "groups",
    summary = "Get group roster",
    responses(
        (status = 200, description = "Enrolled students", body = Vec<UserResponse>),
        (status = 404, description = "Not found or not visible"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_group_students(
    State(state): State<AppState>,
    Path(id): Path<GroupId>,
    current_user: RequiresPermission<resource::Groups, operation::ReadOwn>,
) -> Result<Json<Vec<UserResponse>>> {
    let scope = AccessScope::from(&current_user.user);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Groups::new(&mut conn);
    repo.get_scoped(id, &scope).await?.ok_or_else(|| group_not_found(id))?;
    let roster = repo.get_roster(id).await?;

    Ok(Json(roster.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/groups/{id}/students",
    tag = "groups",
    summary = "Enroll students",
    request_body = EnrollStudentsRequest,
    responses(
        (status = 200, description = "Batch enrollment outcome; payments for the current cycle are generated for newly added students", body = EnrollStudentsResponse),
        (status = 400, description = "A listed user is not an active student"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn enroll_students(
    State(state): State<AppState>,
    Path(id): Path<GroupId>,
    _: RequiresPermission<resource::Groups, operation::UpdateAll>,
    Json(request): Json<EnrollStudentsRequest>,
) -> Result<Json<EnrollStudentsResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let group = Groups::new(&mut tx).get_by_id(id).await?.ok_or_else(|| group_not_found(id))?;

    // Only users with the student role can sit on a roster
    let users = Users::new(&mut tx).get_bulk(request.student_ids.clone()).await?;
    for student_id in &request.student_ids {
        match users.get(student_id) {
            Some(user) if user.role == Role::Student => {}
            Some(user) => {
                return Err(Error::BadRequest {
                    message: format!("User {} does not have the student role", user.id),
                });
            }
            None => {
                return Err(Error::BadRequest {
                    message: format!("No such user: {student_id}"),
                });
            }
        }
    }

    let newly_added = Groups::new(&mut tx).add_students(id, &request.student_ids).await?;

    // Billing for the joiners commits atomically with the membership change
    lifecycle::on_students_enrolled(&mut tx, &group, &newly_added).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let already_members: Vec<UserId> = request
        .student_ids
        .into_iter()
        .filter(|student_id| !newly_added.contains(student_id))
        .collect();

    Ok(Json(EnrollStudentsResponse {
        enrolled: newly_added,
        already_members,
    }))
}

#[utoipa::path(
    delete,
    path = "/groups/{id}/students/{student_id}",
    tag = "groups",
    summary = "Remove student from group",
    params(
        ("id" = String, Path, description = "Group id"),
        ("student_id" = String, Path, description = "Student id"),
    ),
    responses(
        (status = 204, description = "Membership removed"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_student(
    State(state): State<AppState>,
    Path((id, student_id)): Path<(GroupId, UserId)>,
    _: RequiresPermission<resource::Groups, operation::UpdateAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let removed = Groups::new(&mut conn).remove_student(id, student_id).await?;

    if !removed {
        return Err(Error::NotFound {
            resource: "membership".to_string(),
            id: format!("{id}/{student_id}"),
        });
    }

    Ok(StatusCode::NO_CONTENT)
}
