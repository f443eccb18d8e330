//! End-to-end flows over the full router.

use crate::api::models::attendance::AttendanceResponse;
use crate::api::models::auth::AuthResponse;
use crate::api::models::groups::EnrollStudentsResponse;
use crate::api::models::lessons::LessonResponse;
use crate::api::models::payments::PaymentResponse;
use crate::api::models::users::{Role, UserResponse};
use crate::db::handlers::Groups;
use crate::test_utils::{bearer_for, create_test_server, seed_course, seed_group, seed_lesson, seed_user, seed_user_with_password};
use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::SqlitePool;

#[sqlx::test]
#[test_log::test]
async fn test_register_login_self_visibility(pool: SqlitePool) {
    let server = create_test_server(pool.clone());
    seed_user(&pool, "someone-else", Role::Student).await;

    // Register a student account
    let response = server
        .post("/authentication/register")
        .json(&json!({
            "username": "newstudent",
            "email": "newstudent@example.com",
            "full_name": "New Student",
            "password": "correct-horse-battery"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let auth: AuthResponse = response.json();
    assert_eq!(auth.user.role, Role::Student);

    // Login with the same credentials
    let response = server
        .post("/authentication/login")
        .json(&json!({
            "email": "newstudent@example.com",
            "password": "correct-horse-battery"
        }))
        .await;
    response.assert_status_ok();
    let auth: AuthResponse = response.json();

    // A student listing users sees only themselves
    let response = server.get("/api/v1/users").authorization_bearer(&auth.token).await;
    response.assert_status_ok();
    let users: Vec<UserResponse> = response.json();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].email, "newstudent@example.com");
}

#[sqlx::test]
#[test_log::test]
async fn test_unauthenticated_requests_rejected(pool: SqlitePool) {
    let server = create_test_server(pool);

    let response = server.get("/api/v1/lessons").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server.post("/api/v1/groups").json(&json!({"name": "x"})).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[sqlx::test]
#[test_log::test]
async fn test_student_mutations_forbidden(pool: SqlitePool) {
    let server = create_test_server(pool.clone());
    let student = seed_user(&pool, "s", Role::Student).await;
    let token = bearer_for(&student);

    // Reads filter, mutations reject: a student may list groups but not create them
    let response = server.get("/api/v1/groups").authorization_bearer(&token).await;
    response.assert_status_ok();

    let response = server
        .post("/api/v1/groups")
        .authorization_bearer(&token)
        .json(&json!({"name": "rogue group"}))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    // Teachers cannot create groups either
    let teacher = seed_user(&pool, "t", Role::Teacher).await;
    let response = server
        .post("/api/v1/groups")
        .authorization_bearer(&bearer_for(&teacher))
        .json(&json!({"name": "rogue group"}))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[sqlx::test]
#[test_log::test]
async fn test_lesson_visibility_is_role_scoped(pool: SqlitePool) {
    let server = create_test_server(pool.clone());

    let admin = seed_user(&pool, "admin", Role::Admin).await;
    let t1 = seed_user(&pool, "t1", Role::Teacher).await;
    let t2 = seed_user(&pool, "t2", Role::Teacher).await;
    let group_a = seed_group(&pool, None).await;
    let group_b = seed_group(&pool, None).await;
    let student = seed_user(&pool, "s", Role::Student).await;

    let mut conn = pool.acquire().await.unwrap();
    Groups::new(&mut conn).add_students(group_a.id, &[student.id]).await.unwrap();
    drop(conn);

    seed_lesson(&pool, group_a.id, t1.id, "a1").await;
    seed_lesson(&pool, group_b.id, t2.id, "b1").await;
    seed_lesson(&pool, group_b.id, t2.id, "b2").await;

    // Admin sees all three
    let response = server.get("/api/v1/lessons").authorization_bearer(&bearer_for(&admin)).await;
    let lessons: Vec<LessonResponse> = response.json();
    assert_eq!(lessons.len(), 3);

    // t1 sees only the lesson they teach
    let response = server.get("/api/v1/lessons").authorization_bearer(&bearer_for(&t1)).await;
    let lessons: Vec<LessonResponse> = response.json();
    assert_eq!(lessons.len(), 1);
    assert_eq!(lessons[0].teacher_id, t1.id);

    // The student sees only lessons of their group
    let response = server.get("/api/v1/lessons").authorization_bearer(&bearer_for(&student)).await;
    let lessons: Vec<LessonResponse> = response.json();
    assert_eq!(lessons.len(), 1);
    assert_eq!(lessons[0].group_id, group_a.id);
}

#[sqlx::test]
#[test_log::test]
async fn test_enrollment_and_lesson_lifecycle_through_api(pool: SqlitePool) {
    let server = create_test_server(pool.clone());

    let admin = seed_user_with_password(&pool, "admin", Role::Admin, "admin-pass-123").await;
    let teacher = seed_user(&pool, "t", Role::Teacher).await;
    let s1 = seed_user(&pool, "s1", Role::Student).await;
    let s2 = seed_user(&pool, "s2", Role::Student).await;
    let admin_token = bearer_for(&admin);

    // Admin provisions a course and a group
    let response = server
        .post("/api/v1/courses")
        .authorization_bearer(&admin_token)
        .json(&json!({
            "title": "General English",
            "price": "120.00",
            "teacher_id": teacher.id
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let course: crate::api::models::courses::CourseResponse = response.json();

    let response = server
        .post("/api/v1/groups")
        .authorization_bearer(&admin_token)
        .json(&json!({"name": "Evening cohort", "course_id": course.id}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let group: crate::api::models::groups::GroupResponse = response.json();

    // Enrolling both students opens cycle 1 at full price
    let response = server
        .post(&format!("/api/v1/groups/{}/students", group.id))
        .authorization_bearer(&admin_token)
        .json(&json!({"student_ids": [s1.id, s2.id]}))
        .await;
    response.assert_status_ok();
    let enrollment: EnrollStudentsResponse = response.json();
    assert_eq!(enrollment.enrolled.len(), 2);
    assert!(enrollment.already_members.is_empty());

    // The teacher records a lesson; the roster gets attendance rows
    let response = server
        .post("/api/v1/lessons")
        .authorization_bearer(&bearer_for(&teacher))
        .json(&json!({
            "topic": "Introductions",
            "date": "2024-09-02",
            "group_id": group.id
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let lesson: LessonResponse = response.json();
    assert_eq!(lesson.teacher_id, teacher.id);

    let response = server
        .get("/api/v1/attendance")
        .authorization_bearer(&bearer_for(&teacher))
        .add_query_param("lesson_id", lesson.id.to_string())
        .await;
    let records: Vec<AttendanceResponse> = response.json();
    assert_eq!(records.len(), 2);

    // Each student sees exactly their own payment of 120.00
    let response = server.get("/api/v1/payments").authorization_bearer(&bearer_for(&s1)).await;
    let payments: Vec<PaymentResponse> = response.json();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].student_id, s1.id);
    assert_eq!(payments[0].cycle_index, 1);
    assert_eq!(payments[0].amount_due, Decimal::new(12000, 2));
    assert!(!payments[0].is_paid);

    // Settling is admin-only
    let payment_id = payments[0].id;
    let response = server
        .patch(&format!("/api/v1/payments/{payment_id}"))
        .authorization_bearer(&bearer_for(&teacher))
        .json(&json!({"is_paid": true}))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = server
        .patch(&format!("/api/v1/payments/{payment_id}"))
        .authorization_bearer(&admin_token)
        .json(&json!({"is_paid": true}))
        .await;
    response.assert_status_ok();
    let settled: PaymentResponse = response.json();
    assert!(settled.is_paid);
}

#[sqlx::test]
#[test_log::test]
async fn test_mid_cycle_enrollment_prorated_through_api(pool: SqlitePool) {
    let server = create_test_server(pool.clone());

    let admin = seed_user(&pool, "admin", Role::Admin).await;
    let teacher = seed_user(&pool, "t", Role::Teacher).await;
    let course = seed_course(&pool, teacher.id, Decimal::new(12000, 2)).await;
    let group = seed_group(&pool, Some(course.id)).await;

    for i in 0..5 {
        seed_lesson(&pool, group.id, teacher.id, &format!("lesson {i}")).await;
    }

    let student = seed_user(&pool, "s", Role::Student).await;
    let response = server
        .post(&format!("/api/v1/groups/{}/students", group.id))
        .authorization_bearer(&bearer_for(&admin))
        .json(&json!({"student_ids": [student.id]}))
        .await;
    response.assert_status_ok();

    // (12-5)/12 * 120.00 = 70.00
    let response = server.get("/api/v1/payments").authorization_bearer(&bearer_for(&student)).await;
    let payments: Vec<PaymentResponse> = response.json();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount_due, Decimal::new(7000, 2));
}

#[sqlx::test]
#[test_log::test]
async fn test_teacher_cannot_schedule_for_foreign_group(pool: SqlitePool) {
    let server = create_test_server(pool.clone());

    let t1 = seed_user(&pool, "t1", Role::Teacher).await;
    let t2 = seed_user(&pool, "t2", Role::Teacher).await;
    let course = seed_course(&pool, t1.id, Decimal::new(10000, 2)).await;
    let group = seed_group(&pool, Some(course.id)).await;

    // t2 does not own the backing course, so the group is invisible to them
    let response = server
        .post("/api/v1/lessons")
        .authorization_bearer(&bearer_for(&t2))
        .json(&json!({
            "topic": "Not my group",
            "date": "2024-09-02",
            "group_id": group.id
        }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    // The owner may schedule
    let response = server
        .post("/api/v1/lessons")
        .authorization_bearer(&bearer_for(&t1))
        .json(&json!({
            "topic": "My group",
            "date": "2024-09-02",
            "group_id": group.id
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
}

#[sqlx::test]
#[test_log::test]
async fn test_enrolling_non_student_rejected(pool: SqlitePool) {
    let server = create_test_server(pool.clone());

    let admin = seed_user(&pool, "admin", Role::Admin).await;
    let teacher = seed_user(&pool, "t", Role::Teacher).await;
    let group = seed_group(&pool, None).await;

    let response = server
        .post(&format!("/api/v1/groups/{}/students", group.id))
        .authorization_bearer(&bearer_for(&admin))
        .json(&json!({"student_ids": [teacher.id]}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[sqlx::test]
#[test_log::test]
async fn test_manual_attendance_membership_validation(pool: SqlitePool) {
    let server = create_test_server(pool.clone());

    let teacher = seed_user(&pool, "t", Role::Teacher).await;
    let group = seed_group(&pool, None).await;
    let lesson = seed_lesson(&pool, group.id, teacher.id, "topic").await;
    let outsider = seed_user(&pool, "outsider", Role::Student).await;
    let member = seed_user(&pool, "member", Role::Student).await;

    let mut conn = pool.acquire().await.unwrap();
    Groups::new(&mut conn).add_students(group.id, &[member.id]).await.unwrap();
    drop(conn);

    let token = bearer_for(&teacher);

    // Outsider is not on the roster: soft invariant enforced at the API layer
    let response = server
        .post("/api/v1/attendance")
        .authorization_bearer(&token)
        .json(&json!({
            "student_id": outsider.id,
            "lesson_id": lesson.id,
            "status": "absent"
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // Roster member is accepted
    let response = server
        .post("/api/v1/attendance")
        .authorization_bearer(&token)
        .json(&json!({
            "student_id": member.id,
            "lesson_id": lesson.id,
            "status": "absent"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    // A second record for the same pair conflicts
    let response = server
        .post("/api/v1/attendance")
        .authorization_bearer(&token)
        .json(&json!({
            "student_id": member.id,
            "lesson_id": lesson.id,
            "status": "present"
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}
