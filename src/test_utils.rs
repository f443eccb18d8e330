//! Shared helpers for tests: seeded entities, test config, auth tokens.

use crate::api::models::users::{CurrentUser, Role};
use crate::auth::password::{Argon2Params, hash_string_with_params};
use crate::auth::session;
use crate::config::Config;
use crate::db::handlers::{Courses, Groups, Lessons, Repository, Users};
use crate::db::models::{
    courses::{CourseCreateDBRequest, CourseDBResponse},
    groups::{GroupCreateDBRequest, GroupDBResponse},
    lessons::{LessonCreateDBRequest, LessonDBResponse},
    users::{UserCreateDBRequest, UserDBResponse},
};
use crate::types::{CourseId, GroupId, UserId};
use crate::{AppState, router};
use axum_test::TestServer;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use uuid::Uuid;

pub fn create_test_config() -> Config {
    let mut config = Config {
        secret_key: Some("test-secret-key-for-jwt".to_string()),
        ..Default::default()
    };
    config.auth.native.allow_registration = true;
    config
}

pub fn create_test_app_state(db: SqlitePool, config: Config) -> AppState {
    AppState::new(db, config)
}

/// Spin up an in-process server over the full router.
pub fn create_test_server(pool: SqlitePool) -> TestServer {
    let state = create_test_app_state(pool, create_test_config());
    TestServer::new(router(state)).expect("Failed to create test server")
}

/// A bearer token for an already-seeded user.
pub fn bearer_for(user: &UserDBResponse) -> String {
    let current = CurrentUser::from(user.clone());
    session::create_session_token(&current, &create_test_config()).expect("Failed to create session token")
}

/// Cheap argon2 parameters so password-based tests stay fast.
pub fn weak_hash(password: &str) -> String {
    hash_string_with_params(
        password,
        Some(Argon2Params {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }),
    )
    .expect("Failed to hash password")
}

fn unique(name: &str) -> String {
    let suffix: String = Uuid::new_v4().to_string().chars().take(8).collect();
    format!("{name}-{suffix}")
}

pub async fn seed_user(pool: &SqlitePool, name: &str, role: Role) -> UserDBResponse {
    let username = unique(name);
    let mut conn = pool.acquire().await.unwrap();
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            username: username.clone(),
            email: format!("{username}@example.com"),
            full_name: format!("{name} (test)"),
            phone: None,
            role,
            is_active: true,
            password_hash: None,
        })
        .await
        .unwrap()
}

pub async fn seed_user_with_password(pool: &SqlitePool, name: &str, role: Role, password: &str) -> UserDBResponse {
    let username = unique(name);
    let hash = weak_hash(password);
    let mut conn = pool.acquire().await.unwrap();
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            username: username.clone(),
            email: format!("{username}@example.com"),
            full_name: format!("{name} (test)"),
            phone: None,
            role,
            is_active: true,
            password_hash: Some(hash),
        })
        .await
        .unwrap()
}

pub async fn seed_course(pool: &SqlitePool, teacher_id: UserId, price: Decimal) -> CourseDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    Courses::new(&mut conn)
        .create(&CourseCreateDBRequest {
            title: unique("Course"),
            description: String::new(),
            price,
            teacher_id,
        })
        .await
        .unwrap()
}

pub async fn seed_group(pool: &SqlitePool, course_id: Option<CourseId>) -> GroupDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    Groups::new(&mut conn)
        .create(&GroupCreateDBRequest {
            name: unique("Group"),
            course_id,
        })
        .await
        .unwrap()
}

pub async fn seed_lesson(pool: &SqlitePool, group_id: GroupId, teacher_id: UserId, topic: &str) -> LessonDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    Lessons::new(&mut conn)
        .create(&LessonCreateDBRequest {
            topic: topic.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            teacher_id,
            group_id,
        })
        .await
        .unwrap()
}
