//! # lyceum: learning-center management backend
//!
//! `lyceum` manages the operational core of a learning center: user accounts
//! with roles (admin, teacher, student), courses with per-cycle fees, student
//! groups, scheduled lessons, attendance records, and billing-cycle payments.
//! Everything is exposed through a role-scoped REST API with JWT
//! authentication.
//!
//! ## Overview
//!
//! Access is scoped by role everywhere: teachers see only their own courses,
//! groups, and lessons; students see only their own enrollments, attendance,
//! and payments; admins see everything. Mutations by an unpermitted role are
//! rejected, reads are filtered, and an unmatched role fails closed.
//!
//! The interesting logic is the **attendance and payment lifecycle engine**
//! ([`lifecycle`]). Two write events drive it:
//!
//! - a group's roster gaining students generates each joiner's payment for
//!   the current 12-lesson billing cycle, prorated when the cycle is already
//!   underway;
//! - a lesson being created generates attendance records for the whole
//!   roster, and opens the next billing cycle for every enrolled student
//!   whenever the group's lesson count crosses a multiple of 12.
//!
//! Both triggers run inside the same transaction as the provoking write, and
//! both are idempotent: existence checks plus the storage uniqueness
//! constraints on (student, lesson) and (student, group, cycle_index) turn
//! re-entrant or concurrent duplicate firings into no-ops.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and uses SQLite (via sqlx) for persistence, with migrations
//! embedded in the binary. The **API layer** ([`api`]) holds route handlers
//! and request/response models; the **database layer** ([`db`]) follows the
//! repository pattern with one repository per entity; the **authentication
//! layer** ([`auth`]) covers JWT sessions, Argon2 password hashing, and the
//! role→permission matrix; [`scope`] narrows every read to the caller's
//! slice of the data.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use lyceum::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = lyceum::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     lyceum::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod lifecycle;
pub mod openapi;
pub mod scope;
pub mod telemetry;
#[cfg(test)]
mod test;
#[cfg(test)]
pub mod test_utils;
pub mod types;

use crate::api::models::users::Role;
use crate::auth::password;
use crate::db::handlers::{Repository, Users};
use crate::db::models::users::UserCreateDBRequest;
use crate::types::UserId;
use axum::{
    Json, Router,
    routing::{delete, get, patch, post},
};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::instrument;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;

/// Shared state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config) -> Self {
        Self { db, config }
    }
}

/// Get the lyceum database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: creates the admin account on first startup, and on later
/// startups only refreshes the password when one is configured. Returns the
/// user ID of the created or existing admin user.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, admin_password: Option<&str>, db: &SqlitePool) -> anyhow::Result<UserId> {
    let password_hash = match admin_password {
        Some(pwd) => Some(password::hash_string(pwd).map_err(|e| anyhow::anyhow!("hash admin password: {e}"))?),
        None => None,
    };

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    if let Some(existing_user) = user_repo.get_user_by_email(email).await? {
        if let Some(password_hash) = password_hash {
            sqlx::query("UPDATE users SET password_hash = ?1 WHERE email = ?2")
                .bind(password_hash)
                .bind(email)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        return Ok(existing_user.id);
    }

    let created_user = user_repo
        .create(&UserCreateDBRequest {
            username: email.to_string(),
            email: email.to_string(),
            full_name: "Administrator".to_string(),
            phone: None,
            role: Role::Admin,
            is_active: true,
            password_hash,
        })
        .await?;

    tx.commit().await?;
    Ok(created_user.id)
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    // Authentication routes at root level
    let auth_routes = Router::new()
        .route(
            "/authentication/register",
            get(api::handlers::auth::get_registration_info).post(api::handlers::auth::register),
        )
        .route("/authentication/login", post(api::handlers::auth::login))
        .route("/authentication/logout", post(api::handlers::auth::logout))
        .with_state(state.clone());

    // API routes
    let api_routes = Router::new()
        // User management (admin only for writes)
        .route("/users", get(api::handlers::users::list_users))
        .route("/users", post(api::handlers::users::create_user))
        .route("/users/{id}", get(api::handlers::users::get_user))
        .route("/users/{id}", patch(api::handlers::users::update_user))
        .route("/users/{id}", delete(api::handlers::users::delete_user))
        // Courses
        .route("/courses", get(api::handlers::courses::list_courses))
        .route("/courses", post(api::handlers::courses::create_course))
        .route("/courses/{id}", get(api::handlers::courses::get_course))
        .route("/courses/{id}", patch(api::handlers::courses::update_course))
        .route("/courses/{id}", delete(api::handlers::courses::delete_course))
        // Groups and rosters
        .route("/groups", get(api::handlers::groups::list_groups))
        .route("/groups", post(api::handlers::groups::create_group))
        .route("/groups/{id}", get(api::handlers::groups::get_group))
        .route("/groups/{id}", patch(api::handlers::groups::update_group))
        .route("/groups/{id}", delete(api::handlers::groups::delete_group))
        .route("/groups/{id}/students", get(api::handlers::groups::get_group_students))
        .route("/groups/{id}/students", post(api::handlers::groups::enroll_students))
        .route(
            "/groups/{id}/students/{student_id}",
            delete(api::handlers::groups::remove_student),
        )
        // Lessons
        .route("/lessons", get(api::handlers::lessons::list_lessons))
        .route("/lessons", post(api::handlers::lessons::create_lesson))
        .route("/lessons/{id}", get(api::handlers::lessons::get_lesson))
        .route("/lessons/{id}", patch(api::handlers::lessons::update_lesson))
        .route("/lessons/{id}", delete(api::handlers::lessons::delete_lesson))
        // Attendance
        .route("/attendance", get(api::handlers::attendance::list_attendance))
        .route("/attendance", post(api::handlers::attendance::create_attendance))
        .route("/attendance/{id}", get(api::handlers::attendance::get_attendance))
        .route("/attendance/{id}", patch(api::handlers::attendance::update_attendance))
        .route("/attendance/{id}", delete(api::handlers::attendance::delete_attendance))
        // Payments
        .route("/payments", get(api::handlers::payments::list_payments))
        .route("/payments/{id}", get(api::handlers::payments::get_payment))
        .route("/payments/{id}", patch(api::handlers::payments::update_payment))
        // Probes and docs
        .route("/health", get(api::handlers::health::health))
        .route(
            "/openapi.json",
            get(|| async { Json(crate::openapi::ApiDoc::openapi()) }),
        )
        .with_state(state.clone());

    Router::new()
        .merge(auth_routes)
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", crate::openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// The assembled application: configuration, database pool, and router.
///
/// 1. **Create**: [`Application::new`] connects the pool, runs migrations,
///    and bootstraps the initial admin account
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    state: AppState,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let db = SqlitePoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect_with(options)
            .await?;

        migrator().run(&db).await?;

        let admin_id = create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), &db).await?;
        tracing::debug!("admin user: {admin_id}");

        Ok(Self {
            state: AppState::new(db, config),
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until the shutdown future resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("listening on {addr}");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
