//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/authentication/*`): Login, registration, logout
//! - **Users** (`/api/v1/users/*`): Account management
//! - **Courses** (`/api/v1/courses/*`): Courses and per-cycle fees
//! - **Groups** (`/api/v1/groups/*`): Cohorts and rosters; enrolling fires
//!   the enrollment trigger
//! - **Lessons** (`/api/v1/lessons/*`): Scheduled sessions; creation fires
//!   the lesson trigger
//! - **Attendance** (`/api/v1/attendance/*`): Per-(student, lesson) records
//! - **Payments** (`/api/v1/payments/*`): Cycle fees generated by the
//!   lifecycle engine
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! Interactive documentation is served at `/docs` when the server is running.

pub mod handlers;
pub mod models;
