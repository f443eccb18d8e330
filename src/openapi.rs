//! OpenAPI documentation configuration.
//!
//! Aggregates every annotated handler and schema into one document, served as
//! JSON at `/api/v1/openapi.json` and interactively at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;

/// Security schemes: Bearer JWT and the session cookie.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Session JWT from /authentication/login, sent as `Authorization: Bearer <token>`."))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("lyceum_session"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lyceum API",
        description = "Learning-center management: users, courses, groups, lessons, attendance, and payments, scoped by role."
    ),
    paths(
        api::handlers::auth::get_registration_info,
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::users::list_users,
        api::handlers::users::create_user,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::courses::list_courses,
        api::handlers::courses::create_course,
        api::handlers::courses::get_course,
        api::handlers::courses::update_course,
        api::handlers::courses::delete_course,
        api::handlers::groups::list_groups,
        api::handlers::groups::create_group,
        api::handlers::groups::get_group,
        api::handlers::groups::update_group,
        api::handlers::groups::delete_group,
        api::handlers::groups::get_group_students,
        api::handlers::groups::enroll_students,
        api::handlers::groups::remove_student,
        api::handlers::lessons::list_lessons,
        api::handlers::lessons::create_lesson,
        api::handlers::lessons::get_lesson,
        api::handlers::lessons::update_lesson,
        api::handlers::lessons::delete_lesson,
        api::handlers::attendance::list_attendance,
        api::handlers::attendance::create_attendance,
        api::handlers::attendance::get_attendance,
        api::handlers::attendance::update_attendance,
        api::handlers::attendance::delete_attendance,
        api::handlers::payments::list_payments,
        api::handlers::payments::get_payment,
        api::handlers::payments::update_payment,
        api::handlers::health::health,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "authentication", description = "Session management"),
        (name = "users", description = "Account administration"),
        (name = "courses", description = "Courses and per-cycle fees"),
        (name = "groups", description = "Cohorts and rosters"),
        (name = "lessons", description = "Scheduled sessions"),
        (name = "attendance", description = "Per-lesson attendance records"),
        (name = "payments", description = "Billing-cycle payments"),
        (name = "health", description = "Service probes"),
    )
)]
pub struct ApiDoc;
