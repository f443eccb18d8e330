//! Authentication and authorization system.
//!
//! # Authentication
//!
//! Two equivalent ways to present a session JWT:
//!
//! - `Authorization: Bearer <token>` for API clients
//! - the HTTP-only session cookie set by `/authentication/login`
//!
//! Tokens are created at login/registration and carry the account's id,
//! username, email, and role; nothing is looked up per-request.
//!
//! # Authorization
//!
//! - [`permissions`]: the role→permission matrix and the
//!   [`permissions::RequiresPermission`] extractor handlers declare their
//!   requirement with
//! - [`crate::scope::AccessScope`]: narrows reads to what a role may see
//!
//! Mutations by an unpermitted role are rejected with 403; reads are
//! filtered, never rejected.
//!
//! # Modules
//!
//! - [`current_user`]: Extractor for the authenticated user in handlers
//! - [`password`]: Password hashing and verification using Argon2
//! - [`permissions`]: Permission checking and access control logic
//! - [`session`]: JWT session token creation and verification

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
