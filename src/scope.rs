//! Role-based access scoping.
//!
//! Every list/get path in the db layer takes an [`AccessScope`] and narrows
//! its query to what that role may see:
//!
//! - Admins see everything.
//! - Teachers see their own courses, groups (via the backing course), and
//!   lessons; attendance for their own lessons; and all payments.
//! - Students see the groups they belong to, the courses backing those
//!   groups, the lessons of those groups, and their own attendance and
//!   payments.
//!
//! The enum is exhaustive over [`Role`], so the fail-closed default is a
//! compile-time-checked match arm rather than a runtime fallthrough. Reads
//! filter; mutations by an unpermitted role are rejected at the permission
//! layer (see [`crate::auth::permissions`]).

use crate::api::models::users::{CurrentUser, Role};
use crate::types::UserId;

/// The narrowing applied to entity queries on behalf of a requesting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    /// Unrestricted
    Admin,
    /// Restricted to entities taught/owned by this teacher
    Teacher(UserId),
    /// Restricted to entities referencing this student
    Student(UserId),
}

impl From<&CurrentUser> for AccessScope {
    fn from(user: &CurrentUser) -> Self {
        match user.role {
            Role::Admin => AccessScope::Admin,
            Role::Teacher => AccessScope::Teacher(user.id),
            Role::Student => AccessScope::Student(user.id),
        }
    }
}

impl AccessScope {
    pub fn is_admin(&self) -> bool {
        matches!(self, AccessScope::Admin)
    }

    /// The user a user-entity query collapses to: admins see all users,
    /// everyone else sees only themselves.
    pub fn visible_user(&self) -> Option<UserId> {
        match self {
            AccessScope::Admin => None,
            AccessScope::Teacher(id) | AccessScope::Student(id) => Some(*id),
        }
    }
}
