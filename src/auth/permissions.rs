//! Permission checking and access control.
//!
//! Handlers declare their requirement in the signature through the
//! [`RequiresPermission`] extractor:
//!
//! ```ignore
//! async fn create_group(
//!     State(state): State<AppState>,
//!     current_user: RequiresPermission<resource::Groups, operation::CreateAll>,
//!     Json(create): Json<GroupCreate>,
//! ) -> Result<...> { ... }
//! ```
//!
//! The role→permission matrix is an exhaustive match over the closed [`Role`]
//! enum, so an unmatched combination falls through to "denied" at compile
//! time rather than through a runtime string comparison. `*Own` grants are
//! coarse: they say the role may perform the operation on *some* entities,
//! and the db layer's [`crate::scope::AccessScope`] narrowing plus handler
//! ownership checks decide which ones.

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    errors::Error,
    types::{Operation, Permission, Resource},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;
use std::ops::Deref;

/// Marker trait tying a zero-sized type to a [`Resource`]
pub trait ResourceMarker: Send + Sync {
    const RESOURCE: Resource;
}

/// Marker trait tying a zero-sized type to an [`Operation`]
pub trait OperationMarker: Send + Sync {
    const OPERATION: Operation;
}

macro_rules! resource_markers {
    ($($name:ident),* $(,)?) => {
        $(
            pub struct $name;
            impl super::ResourceMarker for $name {
                const RESOURCE: crate::types::Resource = crate::types::Resource::$name;
            }
        )*
    };
}

macro_rules! operation_markers {
    ($($name:ident),* $(,)?) => {
        $(
            pub struct $name;
            impl super::OperationMarker for $name {
                const OPERATION: crate::types::Operation = crate::types::Operation::$name;
            }
        )*
    };
}

pub mod resource {
    resource_markers!(Users, Courses, Groups, Lessons, Attendance, Payments);
}

pub mod operation {
    operation_markers!(CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, UpdateOwn, DeleteAll, DeleteOwn);
}

/// Whether `role` may perform `operation` on `resource` at all.
///
/// Admins are unrestricted. Teachers own their courses, lessons, and
/// attendance records, read their groups, and may read all payments.
/// Students are read-only over their own slice of every entity.
pub fn has_permission(role: Role, resource: Resource, operation: Operation) -> bool {
    match role {
        Role::Admin => true,
        Role::Teacher => matches!(
            (resource, operation),
            (Resource::Users, Operation::ReadOwn)
                | (
                    Resource::Courses,
                    Operation::ReadOwn | Operation::CreateOwn | Operation::UpdateOwn | Operation::DeleteOwn
                )
                | (Resource::Groups, Operation::ReadOwn)
                | (
                    Resource::Lessons,
                    Operation::ReadOwn | Operation::CreateOwn | Operation::UpdateOwn | Operation::DeleteOwn
                )
                | (
                    Resource::Attendance,
                    Operation::ReadOwn | Operation::CreateOwn | Operation::UpdateOwn | Operation::DeleteOwn
                )
                | (Resource::Payments, Operation::ReadOwn | Operation::ReadAll)
        ),
        Role::Student => matches!(operation, Operation::ReadOwn),
    }
}

/// Extractor that authenticates the caller and checks a single permission.
///
/// Dereferences to [`CurrentUser`] so handlers can use the caller's identity
/// directly.
pub struct RequiresPermission<R, O> {
    pub user: CurrentUser,
    _marker: PhantomData<(R, O)>,
}

impl<R, O> Deref for RequiresPermission<R, O> {
    type Target = CurrentUser;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl<R, O> RequiresPermission<R, O> {
    pub fn into_user(self) -> CurrentUser {
        self.user
    }
}

impl<R, O> FromRequestParts<AppState> for RequiresPermission<R, O>
where
    R: ResourceMarker,
    O: OperationMarker,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;

        if !has_permission(user.role, R::RESOURCE, O::OPERATION) {
            return Err(Error::InsufficientPermissions {
                required: Permission::Allow(R::RESOURCE, O::OPERATION),
                action: O::OPERATION,
                resource: R::RESOURCE.to_string(),
            });
        }

        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_is_unrestricted() {
        for resource in [
            Resource::Users,
            Resource::Courses,
            Resource::Groups,
            Resource::Lessons,
            Resource::Attendance,
            Resource::Payments,
        ] {
            assert!(has_permission(Role::Admin, resource, Operation::DeleteAll));
            assert!(has_permission(Role::Admin, resource, Operation::CreateAll));
        }
    }

    #[test]
    fn test_teacher_matrix() {
        // Owns lessons and courses
        assert!(has_permission(Role::Teacher, Resource::Lessons, Operation::CreateOwn));
        assert!(has_permission(Role::Teacher, Resource::Courses, Operation::UpdateOwn));
        // Reads but never writes groups
        assert!(has_permission(Role::Teacher, Resource::Groups, Operation::ReadOwn));
        assert!(!has_permission(Role::Teacher, Resource::Groups, Operation::CreateAll));
        assert!(!has_permission(Role::Teacher, Resource::Groups, Operation::UpdateAll));
        // Reads all payments, settles none
        assert!(has_permission(Role::Teacher, Resource::Payments, Operation::ReadAll));
        assert!(!has_permission(Role::Teacher, Resource::Payments, Operation::UpdateAll));
        // No user administration
        assert!(!has_permission(Role::Teacher, Resource::Users, Operation::CreateAll));
    }

    #[test]
    fn test_student_is_read_only() {
        for resource in [
            Resource::Users,
            Resource::Courses,
            Resource::Groups,
            Resource::Lessons,
            Resource::Attendance,
            Resource::Payments,
        ] {
            assert!(has_permission(Role::Student, resource, Operation::ReadOwn));
            assert!(!has_permission(Role::Student, resource, Operation::ReadAll));
            assert!(!has_permission(Role::Student, resource, Operation::CreateOwn));
            assert!(!has_permission(Role::Student, resource, Operation::UpdateOwn));
            assert!(!has_permission(Role::Student, resource, Operation::DeleteOwn));
        }
    }
}
