//! Repository implementations for database access.
//!
//! This module provides repository structs for each major entity in the system.
//! Repositories follow a consistent pattern and implement the [`Repository`] trait.
//!
//! # Design Pattern
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed CRUD operations
//! - Handles query construction and parameter binding
//! - Returns domain models from [`crate::db::models`]
//! - Uses the connection's transaction for ACID guarantees
//!
//! List and scoped-get operations take an [`crate::scope::AccessScope`]
//! through their filter types, so role narrowing happens in SQL rather than
//! being re-implemented at each call site.

pub mod attendance;
pub mod courses;
pub mod groups;
pub mod lessons;
pub mod payments;
pub mod repository;
pub mod users;

pub use attendance::Attendance;
pub use courses::Courses;
pub use groups::Groups;
pub use lessons::Lessons;
pub use payments::Payments;
pub use repository::Repository;
pub use users::Users;
