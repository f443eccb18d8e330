//! Enrollment trigger: billing for students joining a group.

use super::{cycle_position, prorated_amount};
use crate::db::errors::Result;
use crate::db::handlers::{Courses, Lessons, Payments, Repository};
use crate::db::models::groups::GroupDBResponse;
use crate::db::models::payments::PaymentCreateDBRequest;
use crate::types::{UserId, abbrev_uuid};
use sqlx::SqliteConnection;
use tracing::{debug, instrument};

/// React to students being added to a group's roster.
///
/// Fires synchronously in the same transaction as the membership insert, once
/// per batch add, with the set of newly added student ids. Ensures each
/// joining student has a payment for the group's current billing cycle:
///
/// - A group without a course has no billing policy; nothing happens.
/// - Joining exactly at a cycle boundary (or before any lessons exist) is
///   charged the full cycle fee.
/// - Joining mid-cycle is charged only for the lessons remaining in the
///   cycle, rounded to 2 decimal places.
///
/// A student who already has a payment for the current cycle is skipped, and
/// one student's pre-existing payment never blocks the rest of the batch.
/// No attendance records are created here: a joining student's attendance
/// starts with the next lesson recorded for the group.
///
/// Returns the number of payments created.
#[instrument(skip(conn, group, student_ids), fields(group_id = %abbrev_uuid(&group.id), students = student_ids.len()), err)]
pub async fn on_students_enrolled(conn: &mut SqliteConnection, group: &GroupDBResponse, student_ids: &[UserId]) -> Result<usize> {
    let Some(course_id) = group.course_id else {
        debug!("group has no course, skipping billing");
        return Ok(0);
    };

    let Some(course) = Courses::new(conn).get_by_id(course_id).await? else {
        debug!("course no longer exists, skipping billing");
        return Ok(0);
    };

    let total_lessons = Lessons::new(conn).count_for_group(group.id).await?;
    let position = cycle_position(total_lessons);
    let amount_due = prorated_amount(course.price, position.lessons_into_cycle);

    let mut created = 0;
    for student_id in student_ids {
        let mut payments = Payments::new(conn);

        // Idempotence guard against duplicate trigger firing
        if payments.exists(*student_id, group.id, position.index).await? {
            continue;
        }

        let inserted = payments
            .create_if_absent(&PaymentCreateDBRequest {
                student_id: *student_id,
                group_id: group.id,
                cycle_index: position.index,
                amount_due,
            })
            .await?;

        if inserted {
            created += 1;
        }
    }

    debug!(created, cycle = position.index, "enrollment billing complete");
    Ok(created)
}
