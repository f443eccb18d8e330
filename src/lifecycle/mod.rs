//! Attendance and payment lifecycle engine.
//!
//! Two triggers drive all automatic record creation:
//!
//! - [`on_students_enrolled`]: fires when a group's roster gains students.
//!   Generates the joining students' payment for the current billing cycle,
//!   prorated when lessons have already occurred in that cycle.
//! - [`on_lesson_created`]: fires after a lesson is durably created. Fills in
//!   attendance records for the full roster, and opens the next billing cycle
//!   for every enrolled student when the lesson count crosses a 12-lesson
//!   boundary.
//!
//! Both triggers take a plain connection and are invoked by the write path
//! inside the same transaction as the provoking mutation, so a reader never
//! observes a lesson without its attendance rows or a join without its
//! payment row. There is no dispatch registry; call sites invoke the trigger
//! functions directly after the write.
//!
//! Idempotence is existence-checks plus the storage uniqueness constraints on
//! (student, lesson) and (student, group, cycle_index): a re-entrant or
//! concurrent duplicate firing inserts nothing and reports nothing inserted.

mod enrollment;
mod lesson;

pub use enrollment::on_students_enrolled;
pub use lesson::{LessonTriggerReport, on_lesson_created};

use rust_decimal::{Decimal, RoundingStrategy};

/// A billing cycle is a block of 12 lessons within a group.
pub const LESSONS_PER_CYCLE: i64 = 12;

/// Where a group currently sits in its billing cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclePosition {
    /// 1-based index of the cycle in progress
    pub index: i64,
    /// Lessons already held in that cycle, 0..12
    pub lessons_into_cycle: i64,
}

/// Compute the cycle position from the number of lessons recorded so far.
pub fn cycle_position(total_lessons: i64) -> CyclePosition {
    CyclePosition {
        index: total_lessons / LESSONS_PER_CYCLE + 1,
        lessons_into_cycle: total_lessons % LESSONS_PER_CYCLE,
    }
}

/// Fee for a student joining `lessons_into_cycle` lessons into a cycle: the
/// remaining fraction of the cycle fee, rounded to 2 decimal places. Joining
/// exactly at a cycle boundary pays the full fee.
pub fn prorated_amount(price: Decimal, lessons_into_cycle: i64) -> Decimal {
    if lessons_into_cycle == 0 {
        return price;
    }

    let remaining = Decimal::from(LESSONS_PER_CYCLE - lessons_into_cycle);
    (remaining / Decimal::from(LESSONS_PER_CYCLE) * price).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
