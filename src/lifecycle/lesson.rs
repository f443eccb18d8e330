//! Lesson trigger: roster attendance and cycle-boundary billing.

use super::LESSONS_PER_CYCLE;
use crate::api::models::attendance::AttendanceStatus;
use crate::db::errors::Result;
use crate::db::handlers::{Attendance, Courses, Groups, Lessons, Payments, Repository};
use crate::db::models::attendance::AttendanceCreateDBRequest;
use crate::db::models::lessons::LessonDBResponse;
use crate::db::models::payments::PaymentCreateDBRequest;
use crate::types::abbrev_uuid;
use sqlx::SqliteConnection;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// What a lesson-trigger invocation actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LessonTriggerReport {
    /// Attendance rows inserted for roster members without one
    pub attendance_created: u64,
    /// Payments opened for the next cycle (non-zero only at a 12-lesson boundary)
    pub payments_created: usize,
}

/// React to a lesson having been created.
///
/// Fires synchronously once, in the same transaction as the lesson insert.
///
/// Attendance half: every student currently on the group's roster gets an
/// attendance row for the lesson, defaulted to present with no comment,
/// persisted as a single bulk insert. Students who already have a row (a
/// re-entrant firing) are skipped.
///
/// Billing half: when the group's lesson count has just completed a full
/// cycle of 12, a payment for the cycle about to begin is created for every
/// enrolled student at the full cycle fee. Groups without a course have no
/// billing policy and skip this half entirely.
#[instrument(skip(conn, lesson), fields(lesson_id = %abbrev_uuid(&lesson.id), group_id = %abbrev_uuid(&lesson.group_id)), err)]
pub async fn on_lesson_created(conn: &mut SqliteConnection, lesson: &LessonDBResponse) -> Result<LessonTriggerReport> {
    let mut report = LessonTriggerReport::default();

    // Attendance half
    let roster = Groups::new(conn).get_roster_ids(lesson.group_id).await?;
    let existing: HashSet<_> = Attendance::new(conn)
        .student_ids_for_lesson(lesson.id)
        .await?
        .into_iter()
        .collect();

    let missing: Vec<AttendanceCreateDBRequest> = roster
        .iter()
        .filter(|student_id| !existing.contains(student_id))
        .map(|student_id| AttendanceCreateDBRequest {
            student_id: *student_id,
            lesson_id: lesson.id,
            status: AttendanceStatus::Present,
            comment: None,
        })
        .collect();

    report.attendance_created = Attendance::new(conn).create_bulk(&missing).await?;

    // Billing half
    let Some(group) = Groups::new(conn).get_by_id(lesson.group_id).await? else {
        return Ok(report);
    };
    let Some(course_id) = group.course_id else {
        debug!("group has no course, skipping billing");
        return Ok(report);
    };

    let total_lessons = Lessons::new(conn).count_for_group(lesson.group_id).await?;
    if total_lessons % LESSONS_PER_CYCLE != 0 {
        return Ok(report);
    }

    let Some(course) = Courses::new(conn).get_by_id(course_id).await? else {
        return Ok(report);
    };

    // The cycle about to begin
    let next_cycle = total_lessons / LESSONS_PER_CYCLE + 1;

    for student_id in &roster {
        let mut payments = Payments::new(conn);

        if payments.exists(*student_id, lesson.group_id, next_cycle).await? {
            continue;
        }

        let inserted = payments
            .create_if_absent(&PaymentCreateDBRequest {
                student_id: *student_id,
                group_id: lesson.group_id,
                cycle_index: next_cycle,
                amount_due: course.price,
            })
            .await?;

        if inserted {
            report.payments_created += 1;
        }
    }

    debug!(
        attendance = report.attendance_created,
        payments = report.payments_created,
        cycle = next_cycle,
        "lesson trigger complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::handlers::{Groups, lessons::Lessons as LessonsRepo};
    use crate::db::models::lessons::LessonCreateDBRequest;
    use crate::db::models::users::UserDBResponse;
    use crate::test_utils::{seed_course, seed_group, seed_user};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use sqlx::SqlitePool;
    use uuid::Uuid;

    /// Create a lesson the way the API handler does: insert plus trigger in
    /// one transaction.
    async fn create_lesson(pool: &SqlitePool, group_id: Uuid, teacher_id: Uuid, topic: &str) -> (LessonDBResponse, LessonTriggerReport) {
        let mut tx = pool.begin().await.unwrap();
        let lesson = LessonsRepo::new(&mut tx)
            .create(&LessonCreateDBRequest {
                topic: topic.to_string(),
                date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
                teacher_id,
                group_id,
            })
            .await
            .unwrap();
        let report = on_lesson_created(&mut tx, &lesson).await.unwrap();
        tx.commit().await.unwrap();
        (lesson, report)
    }

    async fn setup_group(pool: &SqlitePool, price: Decimal, students: usize) -> (UserDBResponse, Uuid, Vec<Uuid>) {
        let teacher = seed_user(pool, "t", Role::Teacher).await;
        let course = seed_course(pool, teacher.id, price).await;
        let group = seed_group(pool, Some(course.id)).await;

        let mut ids = Vec::new();
        for i in 0..students {
            let s = seed_user(pool, &format!("s{i}"), Role::Student).await;
            ids.push(s.id);
        }
        let mut conn = pool.acquire().await.unwrap();
        Groups::new(&mut conn).add_students(group.id, &ids).await.unwrap();

        (teacher, group.id, ids)
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_roster_complete_attendance(pool: SqlitePool) {
        let (teacher, group_id, students) = setup_group(&pool, Decimal::new(10000, 2), 3).await;

        let (lesson, report) = create_lesson(&pool, group_id, teacher.id, "intro").await;
        assert_eq!(report.attendance_created, 3);

        let mut conn = pool.acquire().await.unwrap();
        let rows = sqlx::query_as::<_, (Uuid, String)>("SELECT student_id, status FROM attendance WHERE lesson_id = ?1")
            .bind(lesson.id)
            .fetch_all(&mut *conn)
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        for (student_id, status) in rows {
            assert!(students.contains(&student_id));
            assert_eq!(status, "present");
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_trigger_is_idempotent(pool: SqlitePool) {
        let (teacher, group_id, _) = setup_group(&pool, Decimal::new(10000, 2), 2).await;

        let (lesson, first) = create_lesson(&pool, group_id, teacher.id, "intro").await;
        assert_eq!(first.attendance_created, 2);

        // A retry of the same trigger creates nothing new
        let mut conn = pool.acquire().await.unwrap();
        let second = on_lesson_created(&mut conn, &lesson).await.unwrap();
        assert_eq!(second, LessonTriggerReport::default());

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cycle_boundary_opens_next_cycle(pool: SqlitePool) {
        let (teacher, group_id, students) = setup_group(&pool, Decimal::new(10000, 2), 2).await;

        // Lessons 1..=11: no new payments
        for i in 1..=11 {
            let (_, report) = create_lesson(&pool, group_id, teacher.id, &format!("lesson {i}")).await;
            assert_eq!(report.payments_created, 0, "lesson {i} must not open a cycle");
        }

        // Lesson 12 completes cycle 1 and opens cycle 2 for both students
        let (_, report) = create_lesson(&pool, group_id, teacher.id, "lesson 12").await;
        assert_eq!(report.payments_created, 2);

        let mut conn = pool.acquire().await.unwrap();
        let rows = sqlx::query_as::<_, (Uuid, i64, String, bool)>(
            "SELECT student_id, cycle_index, amount_due, is_paid FROM payments ORDER BY cycle_index",
        )
        .fetch_all(&mut *conn)
        .await
        .unwrap();

        assert_eq!(rows.len(), 2);
        for (student_id, cycle_index, amount_due, is_paid) in rows {
            assert!(students.contains(&student_id));
            assert_eq!(cycle_index, 2);
            assert_eq!(amount_due, "100.00");
            assert!(!is_paid);
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_no_course_no_billing(pool: SqlitePool) {
        let teacher = seed_user(&pool, "t", Role::Teacher).await;
        let group = seed_group(&pool, None).await;
        let student = seed_user(&pool, "s", Role::Student).await;

        let mut conn = pool.acquire().await.unwrap();
        Groups::new(&mut conn).add_students(group.id, &[student.id]).await.unwrap();
        drop(conn);

        for i in 1..=12 {
            let (_, report) = create_lesson(&pool, group.id, teacher.id, &format!("lesson {i}")).await;
            assert_eq!(report.payments_created, 0);
            // Attendance is still generated; it does not depend on billing policy
            assert_eq!(report.attendance_created, 1);
        }

        let mut conn = pool.acquire().await.unwrap();
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payments")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_boundary_skips_students_already_billed(pool: SqlitePool) {
        let (teacher, group_id, students) = setup_group(&pool, Decimal::new(10000, 2), 2).await;

        // One student somehow already holds a cycle-2 payment
        let mut conn = pool.acquire().await.unwrap();
        Payments::new(&mut conn)
            .create(&PaymentCreateDBRequest {
                student_id: students[0],
                group_id,
                cycle_index: 2,
                amount_due: Decimal::new(10000, 2),
            })
            .await
            .unwrap();
        drop(conn);

        for i in 1..=12 {
            create_lesson(&pool, group_id, teacher.id, &format!("lesson {i}")).await;
        }

        let mut conn = pool.acquire().await.unwrap();
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payments WHERE cycle_index = 2")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
