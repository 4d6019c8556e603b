use chrono_tz::Tz;
use uuid::Uuid;

use crate::model::{Status, Task};
use crate::schedule::task_span;

/// Day-weighted completion percentage for one project, 0..=100.
///
/// Every task contributes its inclusive span length to the total. A task with
/// terminal Completed status credits its full span regardless of ledger
/// contents; anything else credits its checked-off day count, capped at the
/// span length so a span shortened after days were checked cannot overshoot.
/// Rounds half away from zero.
pub fn project_progress(project: Uuid, tasks: &[Task], tz: &Tz) -> u8 {
    let mut total_days: i64 = 0;
    let mut completed_days: i64 = 0;

    for task in tasks.iter().filter(|t| t.project == Some(project)) {
        let days_in_task = task_span(task, tz).len_days();
        total_days += days_in_task;

        if task.effective_status() == Status::Completed {
            completed_days += days_in_task;
        } else {
            completed_days += (task.completed_dates.len() as i64).min(days_in_task);
        }
    }

    if total_days == 0 {
        return 0;
    }

    let ratio = 100.0 * completed_days as f64 / total_days as f64;
    ratio.round() as u8
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use chrono_tz::UTC;
    use uuid::Uuid;

    use super::project_progress;
    use crate::datetime::date_key_string;
    use crate::model::{Status, Task};

    fn instant(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).single().expect("valid instant")
    }

    fn spanning(project: Uuid, start: (i32, u32, u32), end: (i32, u32, u32)) -> Task {
        let now = Utc::now();
        Task::new(
            "t".into(),
            instant(start.0, start.1, start.2),
            instant(end.0, end.1, end.2),
            project,
            now,
            1,
        )
    }

    fn check_off(task: &mut Task, y: i32, m: u32, d: u32) {
        let day = chrono::NaiveDate::from_ymd_opt(y, m, d).expect("valid date");
        task.completed_dates.insert(date_key_string(day));
    }

    #[test]
    fn empty_project_is_zero() {
        let project = Uuid::new_v4();
        assert_eq!(project_progress(project, &[], &UTC), 0);

        // tasks of other projects do not count either
        let other = spanning(Uuid::new_v4(), (2024, 6, 1), (2024, 6, 3));
        assert_eq!(project_progress(project, &[other], &UTC), 0);
    }

    #[test]
    fn all_completed_is_exactly_100_regardless_of_ledger() {
        let project = Uuid::new_v4();
        let mut a = spanning(project, (2024, 6, 1), (2024, 6, 3));
        a.set_status(Status::Completed);
        let mut b = spanning(project, (2024, 6, 4), (2024, 6, 4));
        b.set_status(Status::Completed);
        check_off(&mut b, 2024, 6, 4);

        assert_eq!(project_progress(project, &[a, b], &UTC), 100);
    }

    #[test]
    fn partial_ledger_credits_checked_days() {
        // 3-day task, one day checked: round(100/3) = 33
        let project = Uuid::new_v4();
        let mut task = spanning(project, (2024, 6, 1), (2024, 6, 3));
        task.set_status(Status::InProgress);
        check_off(&mut task, 2024, 6, 2);

        assert_eq!(project_progress(project, &[task], &UTC), 33);
    }

    #[test]
    fn ledger_overflow_is_capped_at_the_span() {
        // span shrunk to one day after three days were checked off
        let project = Uuid::new_v4();
        let mut task = spanning(project, (2024, 6, 2), (2024, 6, 2));
        task.set_status(Status::InProgress);
        check_off(&mut task, 2024, 6, 1);
        check_off(&mut task, 2024, 6, 2);
        check_off(&mut task, 2024, 6, 3);

        assert_eq!(project_progress(project, &[task], &UTC), 100);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // 3 of 8 days = 37.5% -> 38
        let project = Uuid::new_v4();
        let mut task = spanning(project, (2024, 6, 1), (2024, 6, 8));
        task.set_status(Status::InProgress);
        check_off(&mut task, 2024, 6, 1);
        check_off(&mut task, 2024, 6, 2);
        check_off(&mut task, 2024, 6, 3);

        assert_eq!(project_progress(project, &[task], &UTC), 38);
    }

    #[test]
    fn mixed_tasks_weight_by_days() {
        // completed 3-day task + untouched 3-day task = 50%
        let project = Uuid::new_v4();
        let mut a = spanning(project, (2024, 6, 1), (2024, 6, 3));
        a.set_status(Status::Completed);
        let b = spanning(project, (2024, 6, 4), (2024, 6, 6));

        assert_eq!(project_progress(project, &[a, b], &UTC), 50);
    }
}
