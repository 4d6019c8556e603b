use std::collections::BTreeSet;

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::datetime::date_key_string;
use crate::model::{Status, Task};
use crate::schedule::is_on_date;

/// Whether a day key is checked off in a completed-day set.
pub fn is_completed_on(dates: &BTreeSet<String>, day: NaiveDate) -> bool {
    dates.contains(&date_key_string(day))
}

/// Returns a new set with `day` flipped: removed if present, added if not.
/// The caller persists the result; the input is never mutated.
#[must_use]
pub fn toggle(dates: &BTreeSet<String>, day: NaiveDate) -> BTreeSet<String> {
    let key = date_key_string(day);
    let mut next = dates.clone();
    if !next.remove(&key) {
        next.insert(key);
    }
    next
}

/// Display-level "done for this day": a terminally Completed task is done for
/// every day in its range; otherwise the per-day ledger decides.
pub fn is_done_on(task: &Task, day: NaiveDate, tz: &Tz) -> bool {
    if !is_on_date(task, day, tz) {
        return false;
    }
    if task.effective_status() == Status::Completed {
        return true;
    }
    is_completed_on(&task.completed_dates, day)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{NaiveDate, TimeZone, Utc};
    use chrono_tz::UTC;
    use uuid::Uuid;

    use super::{is_completed_on, is_done_on, toggle};
    use crate::model::{Status, Task};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn toggle_is_its_own_inverse() {
        let dates: BTreeSet<String> = ["2024-06-01".to_string()].into_iter().collect();
        let once = toggle(&dates, day(2024, 6, 2));
        assert!(is_completed_on(&once, day(2024, 6, 2)));
        let twice = toggle(&once, day(2024, 6, 2));
        assert_eq!(twice, dates);
    }

    #[test]
    fn toggle_never_duplicates() {
        let dates = BTreeSet::new();
        let once = toggle(&dates, day(2024, 6, 2));
        let again = toggle(&toggle(&once, day(2024, 6, 2)), day(2024, 6, 2));
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn terminal_status_is_done_for_every_day_in_range() {
        let s = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().expect("valid");
        let e = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).single().expect("valid");
        let mut task = Task::new("t".into(), s, e, Uuid::new_v4(), s, 1);
        task.set_status(Status::Completed);

        assert!(is_done_on(&task, day(2024, 6, 1), &UTC));
        assert!(is_done_on(&task, day(2024, 6, 3), &UTC));
        // but never outside the range
        assert!(!is_done_on(&task, day(2024, 6, 4), &UTC));
    }

    #[test]
    fn non_terminal_tasks_fall_back_to_the_ledger() {
        let s = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().expect("valid");
        let e = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).single().expect("valid");
        let mut task = Task::new("t".into(), s, e, Uuid::new_v4(), s, 1);
        task.set_status(Status::InProgress);
        task.completed_dates = toggle(&task.completed_dates, day(2024, 6, 2));

        assert!(!is_done_on(&task, day(2024, 6, 1), &UTC));
        assert!(is_done_on(&task, day(2024, 6, 2), &UTC));
        assert!(!is_done_on(&task, day(2024, 6, 3), &UTC));
    }
}
