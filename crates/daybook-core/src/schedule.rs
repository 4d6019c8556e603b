use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::datetime::{date_key, days_between, span_days};
use crate::model::Task;

/// Inclusive `[start, end]` day range of a task, already collapsed to
/// calendar days in the project zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Span {
    /// Normalizing constructor: endpoints are swapped when inverted so
    /// `start <= end` always holds.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    pub fn len_days(&self) -> i64 {
        span_days(self.start, self.end)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// A task's span in `tz`. Time-of-day on the stored instants is irrelevant
/// from here on.
pub fn task_span(task: &Task, tz: &Tz) -> Span {
    Span::new(date_key(task.start, tz), date_key(task.end, tz))
}

/// Whether `day` falls inside the task's inclusive day range. A task ending
/// mid-afternoon is still on-date for the whole of that day.
pub fn is_on_date(task: &Task, day: NaiveDate, tz: &Tz) -> bool {
    task_span(task, tz).contains(day)
}

/// Which part of a task bar a drag gesture grabbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Start,
    End,
    Middle,
}

/// Classifies a grab by whole-day offset inside the span: the first day is
/// the start handle, the last day the end handle, anything else the body.
/// For a single-day task both checks hit and End wins.
pub fn classify_drag(grab_day: NaiveDate, span: Span) -> DragKind {
    let offset = days_between(span.start, grab_day);
    let total = span.len_days();

    let mut kind = DragKind::Middle;
    if offset == 0 {
        kind = DragKind::Start;
    }
    if offset == total - 1 {
        kind = DragKind::End;
    }
    kind
}

/// New span after dropping the grabbed handle on `drop_day`.
///
/// Start and End move only their own edge; dropping past the opposite edge
/// inverts the range and the endpoints are swapped to restore order. Middle
/// shifts both edges by the day delta, preserving the length exactly.
pub fn compute_retarget(kind: DragKind, span: Span, drop_day: NaiveDate) -> Span {
    match kind {
        DragKind::Start => Span::new(drop_day, span.end),
        DragKind::End => Span::new(span.start, drop_day),
        DragKind::Middle => {
            let delta = days_between(span.start, drop_day);
            Span::new(
                span.start + chrono::Duration::days(delta),
                span.end + chrono::Duration::days(delta),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use chrono_tz::America::Mexico_City;
    use chrono_tz::UTC;
    use uuid::Uuid;

    use super::{DragKind, Span, classify_drag, compute_retarget, is_on_date};
    use crate::model::Task;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn span(s: (i32, u32, u32), e: (i32, u32, u32)) -> Span {
        Span::new(day(s.0, s.1, s.2), day(e.0, e.1, e.2))
    }

    fn task(start: (i32, u32, u32, u32), end: (i32, u32, u32, u32)) -> Task {
        let now = Utc::now();
        let s = Utc
            .with_ymd_and_hms(start.0, start.1, start.2, start.3, 0, 0)
            .single()
            .expect("valid start");
        let e = Utc
            .with_ymd_and_hms(end.0, end.1, end.2, end.3, 0, 0)
            .single()
            .expect("valid end");
        Task::new("t".into(), s, e, Uuid::new_v4(), now, 1)
    }

    #[test]
    fn membership_is_inclusive_on_both_edges() {
        let t = task((2024, 6, 1, 9), (2024, 6, 3, 15));
        assert!(!is_on_date(&t, day(2024, 5, 31), &UTC));
        assert!(is_on_date(&t, day(2024, 6, 1), &UTC));
        assert!(is_on_date(&t, day(2024, 6, 2), &UTC));
        // ends at 3pm but still counts for the whole of the 3rd
        assert!(is_on_date(&t, day(2024, 6, 3), &UTC));
        assert!(!is_on_date(&t, day(2024, 6, 4), &UTC));
    }

    #[test]
    fn single_day_task_matches_exactly_one_day() {
        let t = task((2024, 6, 2, 0), (2024, 6, 2, 23));
        assert!(!is_on_date(&t, day(2024, 6, 1), &UTC));
        assert!(is_on_date(&t, day(2024, 6, 2), &UTC));
        assert!(!is_on_date(&t, day(2024, 6, 3), &UTC));
    }

    #[test]
    fn membership_respects_the_zone() {
        // 2024-06-02 03:00 UTC is still June 1st in Mexico City
        let t = task((2024, 6, 2, 3), (2024, 6, 2, 3));
        assert!(is_on_date(&t, day(2024, 6, 1), &Mexico_City));
        assert!(!is_on_date(&t, day(2024, 6, 2), &Mexico_City));
    }

    #[test]
    fn classifies_grab_position() {
        let s = span((2024, 6, 5), (2024, 6, 10));
        assert_eq!(classify_drag(day(2024, 6, 5), s), DragKind::Start);
        assert_eq!(classify_drag(day(2024, 6, 10), s), DragKind::End);
        assert_eq!(classify_drag(day(2024, 6, 7), s), DragKind::Middle);
    }

    #[test]
    fn single_day_grab_classifies_as_end() {
        let s = span((2024, 6, 5), (2024, 6, 5));
        assert_eq!(classify_drag(day(2024, 6, 5), s), DragKind::End);
    }

    #[test]
    fn start_handle_grows_and_shrinks_the_span() {
        let s = span((2024, 6, 5), (2024, 6, 10));
        assert_eq!(
            compute_retarget(DragKind::Start, s, day(2024, 6, 3)),
            span((2024, 6, 3), (2024, 6, 10))
        );
        assert_eq!(
            compute_retarget(DragKind::Start, s, day(2024, 6, 8)),
            span((2024, 6, 8), (2024, 6, 10))
        );
    }

    #[test]
    fn inverted_drops_swap_endpoints() {
        let s = span((2024, 6, 5), (2024, 6, 10));
        // start handle dropped past the original end
        assert_eq!(
            compute_retarget(DragKind::Start, s, day(2024, 6, 12)),
            span((2024, 6, 10), (2024, 6, 12))
        );
        // end handle dropped before the original start
        assert_eq!(
            compute_retarget(DragKind::End, s, day(2024, 6, 2)),
            span((2024, 6, 2), (2024, 6, 5))
        );
    }

    #[test]
    fn middle_drag_preserves_length() {
        let s = span((2024, 6, 28), (2024, 7, 2));
        let moved = compute_retarget(DragKind::Middle, s, day(2024, 7, 15));
        assert_eq!(moved, span((2024, 7, 15), (2024, 7, 19)));
        assert_eq!(moved.len_days(), s.len_days());

        let back = compute_retarget(DragKind::Middle, s, day(2024, 5, 30));
        assert_eq!(back, span((2024, 5, 30), (2024, 6, 3)));
        assert_eq!(back.len_days(), s.len_days());
    }

    #[test]
    fn middle_drag_across_dst_keeps_whole_days() {
        // shifting over the US spring-forward weekend must not lose a day
        let s = span((2024, 3, 7), (2024, 3, 9));
        let moved = compute_retarget(DragKind::Middle, s, day(2024, 3, 9));
        assert_eq!(moved, span((2024, 3, 9), (2024, 3, 11)));
        assert_eq!(moved.len_days(), 3);
    }
}
