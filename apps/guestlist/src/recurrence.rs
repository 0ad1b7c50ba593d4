//! Recurrence expansion: one concrete event per occurrence date.
//!
//! Stepping rules:
//!
//! - daily: `+interval` days from the previous occurrence
//! - weekly: `+7 × interval` days from the previous occurrence. With a weekday
//!   filter, candidate days outside the filter are skipped one day at a time
//!   and are not occurrences.
//! - monthly / yearly: the k-th step is `base + k × interval` months (yearly
//!   uses 12-month steps), clamped to the last day of the target month. The
//!   day of month is always measured from the base date, so Jan 31 goes to
//!   Feb 29 (2024) and then back to Mar 31.
//!
//! The end date is inclusive. A rule without an end date yields only the base
//! date.

use crate::error::IntakeError;
use crate::types::{Event, Frequency, RecurrenceRule};
use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use guestlist_core::environment::Clock;

/// Lazy sequence of occurrence dates for a rule starting at a base date
#[derive(Clone, Debug)]
pub struct OccurrenceDates<'a> {
    rule: &'a RecurrenceRule,
    anchor: NaiveDate,
    cursor: Option<NaiveDate>,
    steps: u32,
}

impl<'a> OccurrenceDates<'a> {
    /// Starts the sequence at `start`
    #[must_use]
    pub const fn new(start: NaiveDate, rule: &'a RecurrenceRule) -> Self {
        Self {
            rule,
            anchor: start,
            cursor: Some(start),
            steps: 0,
        }
    }

    /// Date of the step after an occurrence on `emitted`. `None` once the
    /// calendar overflows, which ends the sequence.
    fn advance(&self, emitted: NaiveDate) -> Option<NaiveDate> {
        let interval = self.rule.interval;
        match self.rule.frequency {
            Frequency::Daily => emitted.checked_add_days(Days::new(u64::from(interval))),
            Frequency::Weekly => emitted.checked_add_days(Days::new(7 * u64::from(interval))),
            Frequency::Monthly => self.months_from_anchor(interval.checked_mul(self.steps)?),
            Frequency::Yearly => {
                self.months_from_anchor(interval.checked_mul(12)?.checked_mul(self.steps)?)
            },
        }
    }

    fn months_from_anchor(&self, months: u32) -> Option<NaiveDate> {
        self.anchor.checked_add_months(Months::new(months))
    }
}

impl Iterator for OccurrenceDates<'_> {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        loop {
            let cursor = self.cursor?;

            let Some(end) = self.rule.end_date else {
                self.cursor = None;
                return Some(cursor);
            };

            if cursor > end {
                self.cursor = None;
                return None;
            }

            if self.rule.skips(cursor) {
                self.cursor = cursor.succ_opt();
                continue;
            }

            self.steps += 1;
            self.cursor = self.advance(cursor);
            return Some(cursor);
        }
    }
}

/// Expands `base` into one event per occurrence of `rule`.
///
/// Each occurrence is a copy of `base` that differs only in `date` and in its
/// timestamps, which all carry one clock reading. An end date earlier than the
/// base date yields no occurrences.
#[must_use]
pub fn expand(base: &Event, rule: &RecurrenceRule, clock: &dyn Clock) -> Vec<Event> {
    let now = clock.now();
    OccurrenceDates::new(base.date, rule)
        .map(|date| base.occurrence_on(date, now))
        .collect()
}

/// [`expand`] that refuses to materialize more than `limit` occurrences.
///
/// Takes the timestamp instead of a clock so intake can stamp guests and
/// occurrences with one reading.
///
/// # Errors
///
/// Returns [`IntakeError::RecurrenceBounds`] when the rule produces more
/// than `limit` occurrences.
pub fn expand_bounded(
    base: &Event,
    rule: &RecurrenceRule,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<Event>, IntakeError> {
    let dates: Vec<NaiveDate> = OccurrenceDates::new(base.date, rule)
        .take(limit.saturating_add(1))
        .collect();

    if dates.len() > limit {
        tracing::warn!(
            limit,
            frequency = ?rule.frequency,
            interval = rule.interval,
            "Recurrence rejected for exceeding the occurrence limit"
        );
        return Err(IntakeError::RecurrenceBounds(format!(
            "recurrence produces more than {limit} occurrences"
        )));
    }

    Ok(dates
        .into_iter()
        .map(|date| base.occurrence_on(date, now))
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{EventStatus, UserId};
    use guestlist_testing::test_clock;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn base_event(on: NaiveDate) -> Event {
        let now = test_clock().now();
        Event {
            owner_id: UserId::new("user_1"),
            title: "Book club".to_string(),
            description: String::new(),
            date: on,
            time: "19:00".to_string(),
            location: "Library".to_string(),
            capacity: None,
            category: "Social".to_string(),
            tags: vec![],
            is_public: false,
            recurrence: None,
            is_template: false,
            status: EventStatus::Active,
            guests: vec![],
            waitlist: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn dates_of(events: &[Event]) -> Vec<NaiveDate> {
        events.iter().map(|e| e.date).collect()
    }

    #[test]
    fn daily_includes_end_date() {
        let rule = RecurrenceRule::new(Frequency::Daily, 1, Some(date(2024, 1, 12)));
        let events = expand(&base_event(date(2024, 1, 10)), &rule, &test_clock());
        assert_eq!(
            dates_of(&events),
            [date(2024, 1, 10), date(2024, 1, 11), date(2024, 1, 12)]
        );
    }

    #[test]
    fn weekly_with_weekday_filter_skips_other_days() {
        // 2024-01-01 is a Monday; 3 = Wednesday
        let rule =
            RecurrenceRule::new(Frequency::Weekly, 1, Some(date(2024, 1, 21))).on_days([3]);
        let events = expand(&base_event(date(2024, 1, 1)), &rule, &test_clock());
        assert_eq!(
            dates_of(&events),
            [date(2024, 1, 3), date(2024, 1, 10), date(2024, 1, 17)]
        );
    }

    #[test]
    fn weekly_filter_steps_a_full_week_after_each_occurrence() {
        // Monday and Wednesday requested, starting on a Monday: after emitting
        // Monday the cursor jumps a whole week, so Wednesdays are never reached.
        let rule =
            RecurrenceRule::new(Frequency::Weekly, 1, Some(date(2024, 1, 17))).on_days([1, 3]);
        let events = expand(&base_event(date(2024, 1, 1)), &rule, &test_clock());
        assert_eq!(
            dates_of(&events),
            [date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15)]
        );
    }

    #[test]
    fn weekly_without_filter_steps_unconditionally() {
        let rule = RecurrenceRule::new(Frequency::Weekly, 2, Some(date(2024, 2, 1)));
        let events = expand(&base_event(date(2024, 1, 1)), &rule, &test_clock());
        assert_eq!(
            dates_of(&events),
            [date(2024, 1, 1), date(2024, 1, 15), date(2024, 1, 29)]
        );
    }

    #[test]
    fn monthly_clamps_to_month_end_and_recovers() {
        let rule = RecurrenceRule::new(Frequency::Monthly, 1, Some(date(2024, 3, 31)));
        let events = expand(&base_event(date(2024, 1, 31)), &rule, &test_clock());
        assert_eq!(
            dates_of(&events),
            [date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31)]
        );
    }

    #[test]
    fn monthly_clamps_to_february_28_in_common_years() {
        let rule = RecurrenceRule::new(Frequency::Monthly, 1, Some(date(2023, 4, 30)));
        let events = expand(&base_event(date(2023, 1, 31)), &rule, &test_clock());
        assert_eq!(
            dates_of(&events),
            [date(2023, 1, 31), date(2023, 2, 28), date(2023, 3, 31), date(2023, 4, 30)]
        );
    }

    #[test]
    fn yearly_from_leap_day() {
        let rule = RecurrenceRule::new(Frequency::Yearly, 1, Some(date(2028, 12, 31)));
        let events = expand(&base_event(date(2024, 2, 29)), &rule, &test_clock());
        assert_eq!(
            dates_of(&events),
            [
                date(2024, 2, 29),
                date(2025, 2, 28),
                date(2026, 2, 28),
                date(2027, 2, 28),
                date(2028, 2, 29),
            ]
        );
    }

    #[test]
    fn missing_end_date_yields_only_the_base_occurrence() {
        let rule = RecurrenceRule::new(Frequency::Daily, 1, None);
        let events = expand(&base_event(date(2024, 1, 10)), &rule, &test_clock());
        assert_eq!(dates_of(&events), [date(2024, 1, 10)]);
    }

    #[test]
    fn end_before_start_yields_nothing() {
        let rule = RecurrenceRule::new(Frequency::Daily, 1, Some(date(2024, 1, 9)));
        let events = expand(&base_event(date(2024, 1, 10)), &rule, &test_clock());
        assert!(events.is_empty());
    }

    #[test]
    fn occurrences_copy_everything_but_date_and_timestamps() {
        let mut base = base_event(date(2024, 1, 10));
        base.created_at = base.created_at - chrono::Duration::days(3);
        let rule = RecurrenceRule::new(Frequency::Daily, 1, Some(date(2024, 1, 11)));
        let clock = test_clock();

        let events = expand(&base, &rule, &clock);

        for event in &events {
            assert_eq!(event.created_at, clock.now());
            assert_eq!(event.updated_at, clock.now());
            assert_eq!(event.title, base.title);
            assert_eq!(event.owner_id, base.owner_id);
        }
    }

    #[test]
    fn bounded_expansion_rejects_long_series() {
        let rule = RecurrenceRule::new(Frequency::Daily, 1, Some(date(2030, 1, 1)));
        let result = expand_bounded(&base_event(date(2024, 1, 1)), &rule, test_clock().now(), 10);
        assert!(matches!(result, Err(IntakeError::RecurrenceBounds(_))));
    }

    #[test]
    fn bounded_expansion_accepts_exact_limit() {
        let rule = RecurrenceRule::new(Frequency::Daily, 1, Some(date(2024, 1, 3)));
        let events =
            expand_bounded(&base_event(date(2024, 1, 1)), &rule, test_clock().now(), 3).unwrap();
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn frozen_clock_gives_identical_output() {
        let rule =
            RecurrenceRule::new(Frequency::Weekly, 1, Some(date(2024, 3, 1))).on_days([2, 4]);
        let base = base_event(date(2024, 1, 1));
        let clock = test_clock();
        assert_eq!(
            serde_json::to_vec(&expand(&base, &rule, &clock)).unwrap(),
            serde_json::to_vec(&expand(&base, &rule, &clock)).unwrap()
        );
    }

    proptest! {
        #[test]
        fn daily_series_is_strictly_increasing_and_bounded(
            offset in 0u64..400,
            interval in 1u32..10,
            span in 0u64..120,
        ) {
            let start = date(2023, 1, 1) + Days::new(offset);
            let end = start + Days::new(span);
            let rule = RecurrenceRule::new(Frequency::Daily, interval, Some(end));
            let dates: Vec<_> = OccurrenceDates::new(start, &rule).collect();

            prop_assert_eq!(dates.first().copied(), Some(start));
            prop_assert!(dates.iter().all(|d| *d <= end));
            for pair in dates.windows(2) {
                prop_assert_eq!((pair[1] - pair[0]).num_days(), i64::from(interval));
            }
            prop_assert_eq!(dates.len() as u64, span / u64::from(interval) + 1);
        }

        #[test]
        fn weekly_filter_only_emits_requested_weekdays(
            offset in 0u64..400,
            days in proptest::collection::btree_set(0u8..7, 1..4),
        ) {
            let start = date(2023, 1, 1) + Days::new(offset);
            let end = start + Days::new(90);
            let rule = RecurrenceRule::new(Frequency::Weekly, 1, Some(end)).on_days(days.clone());

            for occurrence in OccurrenceDates::new(start, &rule) {
                let weekday = chrono::Datelike::weekday(&occurrence).num_days_from_sunday();
                let weekday = u8::try_from(weekday).unwrap();
                prop_assert!(days.contains(&weekday));
                prop_assert!(occurrence <= end);
            }
        }
    }
}
