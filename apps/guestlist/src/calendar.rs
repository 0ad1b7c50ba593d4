//! iCalendar (RFC 5545) export of a single event.

use crate::types::{Event, EventId};
use chrono::{DateTime, NaiveTime, Utc};

const PRODID: &str = "-//guestlist//events//EN";

/// Renders `event` as a one-VEVENT `VCALENDAR` document.
///
/// `DTSTART` is a floating local date-time when the event time reads as
/// `HH:MM`, otherwise an all-day date. Lines end in CRLF.
#[must_use]
pub fn to_icalendar(event_id: &EventId, event: &Event, generated_at: DateTime<Utc>) -> String {
    let start = match NaiveTime::parse_from_str(event.time.trim(), "%H:%M") {
        Ok(time) => format!("DTSTART:{}", event.date.and_time(time).format("%Y%m%dT%H%M%S")),
        Err(_) => format!("DTSTART;VALUE=DATE:{}", event.date.format("%Y%m%d")),
    };

    let lines = [
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{PRODID}"),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{event_id}@guestlist"),
        format!("DTSTAMP:{}", generated_at.format("%Y%m%dT%H%M%SZ")),
        start,
        format!("SUMMARY:{}", escape_text(&event.title)),
        format!("DESCRIPTION:{}", escape_text(&event.description)),
        format!("LOCATION:{}", escape_text(&event.location)),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ];

    let mut document = String::new();
    for line in &lines {
        document.push_str(line);
        document.push_str("\r\n");
    }
    document
}

/// TEXT value escaping: backslash, semicolon, comma and newlines
fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                escaped.push_str("\\n");
            },
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{EventStatus, UserId};
    use chrono::NaiveDate;
    use guestlist_core::environment::Clock;
    use guestlist_testing::test_clock;

    fn event(time: &str) -> Event {
        let now = test_clock().now();
        Event {
            owner_id: UserId::new("owner"),
            title: "Dinner; drinks, dessert".to_string(),
            description: "Line one\r\nLine two".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            time: time.to_string(),
            location: "Main St\\5".to_string(),
            capacity: None,
            category: "Social".to_string(),
            tags: vec![],
            is_public: true,
            recurrence: None,
            is_template: false,
            status: EventStatus::Active,
            guests: vec![],
            waitlist: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn renders_timed_event_with_crlf_lines() {
        let ics = to_icalendar(&EventId::new(), &event("18:30"), test_clock().now());

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
        assert!(ics.contains("\r\nDTSTART:20240601T183000\r\n"));
        assert!(ics.contains("\r\nDTSTAMP:20250101T000000Z\r\n"));
        assert!(!ics.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn unparseable_time_becomes_all_day() {
        let ics = to_icalendar(&EventId::new(), &event("evening"), test_clock().now());
        assert!(ics.contains("\r\nDTSTART;VALUE=DATE:20240601\r\n"));
    }

    #[test]
    fn text_values_are_escaped() {
        let ics = to_icalendar(&EventId::new(), &event("18:30"), test_clock().now());
        assert!(ics.contains("SUMMARY:Dinner\\; drinks\\, dessert\r\n"));
        assert!(ics.contains("DESCRIPTION:Line one\\nLine two\r\n"));
        assert!(ics.contains("LOCATION:Main St\\\\5\r\n"));
    }
}
