//! Event intake: submission payload → validated draft → event records.
//!
//! Everything here runs before persistence. A submission either yields the
//! complete batch of events to insert or an [`IntakeError`], never a partial
//! series.

use crate::allocation::allocate_within;
use crate::config::Config;
use crate::error::IntakeError;
use crate::recurrence::expand_bounded;
use crate::types::{Capacity, Event, EventDraft, Frequency, RecurrenceRule, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use guestlist_core::environment::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const MAX_TITLE_CHARS: usize = 200;
const MAX_DESCRIPTION_CHARS: usize = 2000;

// ============================================================================
// Payload
// ============================================================================

/// Create-event payload as it arrives from a client
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSubmission {
    /// Event title (required)
    pub title: Option<String>,
    /// Free-form description
    pub description: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339 timestamp (required)
    pub date: Option<String>,
    /// Start time (required)
    pub time: Option<String>,
    /// Venue (required)
    pub location: Option<String>,
    /// Invitee emails
    pub guests: Option<GuestsInput>,
    /// Confirmed-guest limit
    pub capacity: Option<CapacityInput>,
    /// Category label
    pub category: Option<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Listed publicly
    #[serde(default)]
    pub is_public: bool,
    /// Repetition rule
    pub recurrence: Option<RecurrenceInput>,
    /// Save as a reusable template
    #[serde(default)]
    pub template: bool,
}

/// Guest list as either a JSON array or a comma-separated string
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GuestsInput {
    /// `["a@x.org", "b@x.org"]`
    List(Vec<String>),
    /// `"a@x.org, b@x.org"`
    Text(String),
}

impl GuestsInput {
    /// Trimmed, non-empty emails in submission order
    #[must_use]
    pub fn emails(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::List(list) => list.iter().map(String::as_str).collect(),
            Self::Text(text) => text.split(',').collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Capacity as either a number or a form-field string (empty = unlimited)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapacityInput {
    /// `12`
    Number(i64),
    /// `"12"` or `""`
    Text(String),
}

impl CapacityInput {
    /// Raw capacity value, `None` for an empty field
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::Validation`] for text that is not an integer.
    pub fn resolve(&self) -> Result<Option<i64>, IntakeError> {
        match self {
            Self::Number(value) => Ok(Some(*value)),
            Self::Text(text) if text.trim().is_empty() => Ok(None),
            Self::Text(text) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| IntakeError::validation(format!("Capacity is not a number: {text}"))),
        }
    }
}

/// Recurrence rule as submitted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceInput {
    /// `daily`, `weekly`, `monthly` or `yearly`
    pub frequency: String,
    /// Step size, defaults to 1
    pub interval: Option<i64>,
    /// Inclusive last date
    pub end_date: Option<String>,
    /// Weekday indices, Sunday = 0
    pub days_of_week: Option<Vec<i64>>,
}

impl RecurrenceInput {
    /// Validates the submitted rule.
    ///
    /// A blank end date becomes `None`; intake rejects that separately so the
    /// rule itself stays a faithful copy of what was submitted.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::Validation`] for an unknown frequency, an
    /// interval below 1, an unparseable end date or a weekday outside 0–6.
    pub fn into_rule(self) -> Result<RecurrenceRule, IntakeError> {
        let frequency: Frequency = self.frequency.parse()?;

        let interval = self.interval.unwrap_or(1);
        let interval = u32::try_from(interval)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                IntakeError::validation(format!(
                    "Recurrence interval must be at least 1, got {interval}"
                ))
            })?;

        let end_date = self
            .end_date
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_date)
            .transpose()?;

        let days_of_week = self
            .days_of_week
            .unwrap_or_default()
            .into_iter()
            .map(|day| {
                u8::try_from(day)
                    .ok()
                    .filter(|d| *d <= 6)
                    .ok_or_else(|| {
                        IntakeError::validation(format!("Weekday index out of range: {day}"))
                    })
            })
            .collect::<Result<BTreeSet<u8>, _>>()?;

        Ok(RecurrenceRule {
            frequency,
            interval,
            end_date,
            days_of_week,
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl EventSubmission {
    /// Validates the payload into an [`EventDraft`].
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::Validation`] for a missing or malformed field
    /// and [`IntakeError::InvalidCapacity`] for a negative capacity.
    pub fn into_draft(self, config: &Config) -> Result<EventDraft, IntakeError> {
        let title = required(self.title, "title")?;
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(IntakeError::validation(format!(
                "Title must be at most {MAX_TITLE_CHARS} characters"
            )));
        }

        let description = self.description.unwrap_or_default().trim().to_string();
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(IntakeError::validation(format!(
                "Description must be at most {MAX_DESCRIPTION_CHARS} characters"
            )));
        }

        let date = parse_date(&required(self.date, "date")?)?;
        let time = required(self.time, "time")?;
        let location = required(self.location, "location")?;

        let guest_emails = self.guests.map(|g| g.emails()).unwrap_or_default();
        if let Some(invalid) = guest_emails.iter().find(|email| !is_valid_email(email)) {
            return Err(IntakeError::validation(format!("Invalid guest email: {invalid}")));
        }

        let capacity = match self.capacity {
            Some(input) => input.resolve()?.map(Capacity::try_from).transpose()?,
            None => None,
        };

        let category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| config.default_category.clone());

        let tags = self
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let recurrence = self.recurrence.map(RecurrenceInput::into_rule).transpose()?;

        Ok(EventDraft {
            title,
            description,
            date,
            time,
            location,
            guest_emails,
            capacity,
            category,
            tags,
            is_public: self.is_public,
            recurrence,
            is_template: self.template,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, IntakeError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| IntakeError::validation(format!("Missing required field: {field}")))
}

/// Parses `YYYY-MM-DD`, or an RFC 3339 timestamp reduced to its UTC date.
///
/// # Errors
///
/// Returns [`IntakeError::Validation`] when neither form matches.
pub fn parse_date(input: &str) -> Result<NaiveDate, IntakeError> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| {
            DateTime::parse_from_rfc3339(input).map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .map_err(|_| IntakeError::validation(format!("Invalid date: {input}")))
}

/// Basic email shape check: one `@`, a non-empty local part and a dotted
/// domain made of non-empty labels.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 3 || email.len() > 255 {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'));
    let domain_ok = domain.contains('.')
        && domain
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-'))
        && domain.split('.').all(|label| !label.is_empty());

    local_ok && domain_ok
}

// ============================================================================
// Building events
// ============================================================================

/// Turns a validated draft into the event records to persist.
///
/// Allocates the invitees against capacity, builds the base event and, for a
/// recurring draft, expands it into one event per occurrence. Guests and
/// occurrences carry the same clock reading.
///
/// # Errors
///
/// Returns [`IntakeError::RecurrenceBounds`] when the recurrence has no end
/// date, ends before the event date, or exceeds `config.max_occurrences`.
pub fn build_events(
    draft: EventDraft,
    owner: &UserId,
    clock: &dyn Clock,
    config: &Config,
) -> Result<Vec<Event>, IntakeError> {
    let now = clock.now();
    let allocation = allocate_within(&draft.guest_emails, draft.capacity, now);
    let rule = draft.recurrence.clone();
    let base = Event::from_draft(draft, owner.clone(), allocation.guests, allocation.waitlist, now);

    let Some(rule) = rule else {
        return Ok(vec![base]);
    };

    if rule.end_date.is_none() {
        return Err(IntakeError::RecurrenceBounds(
            "recurring events require an end date".to_string(),
        ));
    }

    let events = expand_bounded(&base, &rule, now, config.max_occurrences)?;
    if events.is_empty() {
        return Err(IntakeError::RecurrenceBounds(
            "recurrence end date precedes the event date".to_string(),
        ));
    }

    tracing::debug!(
        owner = %owner,
        occurrences = events.len(),
        frequency = ?rule.frequency,
        "Expanded recurring event"
    );

    Ok(events)
}

/// Validates a submission and builds its events in one step.
///
/// # Errors
///
/// Any [`IntakeError`] from validation, allocation or expansion.
pub fn intake(
    submission: EventSubmission,
    owner: &UserId,
    clock: &dyn Clock,
    config: &Config,
) -> Result<Vec<Event>, IntakeError> {
    let draft = submission.into_draft(config)?;
    build_events(draft, owner, clock, config)
}
