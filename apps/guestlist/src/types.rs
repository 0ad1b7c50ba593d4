//! Domain types for event intake and guest management.
//!
//! Value objects (identifiers, capacity, recurrence rules), the guest and
//! event records that get persisted, and the reducer state.

use crate::error::IntakeError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use guestlist_core::document_store::DocumentId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a persisted event (assigned by the document store)
pub type EventId = DocumentId;

/// Identity of an authenticated user, as reported by the identity provider
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Wraps an identity-provider subject
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw subject string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Capacity
// ============================================================================

/// Maximum number of confirmed invitees for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capacity(u32);

impl Capacity {
    /// Creates a new `Capacity`
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the capacity value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Number of invitees that fit, as a `usize` for slicing
    #[must_use]
    pub fn as_usize(&self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

impl TryFrom<i64> for Capacity {
    type Error = IntakeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 {
            return Err(IntakeError::InvalidCapacity(value));
        }
        u32::try_from(value).map(Self).map_err(|_| {
            IntakeError::Validation(format!("Capacity {value} exceeds the supported maximum"))
        })
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Guests
// ============================================================================

/// Invitation state of a guest
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestStatus {
    /// Invited, no answer yet
    Pending,
    /// Said yes
    Accepted,
    /// Said no
    Declined,
    /// Beyond capacity, waiting for a spot
    Waitlisted,
}

/// Answer a guest can give to an invitation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsvpResponse {
    /// Attending
    Accepted,
    /// Not attending
    Declined,
}

impl From<RsvpResponse> for GuestStatus {
    fn from(response: RsvpResponse) -> Self {
        match response {
            RsvpResponse::Accepted => Self::Accepted,
            RsvpResponse::Declined => Self::Declined,
        }
    }
}

/// Role a guest plays at an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuestRole {
    /// Regular attendee
    Guest,
    /// Co-host: manage guests, edit event, message all
    CoHost,
    /// Moderator: manage guests, message all
    Moderator,
}

/// A single invitee of an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    /// Email address the invitation went to
    pub email: String,
    /// Display name, empty until the guest provides one
    pub name: String,
    /// Current invitation state
    pub status: GuestStatus,
    /// When the invitation was issued
    pub invited_at: DateTime<Utc>,
    /// When the guest answered
    pub responded_at: Option<DateTime<Utc>>,
    /// Role at the event (absent means plain guest)
    pub role: Option<GuestRole>,
    /// Whether the guest has been checked in at the door
    pub checked_in: bool,
    /// When the guest was checked in
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl Guest {
    /// Creates a guest record with the given initial status
    #[must_use]
    pub fn invited(
        email: impl Into<String>,
        status: GuestStatus,
        invited_at: DateTime<Utc>,
    ) -> Self {
        Self {
            email: email.into(),
            name: String::new(),
            status,
            invited_at,
            responded_at: None,
            role: None,
            checked_in: false,
            checked_in_at: None,
        }
    }

    /// Case-insensitive email comparison
    #[must_use]
    pub fn has_email(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email)
    }
}

// ============================================================================
// Recurrence
// ============================================================================

/// Unit of a recurrence step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Every `interval` days
    Daily,
    /// Every `interval` weeks
    Weekly,
    /// Every `interval` calendar months
    Monthly,
    /// Every `interval` calendar years
    Yearly,
}

impl FromStr for Frequency {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(IntakeError::Validation(format!(
                "Unknown recurrence frequency: {other}"
            ))),
        }
    }
}

/// Compact description of a repeating event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    /// Step unit
    pub frequency: Frequency,
    /// Step size in units of `frequency` (at least 1)
    pub interval: u32,
    /// Inclusive last date an occurrence may fall on
    pub end_date: Option<NaiveDate>,
    /// Weekday filter, Sunday = 0. Only consulted for weekly rules.
    #[serde(default)]
    pub days_of_week: BTreeSet<u8>,
}

impl RecurrenceRule {
    /// Creates a rule with no weekday filter
    #[must_use]
    pub fn new(frequency: Frequency, interval: u32, end_date: Option<NaiveDate>) -> Self {
        Self {
            frequency,
            interval,
            end_date,
            days_of_week: BTreeSet::new(),
        }
    }

    /// Restricts a weekly rule to the given weekdays (Sunday = 0)
    #[must_use]
    pub fn on_days(mut self, days: impl IntoIterator<Item = u8>) -> Self {
        self.days_of_week = days.into_iter().collect();
        self
    }

    /// Whether `date` is filtered out by the weekday set
    #[must_use]
    pub fn skips(&self, date: NaiveDate) -> bool {
        if self.frequency != Frequency::Weekly || self.days_of_week.is_empty() {
            return false;
        }
        let weekday = u8::try_from(date.weekday().num_days_from_sunday()).unwrap_or(u8::MAX);
        !self.days_of_week.contains(&weekday)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Lifecycle tag of a persisted event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Scheduled and visible to its guests
    Active,
    /// Called off
    Cancelled,
    /// Took place
    Completed,
}

/// A validated event submission, not yet persisted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    /// Event title
    pub title: String,
    /// Free-form description
    pub description: String,
    /// Calendar date of the (first) occurrence
    pub date: NaiveDate,
    /// Start time as entered by the organizer
    pub time: String,
    /// Where it happens
    pub location: String,
    /// Invitee emails in submission order
    pub guest_emails: Vec<String>,
    /// Confirmed-guest limit, `None` means unlimited
    pub capacity: Option<Capacity>,
    /// Category label
    pub category: String,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Listed publicly
    pub is_public: bool,
    /// Repetition rule
    pub recurrence: Option<RecurrenceRule>,
    /// Saved as a reusable template
    pub is_template: bool,
}

/// Partial update of an event's descriptive fields
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChanges {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New location
    pub location: Option<String>,
    /// New start time
    pub time: Option<String>,
}

impl EventChanges {
    /// True when no field is set
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.time.is_none()
    }
}

/// A persisted event record (one per occurrence)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// User who created the event
    pub owner_id: UserId,
    /// Event title
    pub title: String,
    /// Free-form description
    pub description: String,
    /// Calendar date of this occurrence
    pub date: NaiveDate,
    /// Start time as entered by the organizer
    pub time: String,
    /// Where it happens
    pub location: String,
    /// Confirmed-guest limit, `None` means unlimited
    pub capacity: Option<Capacity>,
    /// Category label
    pub category: String,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Listed publicly
    pub is_public: bool,
    /// Rule this occurrence was expanded from
    pub recurrence: Option<RecurrenceRule>,
    /// Saved as a reusable template
    pub is_template: bool,
    /// Lifecycle tag
    pub status: EventStatus,
    /// Invitees within capacity
    pub guests: Vec<Guest>,
    /// Invitees beyond capacity
    pub waitlist: Vec<Guest>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record last changed
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Builds the canonical event from a draft and its allocated invitees
    #[must_use]
    pub fn from_draft(
        draft: EventDraft,
        owner_id: UserId,
        guests: Vec<Guest>,
        waitlist: Vec<Guest>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_id,
            title: draft.title,
            description: draft.description,
            date: draft.date,
            time: draft.time,
            location: draft.location,
            capacity: draft.capacity,
            category: draft.category,
            tags: draft.tags,
            is_public: draft.is_public,
            recurrence: draft.recurrence,
            is_template: draft.is_template,
            status: EventStatus::Active,
            guests,
            waitlist,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy of this event moved to `date`, with fresh timestamps
    #[must_use]
    pub fn occurrence_on(&self, date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            date,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Whether `user` owns this event
    #[must_use]
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }

    /// Guest (not waitlist entry) with the given email
    #[must_use]
    pub fn guest(&self, email: &str) -> Option<&Guest> {
        self.guests.iter().find(|g| g.has_email(email))
    }

    fn guest_mut(&mut self, email: &str) -> Option<&mut Guest> {
        self.guests.iter_mut().find(|g| g.has_email(email))
    }

    /// Whether the email is already on the guest list or the waitlist
    #[must_use]
    pub fn is_invited(&self, email: &str) -> bool {
        self.guests
            .iter()
            .chain(self.waitlist.iter())
            .any(|g| g.has_email(email))
    }

    /// Capacity not yet taken by guests, `None` when unlimited
    #[must_use]
    pub fn remaining_capacity(&self) -> Option<Capacity> {
        self.capacity.map(|capacity| {
            let taken = u32::try_from(self.guests.len()).unwrap_or(u32::MAX);
            Capacity::new(capacity.value().saturating_sub(taken))
        })
    }

    /// Appends newly allocated invitees. Anyone already on the event is
    /// skipped, so replaying the same invitation is a no-op.
    pub fn add_invitees(&mut self, guests: &[Guest], waitlist: &[Guest], at: DateTime<Utc>) {
        for guest in guests {
            if !self.is_invited(&guest.email) {
                self.guests.push(guest.clone());
            }
        }
        for guest in waitlist {
            if !self.is_invited(&guest.email) {
                self.waitlist.push(guest.clone());
            }
        }
        self.updated_at = at;
    }

    /// Records an RSVP. Returns false when no guest has that email.
    pub fn record_response(&mut self, email: &str, status: GuestStatus, at: DateTime<Utc>) -> bool {
        let Some(guest) = self.guest_mut(email) else {
            return false;
        };
        guest.status = status;
        guest.responded_at = Some(at);
        self.updated_at = at;
        true
    }

    /// Sets a guest's role. Returns false when no guest has that email.
    pub fn assign_role(&mut self, email: &str, role: GuestRole, at: DateTime<Utc>) -> bool {
        let Some(guest) = self.guest_mut(email) else {
            return false;
        };
        guest.role = Some(role);
        self.updated_at = at;
        true
    }

    /// Marks a guest as checked in. Returns false when no guest has that email.
    pub fn check_in(&mut self, email: &str, at: DateTime<Utc>) -> bool {
        let Some(guest) = self.guest_mut(email) else {
            return false;
        };
        guest.checked_in = true;
        guest.checked_in_at = Some(at);
        self.updated_at = at;
        true
    }

    /// Applies a partial update of descriptive fields
    pub fn apply_changes(&mut self, changes: &EventChanges, at: DateTime<Utc>) {
        if let Some(title) = &changes.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &changes.description {
            self.description.clone_from(description);
        }
        if let Some(location) = &changes.location {
            self.location.clone_from(location);
        }
        if let Some(time) = &changes.time {
            self.time.clone_from(time);
        }
        self.updated_at = at;
    }
}

/// State of the event reducer: the events this process has scheduled or loaded
#[derive(Clone, Debug, Default)]
pub struct EventState {
    /// Known events by id
    pub events: HashMap<EventId, Event>,
    /// Ids produced by the most recent successful intake, in occurrence order
    pub last_scheduled: Vec<EventId>,
    /// Last validation or persistence error (if any)
    pub last_error: Option<String>,
}

impl EventState {
    /// Creates an empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known events
    #[must_use]
    pub fn count(&self) -> usize {
        self.events.len()
    }

    /// Event by id
    #[must_use]
    pub fn get(&self, id: &EventId) -> Option<&Event> {
        self.events.get(id)
    }

    /// Whether the event is known
    #[must_use]
    pub fn exists(&self, id: &EventId) -> bool {
        self.events.contains_key(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn negative_capacity_is_rejected() {
        assert_eq!(
            Capacity::try_from(-1),
            Err(IntakeError::InvalidCapacity(-1))
        );
        assert_eq!(Capacity::try_from(0).unwrap(), Capacity::new(0));
    }

    #[test]
    fn frequency_parses_case_insensitively() {
        assert_eq!("Weekly".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert!(matches!(
            "fortnightly".parse::<Frequency>(),
            Err(IntakeError::Validation(_))
        ));
    }

    #[test]
    fn weekday_filter_only_applies_to_weekly_rules() {
        // 2024-01-01 is a Monday
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let weekly = RecurrenceRule::new(Frequency::Weekly, 1, None).on_days([3]);
        let daily = RecurrenceRule::new(Frequency::Daily, 1, None).on_days([3]);

        assert!(weekly.skips(monday));
        assert!(!weekly.skips(monday + chrono::Days::new(2)));
        assert!(!daily.skips(monday));
    }

    #[test]
    fn add_invitees_skips_emails_already_on_the_event() {
        let now = DateTime::<Utc>::UNIX_EPOCH;
        let draft = EventDraft {
            title: "Picnic".to_string(),
            description: String::new(),
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            time: "12:00".to_string(),
            location: "Park".to_string(),
            guest_emails: vec![],
            capacity: None,
            category: "Social".to_string(),
            tags: vec![],
            is_public: false,
            recurrence: None,
            is_template: false,
        };
        let ada = Guest::invited("ada@example.com", GuestStatus::Pending, now);
        let mut event =
            Event::from_draft(draft, UserId::new("u"), vec![ada.clone()], vec![], now);

        let bob = Guest::invited("bob@example.com", GuestStatus::Waitlisted, now);
        event.add_invitees(&[ada.clone()], &[bob.clone()], now);
        event.add_invitees(&[], &[bob], now);

        assert_eq!(event.guests, vec![ada]);
        assert_eq!(event.waitlist.len(), 1);
    }

    #[test]
    fn guest_roles_use_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&GuestRole::CoHost).unwrap();
        assert_eq!(json, "\"co-host\"");
    }
}
