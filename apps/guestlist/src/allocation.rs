//! Capacity allocation: split invitees into the guest list and the waitlist.

use crate::error::IntakeError;
use crate::types::{Capacity, Guest, GuestStatus};
use chrono::{DateTime, Utc};
use guestlist_core::environment::Clock;
use serde::{Deserialize, Serialize};

/// Result of splitting an invitee list against a capacity
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// First `capacity` invitees, each `pending`
    pub guests: Vec<Guest>,
    /// Everyone after them, each `waitlisted`
    pub waitlist: Vec<Guest>,
}

/// Splits `emails` into guests and waitlist.
///
/// With no capacity, or a capacity at least as large as the list, everyone is
/// a guest. Otherwise the first `capacity` emails in submission order are
/// guests and the rest are waitlisted. Every record is stamped with the same
/// clock reading. Duplicate emails are not collapsed.
///
/// # Errors
///
/// Returns [`IntakeError::InvalidCapacity`] for a negative capacity.
pub fn allocate(
    emails: &[String],
    capacity: Option<i64>,
    clock: &dyn Clock,
) -> Result<Allocation, IntakeError> {
    let capacity = capacity.map(Capacity::try_from).transpose()?;
    Ok(allocate_within(emails, capacity, clock.now()))
}

/// Infallible core of [`allocate`] for an already validated capacity.
#[must_use]
pub fn allocate_within(
    emails: &[String],
    capacity: Option<Capacity>,
    invited_at: DateTime<Utc>,
) -> Allocation {
    let split = capacity.map_or(emails.len(), |c| c.as_usize().min(emails.len()));
    let (accepted, overflow) = emails.split_at(split);

    let stamp = move |status: GuestStatus| {
        move |email: &String| Guest::invited(email.clone(), status, invited_at)
    };

    Allocation {
        guests: accepted.iter().map(stamp(GuestStatus::Pending)).collect(),
        waitlist: overflow.iter().map(stamp(GuestStatus::Waitlisted)).collect(),
    }
}
