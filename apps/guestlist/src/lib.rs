//! Guestlist - event intake, capacity allocation and recurring events
//!
//! Organizers submit events with an invite list and an optional capacity.
//! Intake validates the submission, splits the invitees into a guest list and
//! a waitlist, and expands recurring events into one record per occurrence.
//! Everything is computed in memory and handed to the document store as one
//! batch.
//!
//! # Architecture
//!
//! ```text
//! EventSubmission ──► intake ──► allocate ──► expand ──► Vec<Event>
//!                                                           │
//!                     EventReducer ◄── EventsScheduled ◄────┘ insert_many
//!                          │
//!                          ├─ InviteGuests / RespondToInvitation / CheckInGuest ...
//!                          └─ invitations and reminders via EmailSender
//! ```
//!
//! Allocation ([`allocation`]) and expansion ([`recurrence`]) are pure and take
//! their timestamps from an injected [`Clock`](guestlist_core::environment::Clock),
//! so a fixed clock gives byte-identical output.
//!
//! # Usage
//!
//! See the [`reducer`] module for the command flow and `src/bin/demo.rs` for a
//! runnable walk-through.

#![forbid(unsafe_code)]

pub mod allocation;
pub mod calendar;
pub mod config;
pub mod email;
pub mod error;
pub mod intake;
pub mod query;
pub mod recurrence;
pub mod reducer;
pub mod types;

pub use allocation::{allocate, Allocation};
pub use config::Config;
pub use email::ConsoleEmailSender;
pub use error::IntakeError;
pub use intake::{build_events, intake, EventSubmission};
pub use query::{list_events, EventQuery, Privacy};
pub use recurrence::{expand, expand_bounded, OccurrenceDates};
pub use reducer::{EventAction, EventEnvironment, EventReducer};
pub use types::{
    Capacity, Event, EventDraft, EventId, EventState, Frequency, Guest, GuestRole, GuestStatus,
    RecurrenceRule, RsvpResponse, UserId,
};
