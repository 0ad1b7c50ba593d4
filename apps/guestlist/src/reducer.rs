//! Event reducer: intake, guest management and their side effects.
//!
//! Commands are validated synchronously against the reducer state. Accepted
//! commands return effects that write the change to the document store.
//! State only changes once the store reports back: a successful write yields
//! the matching event action (`EventsScheduled`, `GuestsInvited`,
//! `EventDeleted`, ...), which the reducer folds into state, while a failed
//! one yields `PersistenceFailed` and leaves state as it was. Invitation
//! emails go out after `GuestsInvited`.

use crate::allocation::{allocate_within, Allocation};
use crate::config::Config;
use crate::email::{render_invitation, render_reminder};
use crate::intake::{intake, is_valid_email, EventSubmission};
use crate::query::{list_events, EventQuery};
use crate::types::{
    Event, EventChanges, EventId, EventState, Guest, GuestRole, GuestStatus, RsvpResponse, UserId,
};
use chrono::{DateTime, Utc};
use guestlist_core::document_store::{DocumentStore, Filter, Stored, Update};
use guestlist_core::mailer::{EmailMessage, EmailSender};
use guestlist_core::{effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Message shown to users when the store fails; details go to the log
const PERSISTENCE_FAILURE: &str = "Changes could not be saved";

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the event reducer
///
/// Commands express intent, events record what happened.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum EventAction {
    // Commands
    /// Validate a submission and persist the resulting event or series
    CreateEvent {
        /// Authenticated user creating the event
        actor: UserId,
        /// Raw payload
        submission: EventSubmission,
    },

    /// Load the actor's events matching a query into state
    LoadEvents {
        /// Authenticated user
        actor: UserId,
        /// Filters
        query: EventQuery,
    },

    /// Invite more guests to an existing event
    InviteGuests {
        /// Event owner
        actor: UserId,
        /// Target event
        event_id: EventId,
        /// Emails to invite
        emails: Vec<String>,
    },

    /// A guest answers an invitation
    RespondToInvitation {
        /// Target event
        event_id: EventId,
        /// Guest email
        email: String,
        /// Answer
        response: RsvpResponse,
    },

    /// Give a guest a role
    AssignRole {
        /// Event owner
        actor: UserId,
        /// Target event
        event_id: EventId,
        /// Guest email
        email: String,
        /// New role
        role: GuestRole,
    },

    /// Mark a guest as arrived
    CheckInGuest {
        /// Event owner
        actor: UserId,
        /// Target event
        event_id: EventId,
        /// Guest email
        email: String,
    },

    /// Edit descriptive fields of an event
    UpdateEventDetails {
        /// Event owner
        actor: UserId,
        /// Target event
        event_id: EventId,
        /// Fields to change
        changes: EventChanges,
    },

    /// Remove an event
    DeleteEvent {
        /// Event owner
        actor: UserId,
        /// Target event
        event_id: EventId,
    },

    /// Email a reminder to every guest who has not declined
    SendReminders {
        /// Event owner
        actor: UserId,
        /// Target event
        event_id: EventId,
    },

    // Events
    /// Intake output was persisted
    EventsScheduled {
        /// Persisted events in occurrence order
        events: Vec<Stored<Event>>,
    },

    /// Events were read from the store
    EventsLoaded {
        /// Events in date/time order
        events: Vec<Stored<Event>>,
    },

    /// Invitees were allocated and appended to the stored event
    GuestsInvited {
        /// Target event
        event_id: EventId,
        /// New guests within capacity
        guests: Vec<Guest>,
        /// New waitlist entries
        waitlist: Vec<Guest>,
        /// When invited
        invited_at: DateTime<Utc>,
    },

    /// A guest's answer was recorded
    InvitationResponded {
        /// Target event
        event_id: EventId,
        /// Guest email
        email: String,
        /// New status
        status: GuestStatus,
        /// When answered
        responded_at: DateTime<Utc>,
    },

    /// A guest's role changed
    RoleAssigned {
        /// Target event
        event_id: EventId,
        /// Guest email
        email: String,
        /// New role
        role: GuestRole,
        /// When changed
        assigned_at: DateTime<Utc>,
    },

    /// A guest was checked in
    GuestCheckedIn {
        /// Target event
        event_id: EventId,
        /// Guest email
        email: String,
        /// When checked in
        checked_in_at: DateTime<Utc>,
    },

    /// Descriptive fields changed
    EventDetailsUpdated {
        /// Target event
        event_id: EventId,
        /// Applied changes
        changes: EventChanges,
        /// When changed
        updated_at: DateTime<Utc>,
    },

    /// An event was removed
    EventDeleted {
        /// Removed event
        event_id: EventId,
    },

    /// An email was handed to the sender
    EmailDelivered {
        /// Event the email was about
        event_id: EventId,
        /// Recipient
        email: String,
    },

    /// An email could not be delivered
    EmailDeliveryFailed {
        /// Event the email was about
        event_id: EventId,
        /// Recipient
        email: String,
        /// Sender error
        error: String,
    },

    /// Command validation failed
    ValidationFailed {
        /// Error message
        error: String,
    },

    /// The document store failed or matched nothing
    PersistenceFailed {
        /// Internal error description (logged, not shown to users)
        error: String,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the event reducer
#[derive(Clone)]
pub struct EventEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Event persistence
    pub store: Arc<dyn DocumentStore<Event>>,
    /// Email delivery
    pub mailer: Arc<dyn EmailSender>,
    /// Application configuration
    pub config: Arc<Config>,
}

impl EventEnvironment {
    /// Creates a new `EventEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Arc<dyn DocumentStore<Event>>,
        mailer: Arc<dyn EmailSender>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            clock,
            store,
            mailer,
            config,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for events and their guests
#[derive(Clone, Debug, Default)]
pub struct EventReducer;

impl EventReducer {
    /// Creates a new `EventReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    // ---------- Validation ----------

    /// Event the actor owns. Someone else's event reads as not found.
    fn owned_event<'a>(
        state: &'a EventState,
        event_id: &EventId,
        actor: &UserId,
    ) -> Result<&'a Event, String> {
        state
            .get(event_id)
            .filter(|event| event.is_owned_by(actor))
            .ok_or_else(|| format!("Event {event_id} not found"))
    }

    fn validate_guest_exists(event: &Event, email: &str) -> Result<(), String> {
        if event.guest(email).is_none() {
            return Err(format!("Invitation not found for {email}"));
        }
        Ok(())
    }

    /// Returns the emails that are not yet on the event, first occurrence
    /// wins within the batch
    fn validate_invite_guests(event: &Event, emails: &[String]) -> Result<Vec<String>, String> {
        let emails: Vec<String> = emails
            .iter()
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .collect();

        if emails.is_empty() {
            return Err("At least one guest email is required".to_string());
        }

        if let Some(invalid) = emails.iter().find(|email| !is_valid_email(email)) {
            return Err(format!("Invalid guest email: {invalid}"));
        }

        let mut seen = HashSet::new();
        let fresh: Vec<String> = emails
            .into_iter()
            .filter(|email| !event.is_invited(email))
            .filter(|email| seen.insert(email.to_ascii_lowercase()))
            .collect();

        if fresh.is_empty() {
            return Err("All of these guests are already invited".to_string());
        }

        Ok(fresh)
    }

    fn validate_changes(changes: &EventChanges) -> Result<(), String> {
        if changes.is_empty() {
            return Err("No fields to update".to_string());
        }
        if let Some(title) = &changes.title {
            if title.trim().is_empty() {
                return Err("Title cannot be empty".to_string());
            }
            if title.chars().count() > 200 {
                return Err("Title must be at most 200 characters".to_string());
            }
        }
        if changes
            .description
            .as_ref()
            .is_some_and(|d| d.chars().count() > 2000)
        {
            return Err("Description must be at most 2000 characters".to_string());
        }
        if changes.location.as_ref().is_some_and(|l| l.trim().is_empty()) {
            return Err("Location cannot be empty".to_string());
        }
        if changes.time.as_ref().is_some_and(|t| t.trim().is_empty()) {
            return Err("Time cannot be empty".to_string());
        }
        Ok(())
    }

    // ---------- Effects ----------

    /// Inserts intake output: one record with `insert_one`, a series with
    /// `insert_many`
    fn insert_events(events: Vec<Event>, env: &EventEnvironment) -> Effect<EventAction> {
        let store = Arc::clone(&env.store);
        Effect::future(async move {
            let result = match events.as_slice() {
                [single] => store.insert_one(single.clone()).await.map(|id| vec![id]),
                _ => store.insert_many(events.clone()).await,
            };

            match result {
                Ok(ids) => Some(EventAction::EventsScheduled {
                    events: ids
                        .into_iter()
                        .zip(events)
                        .map(|(id, event)| Stored::new(id, event))
                        .collect(),
                }),
                Err(error) => Some(EventAction::PersistenceFailed {
                    error: error.to_string(),
                }),
            }
        })
    }

    fn load_events(
        actor: UserId,
        query: EventQuery,
        env: &EventEnvironment,
    ) -> Effect<EventAction> {
        let store = Arc::clone(&env.store);
        Effect::future(async move {
            match list_events(store.as_ref(), &actor, &query).await {
                Ok(events) => Some(EventAction::EventsLoaded { events }),
                Err(error) => Some(EventAction::PersistenceFailed {
                    error: error.to_string(),
                }),
            }
        })
    }

    /// Targeted update of one event. `on_success` is fed back only when a
    /// document was modified; a filter that matches nothing is a failure.
    fn persist_update(
        event_id: EventId,
        filter: Filter<Event>,
        update: Update<Event>,
        on_success: EventAction,
        env: &EventEnvironment,
    ) -> Effect<EventAction> {
        let store = Arc::clone(&env.store);
        Effect::future(async move {
            match store.update_one(event_id, filter, update).await {
                Ok(0) => Some(EventAction::PersistenceFailed {
                    error: format!("update of event {event_id} matched no document"),
                }),
                Ok(_) => Some(on_success),
                Err(error) => Some(EventAction::PersistenceFailed {
                    error: error.to_string(),
                }),
            }
        })
    }

    fn persist_delete(
        event_id: EventId,
        owner: UserId,
        env: &EventEnvironment,
    ) -> Effect<EventAction> {
        let store = Arc::clone(&env.store);
        Effect::future(async move {
            let filter: Filter<Event> = Box::new(move |event: &Event| event.is_owned_by(&owner));
            match store.delete_one(event_id, filter).await {
                Ok(0) => Some(EventAction::PersistenceFailed {
                    error: format!("delete of event {event_id} matched no document"),
                }),
                Ok(_) => Some(EventAction::EventDeleted { event_id }),
                Err(error) => Some(EventAction::PersistenceFailed {
                    error: error.to_string(),
                }),
            }
        })
    }

    fn deliver(
        event_id: EventId,
        message: EmailMessage,
        env: &EventEnvironment,
    ) -> Effect<EventAction> {
        let mailer = Arc::clone(&env.mailer);
        Effect::future(async move {
            let email = message.to.clone();
            match mailer.send(message).await {
                Ok(()) => Some(EventAction::EmailDelivered { event_id, email }),
                Err(error) => Some(EventAction::EmailDeliveryFailed {
                    event_id,
                    email,
                    error: error.to_string(),
                }),
            }
        })
    }

    fn owner_filter(owner: &UserId) -> Filter<Event> {
        let owner = owner.clone();
        Box::new(move |event: &Event| event.is_owned_by(&owner))
    }

    fn guest_filter(email: &str) -> Filter<Event> {
        let email = email.to_string();
        Box::new(move |event: &Event| event.guest(&email).is_some())
    }

    /// Invitation emails for newly persisted guests
    fn send_invitations(
        state: &mut EventState,
        event_id: EventId,
        recipients: &[Guest],
        env: &EventEnvironment,
    ) -> SmallVec<[Effect<EventAction>; 4]> {
        let Some(event) = state.get(&event_id) else {
            return SmallVec::new();
        };

        let mut deliveries = Vec::with_capacity(recipients.len());
        let mut failures = Vec::new();
        for guest in recipients {
            match render_invitation(&event_id, event, &guest.email, &env.config) {
                Ok(message) => deliveries.push(Self::deliver(event_id, message, env)),
                Err(error) => failures.push(EventAction::EmailDeliveryFailed {
                    event_id,
                    email: guest.email.clone(),
                    error: error.to_string(),
                }),
            }
        }

        for failure in &failures {
            Self::apply_event(state, failure);
        }

        if deliveries.is_empty() {
            return SmallVec::new();
        }
        smallvec![Effect::merge(deliveries)]
    }

    // ---------- State ----------

    /// Applies an event to state
    fn apply_event(state: &mut EventState, action: &EventAction) {
        match action {
            EventAction::EventsScheduled { events } => {
                state.last_scheduled = events.iter().map(|stored| stored.id).collect();
                for stored in events {
                    state.events.insert(stored.id, stored.document.clone());
                }
                state.last_error = None;
            },
            EventAction::EventsLoaded { events } => {
                for stored in events {
                    state.events.insert(stored.id, stored.document.clone());
                }
                state.last_error = None;
            },
            EventAction::GuestsInvited {
                event_id,
                guests,
                waitlist,
                invited_at,
            } => {
                if let Some(event) = state.events.get_mut(event_id) {
                    event.add_invitees(guests, waitlist, *invited_at);
                }
                state.last_error = None;
            },
            EventAction::InvitationResponded {
                event_id,
                email,
                status,
                responded_at,
            } => {
                if let Some(event) = state.events.get_mut(event_id) {
                    event.record_response(email, *status, *responded_at);
                }
                state.last_error = None;
            },
            EventAction::RoleAssigned {
                event_id,
                email,
                role,
                assigned_at,
            } => {
                if let Some(event) = state.events.get_mut(event_id) {
                    event.assign_role(email, *role, *assigned_at);
                }
                state.last_error = None;
            },
            EventAction::GuestCheckedIn {
                event_id,
                email,
                checked_in_at,
            } => {
                if let Some(event) = state.events.get_mut(event_id) {
                    event.check_in(email, *checked_in_at);
                }
                state.last_error = None;
            },
            EventAction::EventDetailsUpdated {
                event_id,
                changes,
                updated_at,
            } => {
                if let Some(event) = state.events.get_mut(event_id) {
                    event.apply_changes(changes, *updated_at);
                }
                state.last_error = None;
            },
            EventAction::EventDeleted { event_id } => {
                state.events.remove(event_id);
                state.last_scheduled.retain(|id| id != event_id);
                state.last_error = None;
            },
            EventAction::EmailDelivered { event_id, email } => {
                debug!(%event_id, %email, "Email delivered");
            },
            EventAction::EmailDeliveryFailed {
                event_id,
                email,
                error,
            } => {
                warn!(%event_id, %email, %error, "Email delivery failed");
                state.last_error = Some(format!("Could not deliver email to {email}"));
            },
            EventAction::ValidationFailed { error } => {
                state.last_error = Some(error.clone());
            },
            EventAction::PersistenceFailed { error } => {
                error!(%error, "Document store operation failed");
                state.last_error = Some(PERSISTENCE_FAILURE.to_string());
            },
            // Commands carry no state change
            EventAction::CreateEvent { .. }
            | EventAction::LoadEvents { .. }
            | EventAction::InviteGuests { .. }
            | EventAction::RespondToInvitation { .. }
            | EventAction::AssignRole { .. }
            | EventAction::CheckInGuest { .. }
            | EventAction::UpdateEventDetails { .. }
            | EventAction::DeleteEvent { .. }
            | EventAction::SendReminders { .. } => {},
        }
    }

    fn reject(state: &mut EventState, error: String) -> SmallVec<[Effect<EventAction>; 4]> {
        Self::apply_event(state, &EventAction::ValidationFailed { error });
        SmallVec::new()
    }
}

impl Reducer for EventReducer {
    type State = EventState;
    type Action = EventAction;
    type Environment = EventEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per command, each short
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            EventAction::CreateEvent { actor, submission } => {
                let events = match intake(submission, &actor, env.clock.as_ref(), &env.config) {
                    Ok(events) => events,
                    Err(error) => {
                        warn!(
                            owner = %actor,
                            code = error.code(),
                            %error,
                            "Event submission rejected"
                        );
                        return Self::reject(state, error.to_string());
                    },
                };

                info!(owner = %actor, occurrences = events.len(), "Scheduling events");
                smallvec![Self::insert_events(events, env)]
            },

            EventAction::LoadEvents { actor, query } => {
                smallvec![Self::load_events(actor, query, env)]
            },

            EventAction::InviteGuests {
                actor,
                event_id,
                emails,
            } => {
                let event = match Self::owned_event(state, &event_id, &actor) {
                    Ok(event) => event,
                    Err(error) => return Self::reject(state, error),
                };
                let fresh = match Self::validate_invite_guests(event, &emails) {
                    Ok(fresh) => fresh,
                    Err(error) => return Self::reject(state, error),
                };

                let now = env.clock.now();
                let Allocation { guests, waitlist } =
                    allocate_within(&fresh, event.remaining_capacity(), now);

                info!(
                    %event_id,
                    guests = guests.len(),
                    waitlisted = waitlist.len(),
                    "Inviting guests"
                );

                let invited = EventAction::GuestsInvited {
                    event_id,
                    guests: guests.clone(),
                    waitlist: waitlist.clone(),
                    invited_at: now,
                };
                smallvec![Self::persist_update(
                    event_id,
                    Self::owner_filter(&actor),
                    Box::new(move |event: &mut Event| event.add_invitees(&guests, &waitlist, now)),
                    invited,
                    env,
                )]
            },

            EventAction::RespondToInvitation {
                event_id,
                email,
                response,
            } => {
                let Some(event) = state.get(&event_id) else {
                    return Self::reject(state, format!("Event {event_id} not found"));
                };
                if let Err(error) = Self::validate_guest_exists(event, &email) {
                    return Self::reject(state, error);
                }

                let status = GuestStatus::from(response);
                let now = env.clock.now();
                let responded = EventAction::InvitationResponded {
                    event_id,
                    email: email.clone(),
                    status,
                    responded_at: now,
                };

                let filter = Self::guest_filter(&email);
                smallvec![Self::persist_update(
                    event_id,
                    filter,
                    Box::new(move |event: &mut Event| {
                        event.record_response(&email, status, now);
                    }),
                    responded,
                    env,
                )]
            },

            EventAction::AssignRole {
                actor,
                event_id,
                email,
                role,
            } => {
                let event = match Self::owned_event(state, &event_id, &actor) {
                    Ok(event) => event,
                    Err(error) => return Self::reject(state, error),
                };
                if let Err(error) = Self::validate_guest_exists(event, &email) {
                    return Self::reject(state, error);
                }

                let now = env.clock.now();
                let assigned = EventAction::RoleAssigned {
                    event_id,
                    email: email.clone(),
                    role,
                    assigned_at: now,
                };

                smallvec![Self::persist_update(
                    event_id,
                    Self::owner_filter(&actor),
                    Box::new(move |event: &mut Event| {
                        event.assign_role(&email, role, now);
                    }),
                    assigned,
                    env,
                )]
            },

            EventAction::CheckInGuest {
                actor,
                event_id,
                email,
            } => {
                let event = match Self::owned_event(state, &event_id, &actor) {
                    Ok(event) => event,
                    Err(error) => return Self::reject(state, error),
                };
                match event.guest(&email) {
                    None => return Self::reject(state, format!("Invitation not found for {email}")),
                    Some(guest) if guest.checked_in => {
                        return Self::reject(state, format!("{email} is already checked in"));
                    },
                    Some(_) => {},
                }

                let now = env.clock.now();
                let checked_in = EventAction::GuestCheckedIn {
                    event_id,
                    email: email.clone(),
                    checked_in_at: now,
                };

                smallvec![Self::persist_update(
                    event_id,
                    Self::owner_filter(&actor),
                    Box::new(move |event: &mut Event| {
                        event.check_in(&email, now);
                    }),
                    checked_in,
                    env,
                )]
            },

            EventAction::UpdateEventDetails {
                actor,
                event_id,
                changes,
            } => {
                if let Err(error) = Self::owned_event(state, &event_id, &actor) {
                    return Self::reject(state, error);
                }
                if let Err(error) = Self::validate_changes(&changes) {
                    return Self::reject(state, error);
                }

                let now = env.clock.now();
                let updated = EventAction::EventDetailsUpdated {
                    event_id,
                    changes: changes.clone(),
                    updated_at: now,
                };

                smallvec![Self::persist_update(
                    event_id,
                    Self::owner_filter(&actor),
                    Box::new(move |event: &mut Event| event.apply_changes(&changes, now)),
                    updated,
                    env,
                )]
            },

            EventAction::DeleteEvent { actor, event_id } => {
                if let Err(error) = Self::owned_event(state, &event_id, &actor) {
                    return Self::reject(state, error);
                }

                info!(%event_id, "Deleting event");
                smallvec![Self::persist_delete(event_id, actor, env)]
            },

            EventAction::SendReminders { actor, event_id } => {
                let event = match Self::owned_event(state, &event_id, &actor) {
                    Ok(event) => event,
                    Err(error) => return Self::reject(state, error),
                };

                let deliveries: Vec<_> = event
                    .guests
                    .iter()
                    .filter(|g| matches!(g.status, GuestStatus::Pending | GuestStatus::Accepted))
                    .map(|g| {
                        let message = render_reminder(event, &g.email, &env.config);
                        Self::deliver(event_id, message, env)
                    })
                    .collect();

                if deliveries.is_empty() {
                    return Self::reject(state, "No guests to remind".to_string());
                }

                info!(%event_id, recipients = deliveries.len(), "Sending reminders");
                smallvec![Effect::merge(deliveries)]
            },

            // ========== Events ==========
            EventAction::GuestsInvited {
                event_id,
                ref guests,
                ..
            } => {
                Self::apply_event(state, &action);
                Self::send_invitations(state, event_id, guests, env)
            },

            event => {
                Self::apply_event(state, &event);
                SmallVec::new()
            },
        }
    }
}
