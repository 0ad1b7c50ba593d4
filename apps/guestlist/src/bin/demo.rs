//! Guestlist demo
//!
//! Walks through the main flows against an in-memory document store with
//! emails printed to the log:
//!
//! - create a capacity-limited event and watch the waitlist fill
//! - create a weekly recurring series
//! - invite more guests, RSVP and check in
//! - list events and export one as iCalendar
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info,guestlist=debug cargo run --bin guestlist-demo
//! ```

use guestlist::calendar::to_icalendar;
use guestlist::{
    Config, ConsoleEmailSender, Event, EventAction, EventEnvironment, EventQuery, EventReducer,
    EventState, EventSubmission, RsvpResponse, UserId,
};
use guestlist_core::environment::{Clock, SystemClock};
use guestlist_runtime::Store;
use guestlist_testing::InMemoryDocumentStore;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        base_url = %config.base_url,
        max_occurrences = config.max_occurrences,
        "Configuration loaded"
    );

    let clock = Arc::new(SystemClock);
    let env = EventEnvironment::new(
        clock.clone(),
        Arc::new(InMemoryDocumentStore::<Event>::new()),
        Arc::new(ConsoleEmailSender::new()),
        Arc::new(config),
    );
    let store = Store::new(EventState::new(), EventReducer::new(), env);
    let organizer = UserId::new("user_demo");

    // 1. Capacity-limited event
    let submission: EventSubmission = serde_json::from_value(json!({
        "title": "Rooftop dinner",
        "description": "Two seats, first come first served",
        "date": "2025-07-12",
        "time": "19:30",
        "location": "Terrace",
        "guests": "ada@example.com, grace@example.com, linus@example.com",
        "capacity": 2,
        "tags": ["food"]
    }))?;
    store
        .send(EventAction::CreateEvent {
            actor: organizer.clone(),
            submission,
        })
        .await?;

    let (dinner_id, guests, waitlist) = store
        .state(|s| {
            let id = s.last_scheduled.first().copied();
            let event = id.and_then(|id| s.get(&id));
            (
                id,
                event.map_or(0, |e| e.guests.len()),
                event.map_or(0, |e| e.waitlist.len()),
            )
        })
        .await;
    let Some(dinner_id) = dinner_id else {
        return Err("dinner was not scheduled".into());
    };
    tracing::info!(%dinner_id, guests, waitlist, "Dinner scheduled");

    // 2. Weekly series on Tuesdays and Thursdays
    let submission: EventSubmission = serde_json::from_value(json!({
        "title": "Running club",
        "date": "2025-06-02",
        "time": "07:00",
        "location": "Riverside",
        "category": "Sports",
        "recurrence": {
            "frequency": "weekly",
            "interval": 1,
            "endDate": "2025-06-30",
            "daysOfWeek": [2, 4]
        }
    }))?;
    store
        .send(EventAction::CreateEvent {
            actor: organizer.clone(),
            submission,
        })
        .await?;
    let occurrences = store.state(|s| s.last_scheduled.len()).await;
    tracing::info!(occurrences, "Running club series scheduled");

    // 3. Guest management
    store
        .send(EventAction::InviteGuests {
            actor: organizer.clone(),
            event_id: dinner_id,
            emails: vec!["margaret@example.com".to_string()],
        })
        .await?;
    store
        .send(EventAction::RespondToInvitation {
            event_id: dinner_id,
            email: "ada@example.com".to_string(),
            response: RsvpResponse::Accepted,
        })
        .await?;
    store
        .send(EventAction::CheckInGuest {
            actor: organizer.clone(),
            event_id: dinner_id,
            email: "ada@example.com".to_string(),
        })
        .await?;
    if let Some(error) = store.state(|s| s.last_error.clone()).await {
        tracing::warn!(%error, "Last command was rejected");
    }

    // 4. Listing and export
    store
        .send(EventAction::LoadEvents {
            actor: organizer.clone(),
            query: EventQuery::default(),
        })
        .await?;
    let total = store.state(|s| s.count()).await;
    tracing::info!(total, "Events loaded");

    let ics = store
        .state(|s| s.get(&dinner_id).map(|e| to_icalendar(&dinner_id, e, clock.now())))
        .await;
    if let Some(ics) = ics {
        tracing::info!("iCalendar export:\n{ics}");
    }

    store.shutdown();
    Ok(())
}
