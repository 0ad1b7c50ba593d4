//! Invitation and reminder emails.
//!
//! Rendering is pure: it turns an event and a recipient into an
//! [`EmailMessage`]. Delivery goes through whatever [`EmailSender`] the
//! environment carries; [`ConsoleEmailSender`] logs instead of sending.

use crate::config::Config;
use crate::types::{Event, EventId, RsvpResponse};
use guestlist_core::mailer::{EmailError, EmailMessage, EmailSender};
use std::future::Future;
use std::pin::Pin;
use tracing::info;
use url::Url;

/// Accept or decline link for one invitee:
/// `{base}/invite/{event}/{accept|decline}/{email}`
///
/// # Errors
///
/// Returns [`EmailError::InvalidMessage`] when the base URL cannot carry a
/// path (for example a `mailto:` URL).
pub fn invitation_link(
    base_url: &Url,
    event_id: &EventId,
    response: RsvpResponse,
    email: &str,
) -> Result<Url, EmailError> {
    let action = match response {
        RsvpResponse::Accepted => "accept",
        RsvpResponse::Declined => "decline",
    };
    let event_segment = event_id.to_string();

    let mut link = base_url.clone();
    link.path_segments_mut()
        .map_err(|()| {
            EmailError::InvalidMessage(format!("base URL cannot carry a path: {base_url}"))
        })?
        .pop_if_empty()
        .extend(["invite", event_segment.as_str(), action, email]);
    Ok(link)
}

/// Renders the "You're invited" email for `email`.
///
/// # Errors
///
/// Returns [`EmailError::InvalidMessage`] when the RSVP links cannot be built.
pub fn render_invitation(
    event_id: &EventId,
    event: &Event,
    email: &str,
    config: &Config,
) -> Result<EmailMessage, EmailError> {
    let accept = invitation_link(&config.base_url, event_id, RsvpResponse::Accepted, email)?;
    let decline = invitation_link(&config.base_url, event_id, RsvpResponse::Declined, email)?;

    let html = format!(
        "<h1>You're Invited!</h1>\n\
         <p>You've been invited to attend {title}</p>\n\
         {details}\
         <p><a href=\"{accept}\">Accept</a> <a href=\"{decline}\">Decline</a></p>\n",
        title = escape_html(&event.title),
        details = details(event),
        accept = escape_html(accept.as_str()),
        decline = escape_html(decline.as_str()),
    );

    Ok(EmailMessage {
        from: config.email_from.clone(),
        to: email.to_string(),
        subject: format!("You're invited to {}!", event.title),
        html: wrap("Event Invitation", &html),
    })
}

/// Renders the reminder email for `email`
#[must_use]
pub fn render_reminder(event: &Event, email: &str, config: &Config) -> EmailMessage {
    let html = format!(
        "<h1>Event Reminder</h1>\n\
         <p>This is a reminder about the upcoming event: {title}</p>\n\
         {details}",
        title = escape_html(&event.title),
        details = details(event),
    );

    EmailMessage {
        from: config.email_from.clone(),
        to: email.to_string(),
        subject: format!("Reminder: {}", event.title),
        html: wrap("Event Reminder", &html),
    }
}

fn details(event: &Event) -> String {
    format!(
        "<h2>Event Details</h2>\n\
         <p><strong>Date:</strong> {date}</p>\n\
         <p><strong>Time:</strong> {time}</p>\n\
         <p><strong>Location:</strong> {location}</p>\n",
        date = event.date.format("%A, %B %-d, %Y"),
        time = escape_html(&event.time),
        location = escape_html(&event.location),
    )
}

fn wrap(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n\
         {body}\
         </body>\n\
         </html>\n"
    )
}

/// Escapes the five HTML-significant characters
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Email sender that logs messages instead of delivering them.
///
/// Used by the demo binary and local development.
#[derive(Debug, Clone, Default)]
pub struct ConsoleEmailSender;

impl ConsoleEmailSender {
    /// Create a new console sender
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EmailSender for ConsoleEmailSender {
    fn send(
        &self,
        message: EmailMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EmailError>> + Send + '_>> {
        Box::pin(async move {
            info!(
                from = %message.from,
                to = %message.to,
                subject = %message.subject,
                bytes = message.html.len(),
                "Email (console delivery)"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{EventStatus, UserId};
    use chrono::NaiveDate;
    use guestlist_core::environment::Clock;
    use guestlist_testing::test_clock;

    fn event() -> Event {
        let now = test_clock().now();
        Event {
            owner_id: UserId::new("owner"),
            title: "Tom & Jerry's <Party>".to_string(),
            description: String::new(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            time: "18:00".to_string(),
            location: "Rooftop".to_string(),
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

    #[test]
    fn invitation_links_point_at_rsvp_routes() {
        let id = EventId::new();
        let base = Url::parse("https://events.example.com/").unwrap();

        let accept =
            invitation_link(&base, &id, RsvpResponse::Accepted, "ada@example.com").unwrap();
        assert_eq!(
            accept.as_str(),
            format!("https://events.example.com/invite/{id}/accept/ada@example.com")
        );

        let decline =
            invitation_link(&base, &id, RsvpResponse::Declined, "a b@example.com").unwrap();
        assert!(decline.as_str().ends_with("/decline/a%20b@example.com"));
    }

    #[test]
    fn links_respect_a_base_path() {
        let id = EventId::new();
        let base = Url::parse("https://example.com/app").unwrap();
        let link = invitation_link(&base, &id, RsvpResponse::Accepted, "x@example.com").unwrap();
        assert!(link.path().starts_with("/app/invite/"));
    }

    #[test]
    fn cannot_be_a_base_url_is_rejected() {
        let base = Url::parse("mailto:events@example.com").unwrap();
        let result =
            invitation_link(&base, &EventId::new(), RsvpResponse::Accepted, "x@example.com");
        assert!(matches!(result, Err(EmailError::InvalidMessage(_))));
    }

    #[test]
    fn invitation_escapes_user_content() {
        let config = Config::default();
        let message =
            render_invitation(&EventId::new(), &event(), "ada@example.com", &config).unwrap();

        assert_eq!(message.subject, "You're invited to Tom & Jerry's <Party>!");
        assert_eq!(message.to, "ada@example.com");
        assert_eq!(message.from, config.email_from);
        assert!(message.html.contains("Tom &amp; Jerry&#39;s &lt;Party&gt;"));
        assert!(message.html.contains("Saturday, June 1, 2024"));
        assert!(message.html.contains("/accept/ada@example.com"));
    }

    #[test]
    fn reminder_has_details_and_no_links() {
        let message = render_reminder(&event(), "ada@example.com", &Config::default());
        assert!(message.subject.starts_with("Reminder: "));
        assert!(message
            .html
            .contains("<body>\n<h1>Event Reminder</h1>\n<p>This is a reminder"));
        assert!(message
            .html
            .contains("<p><strong>Location:</strong> Rooftop</p>\n</body>"));
        assert!(!message.html.contains("/invite/"));
    }

    #[tokio::test]
    async fn console_sender_accepts_everything() {
        let message = render_reminder(&event(), "ada@example.com", &Config::default());
        assert!(ConsoleEmailSender::new().send(message).await.is_ok());
    }
}
