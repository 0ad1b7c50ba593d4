//! Listing an owner's events.

use crate::types::{Event, UserId};
use guestlist_core::document_store::{DocumentStore, DocumentStoreError, Stored};
use serde::{Deserialize, Serialize};

/// Visibility filter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    /// Only public events
    Public,
    /// Only private events
    Private,
}

/// Filters for listing events. Every set filter must match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventQuery {
    /// Exact category; `"all"` disables the filter
    pub category: Option<String>,
    /// Matches events carrying at least one of these tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Only templates
    #[serde(default)]
    pub templates_only: bool,
    /// Visibility
    pub privacy: Option<Privacy>,
}

impl EventQuery {
    /// Whether `event` passes every filter
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        let category_ok = match self.category.as_deref() {
            None | Some("all") => true,
            Some(category) => event.category == category,
        };
        let tags_ok = self.tags.is_empty() || event.tags.iter().any(|t| self.tags.contains(t));
        let template_ok = !self.templates_only || event.is_template;
        let privacy_ok = match self.privacy {
            None => true,
            Some(Privacy::Public) => event.is_public,
            Some(Privacy::Private) => !event.is_public,
        };

        category_ok && tags_ok && template_ok && privacy_ok
    }
}

/// Events owned by `owner` that match `query`, sorted by date then time.
///
/// # Errors
///
/// Propagates store failures.
pub async fn list_events(
    store: &dyn DocumentStore<Event>,
    owner: &UserId,
    query: &EventQuery,
) -> Result<Vec<Stored<Event>>, DocumentStoreError> {
    let owner = owner.clone();
    let query = query.clone();
    let mut events = store
        .find(Box::new(move |event: &Event| {
            event.is_owned_by(&owner) && query.matches(event)
        }))
        .await?;

    events.sort_by(|a, b| {
        (a.document.date, &a.document.time).cmp(&(b.document.date, &b.document.time))
    });
    Ok(events)
}
