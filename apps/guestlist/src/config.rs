//! Configuration management for the guestlist service.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Public base URL used for invitation links
    pub base_url: Url,
    /// Sender address on outgoing email
    pub email_from: String,
    /// Upper bound on occurrences a single recurrence may expand to
    pub max_occurrences: usize,
    /// Category assigned when a submission leaves it blank
    pub default_category: String,
    /// Log filter for the tracing subscriber
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparseable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("GUESTLIST_BASE_URL")
                .ok()
                .and_then(|s| Url::parse(&s).ok())
                .unwrap_or(defaults.base_url),
            email_from: env::var("GUESTLIST_EMAIL_FROM").unwrap_or(defaults.email_from),
            max_occurrences: env::var("GUESTLIST_MAX_OCCURRENCES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_occurrences),
            default_category: env::var("GUESTLIST_DEFAULT_CATEGORY")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.default_category),
            log_level: env::var("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Builder-style override of the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Builder-style override of the occurrence limit
    #[must_use]
    pub const fn with_max_occurrences(mut self, max_occurrences: usize) -> Self {
        self.max_occurrences = max_occurrences;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL)
                .unwrap_or_else(|_| unreachable!("default base URL is a valid URL")),
            email_from: "events@localhost".to_string(),
            max_occurrences: 366,
            default_category: "Other".to_string(),
            log_level: "info,guestlist=debug".to_string(),
        }
    }
}
