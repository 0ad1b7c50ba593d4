//! Email sender abstraction.
//!
//! The domain renders messages itself and hands them to an [`EmailSender`]
//! for delivery. Transport (SMTP, an HTTP email API) lives behind the trait.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// A fully rendered email ready for delivery
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Sender address
    pub from: String,
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html: String,
}

/// Errors reported by an email sender
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The recipient address was rejected by the transport
    #[error("Recipient rejected: {0}")]
    RecipientRejected(String),

    /// The transport could not deliver the message
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// The message could not be rendered
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// Delivers rendered messages.
///
/// Returns boxed futures so it can be shared as `Arc<dyn EmailSender>`.
pub trait EmailSender: Send + Sync {
    /// Send one message.
    ///
    /// # Errors
    ///
    /// - `RecipientRejected`: The address was refused
    /// - `DeliveryFailed`: Transport failure
    fn send(
        &self,
        message: EmailMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EmailError>> + Send + '_>>;
}
