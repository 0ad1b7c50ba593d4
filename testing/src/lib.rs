//! # Guestlist Testing
//!
//! Testing utilities and helpers for the guestlist workspace.
//!
//! This crate provides:
//! - Mock implementations of Environment traits (clock, document store, email sender)
//! - A Given-When-Then harness for reducers
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use guestlist_testing::{test_clock, InMemoryDocumentStore, RecordingEmailSender};
//!
//! let env = EventEnvironment::new(
//!     Arc::new(test_clock()),
//!     Arc::new(InMemoryDocumentStore::new()),
//!     Arc::new(RecordingEmailSender::new()),
//!     Arc::new(Config::default()),
//! );
//! ```


pub use reducer_test::{assertions, ReducerTest};

use chrono::{DateTime, Utc};
use guestlist_core::environment::Clock;

/// Mock implementations of Environment traits
pub mod mocks {
    #![allow(clippy::unwrap_used)] // Poisoned locks in test doubles are a test failure anyway

    use super::{Clock, DateTime, Utc};
    use guestlist_core::document_store::{
        DocumentId, DocumentStore, DocumentStoreError, Filter, StoreFuture, Stored, Update,
    };
    use guestlist_core::mailer::{EmailError, EmailMessage, EmailSender};
    use std::collections::HashSet;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::{Arc, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use guestlist_testing::mocks::FixedClock;
    /// use guestlist_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// In-memory document store for fast, deterministic testing.
    ///
    /// Records are kept in insertion order. Batch inserts are atomic: the
    /// whole batch lands under one write lock, or nothing does when the store
    /// has been told to reject batches.
    ///
    /// # Example
    ///
    /// ```
    /// use guestlist_testing::InMemoryDocumentStore;
    /// use guestlist_core::document_store::DocumentStore;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let store = InMemoryDocumentStore::<String>::new();
    /// let id = store.insert_one("draft".to_string()).await?;
    /// assert!(store.find_one(id).await?.is_some());
    /// # Ok(())
    /// # }
    /// ```
    #[derive(Clone, Debug)]
    pub struct InMemoryDocumentStore<D> {
        documents: Arc<RwLock<Vec<Stored<D>>>>,
        reject_batches: Arc<RwLock<Option<String>>>,
        reject_updates: Arc<RwLock<Option<String>>>,
    }

    impl<D> InMemoryDocumentStore<D> {
        /// Create a new empty store
        #[must_use]
        pub fn new() -> Self {
            Self {
                documents: Arc::new(RwLock::new(Vec::new())),
                reject_batches: Arc::new(RwLock::new(None)),
                reject_updates: Arc::new(RwLock::new(None)),
            }
        }

        /// Make every subsequent insert fail with `BatchRejected(reason)`
        pub fn reject_inserts(&self, reason: impl Into<String>) {
            *self.reject_batches.write().unwrap() = Some(reason.into());
        }

        /// Make every subsequent update fail with `DatabaseError(reason)`
        pub fn reject_updates(&self, reason: impl Into<String>) {
            *self.reject_updates.write().unwrap() = Some(reason.into());
        }

        /// Undo [`reject_inserts`](Self::reject_inserts) and
        /// [`reject_updates`](Self::reject_updates)
        pub fn accept_writes(&self) {
            *self.reject_batches.write().unwrap() = None;
            *self.reject_updates.write().unwrap() = None;
        }

        /// Number of stored records
        #[must_use]
        pub fn len(&self) -> usize {
            self.documents.read().unwrap().len()
        }

        /// Check if the store is empty
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.documents.read().unwrap().is_empty()
        }

        fn rejection(&self) -> Option<DocumentStoreError> {
            self.reject_batches
                .read()
                .unwrap()
                .clone()
                .map(DocumentStoreError::BatchRejected)
        }
    }

    impl<D: Clone> InMemoryDocumentStore<D> {
        /// Snapshot of every stored record, in insertion order
        #[must_use]
        pub fn all(&self) -> Vec<Stored<D>> {
            self.documents.read().unwrap().clone()
        }
    }

    impl<D> Default for InMemoryDocumentStore<D> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<D> DocumentStore<D> for InMemoryDocumentStore<D>
    where
        D: Clone + Send + Sync + 'static,
    {
        fn insert_one(&self, document: D) -> StoreFuture<'_, DocumentId> {
            Box::pin(async move {
                if let Some(error) = self.rejection() {
                    return Err(error);
                }
                let id = DocumentId::new();
                self.documents
                    .write()
                    .unwrap()
                    .push(Stored::new(id, document));
                Ok(id)
            })
        }

        fn insert_many(&self, documents: Vec<D>) -> StoreFuture<'_, Vec<DocumentId>> {
            Box::pin(async move {
                if let Some(error) = self.rejection() {
                    return Err(error);
                }
                let mut stored = self.documents.write().unwrap();
                let ids: Vec<DocumentId> = documents
                    .into_iter()
                    .map(|document| {
                        let id = DocumentId::new();
                        stored.push(Stored::new(id, document));
                        id
                    })
                    .collect();
                Ok(ids)
            })
        }

        fn find_one(&self, id: DocumentId) -> StoreFuture<'_, Option<Stored<D>>> {
            Box::pin(async move {
                Ok(self
                    .documents
                    .read()
                    .unwrap()
                    .iter()
                    .find(|stored| stored.id == id)
                    .cloned())
            })
        }

        fn find(&self, filter: Filter<D>) -> StoreFuture<'_, Vec<Stored<D>>> {
            Box::pin(async move {
                Ok(self
                    .documents
                    .read()
                    .unwrap()
                    .iter()
                    .filter(|stored| filter(&stored.document))
                    .cloned()
                    .collect())
            })
        }

        fn update_one(
            &self,
            id: DocumentId,
            filter: Filter<D>,
            update: Update<D>,
        ) -> StoreFuture<'_, u64> {
            Box::pin(async move {
                if let Some(reason) = self.reject_updates.read().unwrap().clone() {
                    return Err(DocumentStoreError::DatabaseError(reason));
                }
                let mut documents = self.documents.write().unwrap();
                match documents
                    .iter_mut()
                    .find(|stored| stored.id == id && filter(&stored.document))
                {
                    Some(stored) => {
                        update(&mut stored.document);
                        Ok(1)
                    },
                    None => Ok(0),
                }
            })
        }

        fn delete_one(&self, id: DocumentId, filter: Filter<D>) -> StoreFuture<'_, u64> {
            Box::pin(async move {
                let mut documents = self.documents.write().unwrap();
                let before = documents.len();
                documents.retain(|stored| !(stored.id == id && filter(&stored.document)));
                Ok((before - documents.len()) as u64)
            })
        }
    }

    /// Email sender that records every message instead of delivering it.
    ///
    /// Addresses registered with [`RecordingEmailSender::reject`] fail with
    /// `RecipientRejected`, which lets tests exercise delivery failures.
    #[derive(Clone, Debug, Default)]
    pub struct RecordingEmailSender {
        sent: Arc<RwLock<Vec<EmailMessage>>>,
        rejected: Arc<RwLock<HashSet<String>>>,
    }

    impl RecordingEmailSender {
        /// Create a sender with an empty outbox
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Refuse delivery to `address`
        pub fn reject(&self, address: impl Into<String>) {
            self.rejected.write().unwrap().insert(address.into());
        }

        /// Every message delivered so far, in send order
        #[must_use]
        pub fn sent(&self) -> Vec<EmailMessage> {
            self.sent.read().unwrap().clone()
        }

        /// Recipients of delivered messages, in send order
        #[must_use]
        pub fn recipients(&self) -> Vec<String> {
            self.sent
                .read()
                .unwrap()
                .iter()
                .map(|message| message.to.clone())
                .collect()
        }
    }

    impl EmailSender for RecordingEmailSender {
        fn send(
            &self,
            message: EmailMessage,
        ) -> Pin<Box<dyn Future<Output = Result<(), EmailError>> + Send + '_>> {
            Box::pin(async move {
                if self.rejected.read().unwrap().contains(&message.to) {
                    return Err(EmailError::RecipientRejected(message.to));
                }
                self.sent.write().unwrap().push(message);
                Ok(())
            })
        }
    }
}

// Re-export commonly used items
pub use mocks::{test_clock, FixedClock, InMemoryDocumentStore, RecordingEmailSender};
