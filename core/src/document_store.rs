//! Document store trait and related types for persisting domain records.
//!
//! A document store is a keyed collection of typed records. It supports exactly
//! the operations the domain needs:
//!
//! - Insert one record, or a batch of records that must succeed or fail as a whole
//! - Find a record by id, or every record matching a filter
//! - Update a record by id and filter
//! - Delete a record by id and filter
//!
//! Identifiers are assigned by the store on insert. Records handed to the store
//! therefore carry no identity of their own, which keeps the code that builds
//! them deterministic.
//!
//! # Implementations
//!
//! - `InMemoryDocumentStore` (in `guestlist-testing` crate): Fast, deterministic testing
//!
//! # Example
//!
//! ```no_run
//! use guestlist_core::document_store::{DocumentStore, DocumentStoreError};
//!
//! async fn example<S: DocumentStore<String>>(store: &S) -> Result<(), DocumentStoreError> {
//!     let ids = store
//!         .insert_many(vec!["first".to_string(), "second".to_string()])
//!         .await?;
//!
//!     let modified = store
//!         .update_one(ids[0], Box::new(|_| true), Box::new(|doc| doc.push('!')))
//!         .await?;
//!     assert_eq!(modified, 1);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Boxed future returned by document store operations.
pub type StoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, DocumentStoreError>> + Send + 'a>>;

/// Predicate a stored record must satisfy for an operation to apply to it.
pub type Filter<D> = Box<dyn Fn(&D) -> bool + Send + Sync>;

/// In-place modification applied to a matched record.
pub type Update<D> = Box<dyn FnOnce(&mut D) + Send>;

/// Store-assigned identifier of a persisted record
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Creates a new random `DocumentId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `DocumentId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record together with the identifier the store assigned to it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stored<D> {
    /// Store-assigned identifier
    pub id: DocumentId,
    /// The persisted record
    pub document: D,
}

impl<D> Stored<D> {
    /// Pairs a record with its identifier
    #[must_use]
    pub const fn new(id: DocumentId, document: D) -> Self {
        Self { id, document }
    }
}

/// Errors that can occur during document store operations.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// A batch insert was rejected as a whole.
    #[error("Batch rejected: {0}")]
    BatchRejected(String),

    /// Database connection error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Document store abstraction for a single collection of `D` records.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be shared across tasks.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// to enable trait object usage (`Arc<dyn DocumentStore<D>>`). Reducers build
/// effects that capture the store, so it has to live behind a trait object.
pub trait DocumentStore<D>: Send + Sync {
    /// Insert a single record and return its new identifier.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn insert_one(&self, document: D) -> StoreFuture<'_, DocumentId>;

    /// Insert a batch of records.
    ///
    /// The batch is all-or-nothing: either every record is persisted and the
    /// returned ids are in input order, or none is.
    ///
    /// # Errors
    ///
    /// - `BatchRejected`: The batch could not be persisted as a whole
    /// - `DatabaseError`: Database connection or query failed
    fn insert_many(&self, documents: Vec<D>) -> StoreFuture<'_, Vec<DocumentId>>;

    /// Load a record by id. A missing record is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn find_one(&self, id: DocumentId) -> StoreFuture<'_, Option<Stored<D>>>;

    /// Load every record matching `filter`, in insertion order.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn find(&self, filter: Filter<D>) -> StoreFuture<'_, Vec<Stored<D>>>;

    /// Apply `update` to the record with `id` if it also matches `filter`.
    ///
    /// Returns the number of modified records (0 or 1).
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn update_one(
        &self,
        id: DocumentId,
        filter: Filter<D>,
        update: Update<D>,
    ) -> StoreFuture<'_, u64>;

    /// Delete the record with `id` if it also matches `filter`.
    ///
    /// Returns the number of deleted records (0 or 1).
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn delete_one(&self, id: DocumentId, filter: Filter<D>) -> StoreFuture<'_, u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_rejected_error_display() {
        let error = DocumentStoreError::BatchRejected("duplicate key".to_string());
        let display = format!("{error}");
        assert!(display.contains("Batch rejected"));
        assert!(display.contains("duplicate key"));
    }

    #[test]
    fn document_id_displays_inner_uuid() {
        let uuid = Uuid::nil();
        let id = DocumentId::from_uuid(uuid);
        assert_eq!(id.to_string(), uuid.to_string());
        assert_eq!(id.as_uuid(), &uuid);
    }
}
