//! Tripwright Storage - Document Store Trait and In-Memory Implementation
//!
//! The engines are store-agnostic; the dispatch loop loads and saves
//! documents through [`DocumentStore`].

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tripwright_core::{StorageError, TripIntent, TripwrightError, TripwrightResult};

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Persistence for Trip Intent documents, keyed by trip id.
pub trait DocumentStore: Send + Sync {
    /// Load a document; `Ok(None)` when the trip is unknown.
    fn get(&self, trip_id: &str) -> TripwrightResult<Option<TripIntent>>;

    /// Insert or replace a document.
    fn save(&self, trip_id: &str, doc: &TripIntent) -> TripwrightResult<()>;

    /// Load a document that must exist.
    fn require(&self, trip_id: &str) -> TripwrightResult<TripIntent> {
        self.get(trip_id)?.ok_or_else(|| {
            TripwrightError::Storage(StorageError::NotFound {
                trip_id: trip_id.to_string(),
            })
        })
    }
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn get(&self, trip_id: &str) -> TripwrightResult<Option<TripIntent>> {
        (**self).get(trip_id)
    }

    fn save(&self, trip_id: &str, doc: &TripIntent) -> TripwrightResult<()> {
        (**self).save(trip_id, doc)
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory store. Documents are kept as plain JSON trees, so anything
/// saved here is exactly what a persistent store would see.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<String, Value>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw JSON as stored.
    pub fn raw(&self, trip_id: &str) -> TripwrightResult<Option<Value>> {
        let documents = self
            .documents
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(documents.get(trip_id).cloned())
    }

    /// Clear all stored data.
    pub fn clear(&self) -> TripwrightResult<()> {
        self.documents
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .clear();
        Ok(())
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn get(&self, trip_id: &str) -> TripwrightResult<Option<TripIntent>> {
        let Some(raw) = self.raw(trip_id)? else {
            return Ok(None);
        };
        let doc = TripIntent::from_value(raw).map_err(|e| StorageError::SerializationFailed {
            trip_id: trip_id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(doc))
    }

    fn save(&self, trip_id: &str, doc: &TripIntent) -> TripwrightResult<()> {
        let raw = doc.to_value().map_err(|e| StorageError::SerializationFailed {
            trip_id: trip_id.to_string(),
            reason: e.to_string(),
        })?;
        self.documents
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .insert(trip_id.to_string(), raw);
        tracing::trace!(trip_id, "Trip intent saved");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
