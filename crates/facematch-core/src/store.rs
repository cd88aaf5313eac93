//! Reference store boundary.
//!
//! The core never owns identity records; it only needs to enumerate them and
//! to persist one record's embedding. Implementations decide their own
//! consistency model: a resolution is a fetch-all-then-scan, so a store that
//! allows concurrent writes may hand out a snapshot that mixes old and new rows.

use crate::types::{Embedding, IdentityRecord};

pub trait ReferenceStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// All records, in an order that is deterministic for one snapshot.
    fn list_all(&self) -> Result<Vec<IdentityRecord>, Self::Error>;

    /// Replace the stored embedding of record `id`.
    fn persist_embedding(&mut self, id: &str, embedding: &Embedding) -> Result<(), Self::Error>;
}
