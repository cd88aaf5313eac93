//! facematch-store — SQLite reference store for identity records.
//!
//! Owns every identity record and its encoded embedding. Implements
//! [`facematch_core::ReferenceStore`] so the matching engine can enumerate
//! records without knowing how they are kept.

pub mod sqlite;
pub mod update;

pub use sqlite::{SqliteStore, StoreError};
pub use update::{IdentityUpdate, PROFILE_FIELDS};
