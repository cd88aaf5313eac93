//! facematch-core — Face embedding matching engine.
//!
//! Encodes embeddings for storage, scores them by Euclidean distance, and
//! resolves a probe against a reference set. Embedding extraction and record
//! storage are external collaborators behind the [`Embedder`] and
//! [`ReferenceStore`] traits.

pub mod codec;
pub mod embedder;
pub mod resolver;
pub mod scorer;
pub mod store;
pub mod types;

pub use embedder::{Embedder, EmbedderError};
pub use resolver::{
    find_best_match, resolve, resolve_encoded, CandidateWarning, EuclideanMatcher, Matcher,
    Resolution, ResolveError,
};
pub use scorer::DEFAULT_TOLERANCE;
pub use store::ReferenceStore;
pub use types::{
    Comparison, Embedding, EmbeddingError, IdentityProfile, IdentityRecord, MatchResult,
};
