//! Best-match resolution of a probe embedding against a reference set.
//!
//! A linear O(n·d) scan. Candidates whose stored embedding cannot be decoded
//! or compared are skipped and reported as warnings; only probe and store
//! failures abort a resolution.

use crate::codec;
use crate::scorer;
use crate::store::ReferenceStore;
use crate::types::{Embedding, EmbeddingError, IdentityRecord, MatchResult};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError<E> {
    #[error("invalid probe embedding: {0}")]
    Probe(EmbeddingError),
    #[error("reference store: {0}")]
    Store(#[source] E),
}

/// A candidate excluded from the scan because its embedding was unusable.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateWarning {
    pub id: String,
    pub error: EmbeddingError,
}

/// The match result plus every candidate skipped along the way.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub result: MatchResult,
    pub warnings: Vec<CandidateWarning>,
}

/// Strategy for comparing a probe embedding against a set of candidates.
pub trait Matcher {
    fn compare(
        &self,
        probe: &Embedding,
        candidates: &[IdentityRecord],
        tolerance: f64,
    ) -> Resolution;
}

/// Euclidean-distance matcher.
///
/// A candidate is eligible when its distance is within `tolerance`. Among
/// eligible candidates the highest confidence wins; on an exact tie the
/// candidate seen first in scan order is kept.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(
        &self,
        probe: &Embedding,
        candidates: &[IdentityRecord],
        tolerance: f64,
    ) -> Resolution {
        // (index, distance, confidence)
        let mut best: Option<(usize, f64, f64)> = None;
        let mut warnings = Vec::new();

        for (i, candidate) in candidates.iter().enumerate() {
            let scored = codec::decode(&candidate.embedding, None)
                .and_then(|stored| scorer::distance(probe, &stored));

            let distance = match scored {
                Ok(d) => d,
                Err(error) => {
                    tracing::warn!(id = %candidate.id, error = %error, "skipping candidate");
                    warnings.push(CandidateWarning {
                        id: candidate.id.clone(),
                        error,
                    });
                    continue;
                }
            };

            if !scorer::is_match(distance, tolerance) {
                continue;
            }

            let confidence = scorer::confidence(distance);
            let is_better = match best {
                None => true,
                Some((_, _, best_confidence)) => confidence > best_confidence,
            };
            if is_better {
                best = Some((i, distance, confidence));
            }
        }

        let result = match best {
            Some((idx, distance, confidence)) => MatchResult {
                matched: true,
                confidence,
                distance: Some(distance),
                identity: Some(candidates[idx].clone()),
            },
            None => MatchResult::no_match(),
        };

        tracing::debug!(
            candidates = candidates.len(),
            skipped = warnings.len(),
            matched = result.matched,
            confidence = result.confidence,
            "resolution complete"
        );

        Resolution { result, warnings }
    }
}

/// Find the best match for `probe` among `candidates`.
pub fn find_best_match(
    probe: &Embedding,
    candidates: &[IdentityRecord],
    tolerance: f64,
) -> Resolution {
    EuclideanMatcher.compare(probe, candidates, tolerance)
}

/// Read every record from `store` and resolve `probe` against them.
///
/// Store errors propagate as-is inside [`ResolveError::Store`].
pub fn resolve<S>(
    store: &S,
    probe: &Embedding,
    tolerance: f64,
) -> Result<Resolution, ResolveError<S::Error>>
where
    S: ReferenceStore + ?Sized,
{
    validate_probe(probe).map_err(ResolveError::Probe)?;
    let candidates = store.list_all().map_err(ResolveError::Store)?;
    Ok(find_best_match(probe, &candidates, tolerance))
}

/// Like [`resolve`], for a probe still in its stored encoding.
pub fn resolve_encoded<S>(
    store: &S,
    probe: &[u8],
    tolerance: f64,
) -> Result<Resolution, ResolveError<S::Error>>
where
    S: ReferenceStore + ?Sized,
{
    let probe = codec::decode(probe, None).map_err(ResolveError::Probe)?;
    resolve(store, &probe, tolerance)
}

fn validate_probe(probe: &Embedding) -> Result<(), EmbeddingError> {
    if probe.is_empty() {
        return Err(EmbeddingError::CorruptEncoding("probe embedding is empty".into()));
    }
    if !probe.is_finite() {
        return Err(EmbeddingError::CorruptEncoding(
            "probe embedding contains non-finite values".into(),
        ));
    }
    Ok(())
}
