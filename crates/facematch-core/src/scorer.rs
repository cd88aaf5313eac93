//! Euclidean similarity scoring.

use crate::types::{Comparison, Embedding, EmbeddingError};

/// Maximum distance at which two embeddings are the same identity.
pub const DEFAULT_TOLERANCE: f64 = 0.6;

/// Euclidean (L2) distance between two equal-length embeddings.
pub fn distance(a: &Embedding, b: &Embedding) -> Result<f64, EmbeddingError> {
    if a.dim() != b.dim() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.dim(),
            actual: b.dim(),
        });
    }

    Ok(a.values
        .iter()
        .zip(b.values.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt())
}

/// `max(0, 1 - distance)`. An ordering aid, not a calibrated probability.
pub fn confidence(distance: f64) -> f64 {
    (1.0 - distance).max(0.0)
}

/// Inclusive tolerance check.
pub fn is_match(distance: f64, tolerance: f64) -> bool {
    distance <= tolerance
}

/// Compare exactly two embeddings.
pub fn compare(a: &Embedding, b: &Embedding, tolerance: f64) -> Result<Comparison, EmbeddingError> {
    let d = distance(a, b)?;
    Ok(Comparison {
        matched: is_match(d, tolerance),
        distance: d,
        confidence: confidence(d),
    })
}
