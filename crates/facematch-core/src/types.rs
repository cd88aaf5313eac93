use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while decoding or comparing embeddings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("corrupt embedding encoding: {0}")]
    CorruptEncoding(String),
}

/// Face embedding vector (128-dimensional for dlib-style embedders).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f64>,
}

impl Embedding {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

impl From<Vec<f64>> for Embedding {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}

/// Display metadata attached to an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
}

/// A stored identity with its encoded embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: String,
    #[serde(flatten)]
    pub profile: IdentityProfile,
    /// Little-endian f64 blob, see [`crate::codec`]. Never serialized.
    #[serde(skip)]
    pub embedding: Vec<u8>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// Result of matching a probe embedding against a reference set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    /// `max(0, 1 - distance)` of the best match, 0 when nothing matched.
    pub confidence: f64,
    /// Distance of the best match (if any).
    pub distance: Option<f64>,
    /// The matched identity (if any).
    pub identity: Option<IdentityRecord>,
}

impl MatchResult {
    /// The canonical "nothing matched" result.
    pub fn no_match() -> Self {
        Self {
            matched: false,
            confidence: 0.0,
            distance: None,
            identity: None,
        }
    }
}

/// Outcome of comparing exactly two embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Comparison {
    pub matched: bool,
    pub distance: f64,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization_omits_embedding() {
        let record = IdentityRecord {
            id: "id-1".into(),
            profile: IdentityProfile {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                ..Default::default()
            },
            embedding: vec![1, 2, 3, 4, 5, 6, 7, 8],
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "Ada");
        assert_eq!(json["email"], "ada@example.com");
        assert!(json.get("embedding").is_none());
    }

    #[test]
    fn test_no_match_is_zeroed() {
        let r = MatchResult::no_match();
        assert!(!r.matched);
        assert_eq!(r.confidence, 0.0);
        assert!(r.identity.is_none());
        assert!(r.distance.is_none());
    }

    #[test]
    fn test_embedding_finite_check() {
        assert!(Embedding::new(vec![0.1, -0.2]).is_finite());
        assert!(!Embedding::new(vec![0.1, f64::NAN]).is_finite());
        assert!(!Embedding::new(vec![f64::INFINITY]).is_finite());
    }
}
