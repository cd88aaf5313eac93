//! Embedder boundary: image bytes in, one embedding per detected face out.

use crate::types::Embedding;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbedderError {
    #[error("no face detected in the image")]
    NoFaceDetected,
    #[error("multiple faces detected ({0}); submit an image with exactly one face")]
    MultipleFacesDetected(usize),
    #[error("embedder failed: {0}")]
    Failed(String),
}

/// Converts an image into face embeddings.
pub trait Embedder: Send {
    /// One embedding per face found in `image`, possibly none.
    fn detect(&self, image: &[u8]) -> Result<Vec<Embedding>, EmbedderError>;

    /// The embedding of the single face in `image`.
    fn embed(&self, image: &[u8]) -> Result<Embedding, EmbedderError> {
        let mut faces = self.detect(image)?;
        match faces.len() {
            0 => Err(EmbedderError::NoFaceDetected),
            1 => Ok(faces.remove(0)),
            n => Err(EmbedderError::MultipleFacesDetected(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns `faces` copies of a fixed embedding regardless of input.
    struct FixedFaces(usize);

    impl Embedder for FixedFaces {
        fn detect(&self, _image: &[u8]) -> Result<Vec<Embedding>, EmbedderError> {
            Ok(vec![Embedding::new(vec![0.5, 0.5]); self.0])
        }
    }

    #[test]
    fn test_embed_single_face() {
        let e = FixedFaces(1).embed(b"img").unwrap();
        assert_eq!(e.values, vec![0.5, 0.5]);
    }

    #[test]
    fn test_embed_no_face() {
        assert_eq!(FixedFaces(0).embed(b"img"), Err(EmbedderError::NoFaceDetected));
    }

    #[test]
    fn test_embed_multiple_faces() {
        assert_eq!(
            FixedFaces(3).embed(b"img"),
            Err(EmbedderError::MultipleFacesDetected(3))
        );
    }
}
