//! Embedding codec — flat little-endian f64 buffers.
//!
//! This is the only persisted format owned by the core: `8 × dim` bytes,
//! no header, no compression. Decoding reconstructs the exact bit patterns.

use crate::types::{Embedding, EmbeddingError};

const F64_WIDTH: usize = std::mem::size_of::<f64>();

/// Serialize an embedding into a flat byte buffer.
pub fn encode(embedding: &Embedding) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.dim() * F64_WIDTH);
    for value in &embedding.values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Deserialize a buffer produced by [`encode`].
///
/// When `expected_dim` is known, the buffer must hold exactly that many values.
/// Non-finite values are rejected since no valid embedding contains them.
pub fn decode(bytes: &[u8], expected_dim: Option<usize>) -> Result<Embedding, EmbeddingError> {
    if bytes.len() % F64_WIDTH != 0 {
        return Err(EmbeddingError::CorruptEncoding(format!(
            "byte length {} is not a multiple of {F64_WIDTH}",
            bytes.len()
        )));
    }

    let dim = bytes.len() / F64_WIDTH;
    if let Some(expected) = expected_dim {
        if dim != expected {
            return Err(EmbeddingError::CorruptEncoding(format!(
                "expected {expected} values ({} bytes), got {dim}",
                expected * F64_WIDTH
            )));
        }
    }

    let mut values = Vec::with_capacity(dim);
    for chunk in bytes.chunks_exact(F64_WIDTH) {
        let mut raw = [0u8; F64_WIDTH];
        raw.copy_from_slice(chunk);
        let value = f64::from_le_bytes(raw);
        if !value.is_finite() {
            return Err(EmbeddingError::CorruptEncoding(format!(
                "non-finite value at index {}",
                values.len()
            )));
        }
        values.push(value);
    }

    Ok(Embedding { values })
}
