use crate::engine::{EngineError, EngineHandle, Recognition};
use facematch_core::{EmbedderError, IdentityProfile};
use facematch_store::{IdentityUpdate, StoreError};
use std::collections::HashMap;
use zbus::interface;

pub const BUS_NAME: &str = "org.facematch.Identity1";
pub const OBJECT_PATH: &str = "/org/facematch/Identity1";

/// D-Bus interface for the facematch identity daemon.
///
/// Bus name: org.facematch.Identity1
/// Object path: /org/facematch/Identity1
pub struct IdentityService {
    engine: EngineHandle,
}

impl IdentityService {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

#[interface(name = "org.facematch.Identity1")]
impl IdentityService {
    /// Register a new identity from a single-face image.
    async fn register(
        &self,
        name: &str,
        email: &str,
        phone: &str,
        department: &str,
        notes: &str,
        image: Vec<u8>,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(name, email, bytes = image.len(), "register requested");
        let profile = IdentityProfile {
            name: name.to_string(),
            email: email.to_string(),
            phone: non_empty(phone),
            department: non_empty(department),
            notes: non_empty(notes),
        };
        let record = self.engine.register(profile, image).await.map_err(to_fdo)?;
        to_json(&record)
    }

    /// Identify the face in `image`. A tolerance `<= 0` uses the daemon default.
    async fn recognize(&self, image: Vec<u8>, tolerance: f64) -> zbus::fdo::Result<String> {
        tracing::info!(bytes = image.len(), tolerance, "recognize requested");
        let tolerance = (tolerance > 0.0).then_some(tolerance);
        let recognition = self
            .engine
            .recognize(image, tolerance)
            .await
            .map_err(to_fdo)?;
        recognition_json(&recognition)
            .map(|json| json.to_string())
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Return the embedding of the single face in `image`.
    async fn encode(&self, image: Vec<u8>) -> zbus::fdo::Result<Vec<f64>> {
        tracing::info!(bytes = image.len(), "encode requested");
        let embedding = self.engine.encode(image).await.map_err(to_fdo)?;
        Ok(embedding.values)
    }

    /// Count the faces in `image`.
    async fn detect(&self, image: Vec<u8>) -> zbus::fdo::Result<u32> {
        tracing::info!(bytes = image.len(), "detect requested");
        let count = self.engine.detect(image).await.map_err(to_fdo)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn get_identity(&self, id: &str) -> zbus::fdo::Result<String> {
        match self.engine.get(id.to_string()).await.map_err(to_fdo)? {
            Some(record) => to_json(&record),
            None => Err(zbus::fdo::Error::FileNotFound(format!(
                "identity not found: {id}"
            ))),
        }
    }

    async fn list_identities(&self) -> zbus::fdo::Result<String> {
        let records = self.engine.list().await.map_err(to_fdo)?;
        to_json(&records)
    }

    /// Update profile fields. Keys must be profile field names.
    async fn update_identity(
        &self,
        id: &str,
        fields: HashMap<String, String>,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(id, fields = ?fields.keys().collect::<Vec<_>>(), "update requested");
        let update = build_update(fields).map_err(|e| to_fdo(EngineError::Store(e)))?;
        let record = self
            .engine
            .update(id.to_string(), update)
            .await
            .map_err(to_fdo)?;
        to_json(&record)
    }

    async fn delete_identity(&self, id: &str) -> zbus::fdo::Result<()> {
        tracing::info!(id, "delete requested");
        self.engine.delete(id.to_string()).await.map_err(to_fdo)
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self.engine.status().await.map_err(to_fdo)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "identities": status.identities,
            "embedding_dim": status.embedding_dim,
            "embedder_configured": status.embedder_configured,
            "tolerance": status.tolerance,
        })
        .to_string())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn build_update(fields: HashMap<String, String>) -> Result<IdentityUpdate, StoreError> {
    let mut update = IdentityUpdate::default();
    for (field, value) in fields {
        update.set(&field, value)?;
    }
    Ok(update)
}

fn to_json<T: serde::Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}

fn recognition_json(recognition: &Recognition) -> serde_json::Result<serde_json::Value> {
    let result = &recognition.result;
    let identity = result
        .identity
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;
    Ok(serde_json::json!({
        "matched": result.matched,
        "confidence": result.confidence,
        "distance": result.distance,
        "identity": identity,
        "tolerance": recognition.tolerance,
        "warnings": recognition
            .warnings
            .iter()
            .map(|w| serde_json::json!({ "id": w.id, "error": w.error.to_string() }))
            .collect::<Vec<_>>(),
    }))
}

/// Map engine failures onto D-Bus error names.
fn to_fdo(err: EngineError) -> zbus::fdo::Error {
    let msg = err.to_string();
    match err {
        EngineError::Embedder(EmbedderError::Failed(_)) => zbus::fdo::Error::Failed(msg),
        EngineError::Embedder(_) | EngineError::Probe(_) => zbus::fdo::Error::InvalidArgs(msg),
        EngineError::Store(StoreError::NotFound(_)) => zbus::fdo::Error::FileNotFound(msg),
        EngineError::Store(
            StoreError::EmailTaken(_)
            | StoreError::InvalidField { .. }
            | StoreError::UnknownField(_)
            | StoreError::InvalidEmbedding(_)
            | StoreError::Embedding(_),
        ) => zbus::fdo::Error::InvalidArgs(msg),
        EngineError::NoEmbedder => zbus::fdo::Error::NotSupported(msg),
        _ => {
            tracing::error!(error = %msg, "request failed");
            zbus::fdo::Error::Failed(msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facematch_core::{CandidateWarning, EmbeddingError, IdentityRecord, MatchResult};

    #[test]
    fn test_build_update_known_fields() {
        let fields = HashMap::from([
            ("name".to_string(), "Ada".to_string()),
            ("phone".to_string(), "555-0100".to_string()),
        ]);
        let update = build_update(fields).unwrap();
        assert_eq!(update.name.as_deref(), Some("Ada"));
        assert_eq!(update.phone.as_deref(), Some("555-0100"));
        assert!(update.email.is_none());
    }

    #[test]
    fn test_build_update_rejects_unknown_field() {
        let fields = HashMap::from([("face_encoding".to_string(), "x".to_string())]);
        assert!(matches!(build_update(fields), Err(StoreError::UnknownField(_))));
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            to_fdo(EngineError::Embedder(EmbedderError::NoFaceDetected)),
            zbus::fdo::Error::InvalidArgs(_)
        ));
        assert!(matches!(
            to_fdo(EngineError::Store(StoreError::NotFound("x".into()))),
            zbus::fdo::Error::FileNotFound(_)
        ));
        assert!(matches!(
            to_fdo(EngineError::Store(StoreError::EmailTaken("a@b.c".into()))),
            zbus::fdo::Error::InvalidArgs(_)
        ));
        assert!(matches!(
            to_fdo(EngineError::NoEmbedder),
            zbus::fdo::Error::NotSupported(_)
        ));
        assert!(matches!(
            to_fdo(EngineError::ChannelClosed),
            zbus::fdo::Error::Failed(_)
        ));
    }

    #[test]
    fn test_recognition_json_no_match() {
        let json = recognition_json(&Recognition {
            result: MatchResult::no_match(),
            warnings: vec![CandidateWarning {
                id: "bad".into(),
                error: EmbeddingError::CorruptEncoding("short".into()),
            }],
            tolerance: 0.6,
        })
        .unwrap();
        assert_eq!(json["matched"], false);
        assert_eq!(json["confidence"], 0.0);
        assert!(json["identity"].is_null());
        assert_eq!(json["warnings"][0]["id"], "bad");
    }

    #[test]
    fn test_recognition_json_carries_identity() {
        let json = recognition_json(&Recognition {
            result: MatchResult {
                matched: true,
                confidence: 0.9,
                distance: Some(0.1),
                identity: Some(IdentityRecord {
                    id: "id-1".into(),
                    profile: IdentityProfile {
                        name: "Ada".into(),
                        email: "ada@example.com".into(),
                        ..Default::default()
                    },
                    embedding: vec![0; 8],
                    created_at: "2024-01-01T00:00:00Z".into(),
                    updated_at: None,
                }),
            },
            warnings: Vec::new(),
            tolerance: 0.6,
        })
        .unwrap();
        assert_eq!(json["matched"], true);
        assert_eq!(json["identity"]["id"], "id-1");
        assert_eq!(json["identity"]["name"], "Ada");
        assert!(json["identity"].get("embedding").is_none());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(" x "), Some("x".into()));
    }
}
