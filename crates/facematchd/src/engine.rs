use facematch_core::{
    resolve, CandidateWarning, Embedder, EmbedderError, Embedding, EmbeddingError,
    IdentityProfile, IdentityRecord, MatchResult, ResolveError,
};
use facematch_store::{IdentityUpdate, SqliteStore, StoreError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Embedder(#[from] EmbedderError),
    #[error("invalid probe: {0}")]
    Probe(EmbeddingError),
    #[error("no embedder configured; set FACEMATCH_EMBEDDER_CMD")]
    NoEmbedder,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

impl From<ResolveError<StoreError>> for EngineError {
    fn from(err: ResolveError<StoreError>) -> Self {
        match err {
            ResolveError::Probe(e) => Self::Probe(e),
            ResolveError::Store(e) => Self::Store(e),
        }
    }
}

/// Result of a recognition request.
#[derive(Debug)]
pub struct Recognition {
    pub result: MatchResult,
    /// Records skipped because their stored embedding was unusable.
    pub warnings: Vec<CandidateWarning>,
    pub tolerance: f64,
}

/// Snapshot of engine state for status reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub identities: usize,
    pub embedding_dim: Option<usize>,
    pub embedder_configured: bool,
    pub tolerance: f64,
}

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Register {
        profile: IdentityProfile,
        image: Vec<u8>,
        reply: Reply<IdentityRecord>,
    },
    Recognize {
        image: Vec<u8>,
        tolerance: Option<f64>,
        reply: Reply<Recognition>,
    },
    Encode {
        image: Vec<u8>,
        reply: Reply<Embedding>,
    },
    Detect {
        image: Vec<u8>,
        reply: Reply<usize>,
    },
    Get {
        id: String,
        reply: Reply<Option<IdentityRecord>>,
    },
    List {
        reply: Reply<Vec<IdentityRecord>>,
    },
    Update {
        id: String,
        update: IdentityUpdate,
        reply: Reply<IdentityRecord>,
    },
    Delete {
        id: String,
        reply: Reply<()>,
    },
    Status {
        reply: Reply<EngineStatus>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Embed the single face in `image` and store it under a new identity.
    pub async fn register(
        &self,
        profile: IdentityProfile,
        image: Vec<u8>,
    ) -> Result<IdentityRecord, EngineError> {
        self.request(|reply| EngineRequest::Register { profile, image, reply })
            .await
    }

    /// Identify the face in `image`; `None` uses the configured tolerance.
    pub async fn recognize(
        &self,
        image: Vec<u8>,
        tolerance: Option<f64>,
    ) -> Result<Recognition, EngineError> {
        self.request(|reply| EngineRequest::Recognize { image, tolerance, reply })
            .await
    }

    pub async fn encode(&self, image: Vec<u8>) -> Result<Embedding, EngineError> {
        self.request(|reply| EngineRequest::Encode { image, reply }).await
    }

    /// Number of faces found in `image`.
    pub async fn detect(&self, image: Vec<u8>) -> Result<usize, EngineError> {
        self.request(|reply| EngineRequest::Detect { image, reply }).await
    }

    pub async fn get(&self, id: String) -> Result<Option<IdentityRecord>, EngineError> {
        self.request(|reply| EngineRequest::Get { id, reply }).await
    }

    pub async fn list(&self) -> Result<Vec<IdentityRecord>, EngineError> {
        self.request(|reply| EngineRequest::List { reply }).await
    }

    pub async fn update(
        &self,
        id: String,
        update: IdentityUpdate,
    ) -> Result<IdentityRecord, EngineError> {
        self.request(|reply| EngineRequest::Update { id, update, reply })
            .await
    }

    pub async fn delete(&self, id: String) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::Delete { id, reply }).await
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.request(|reply| EngineRequest::Status { reply }).await
    }
}

/// State owned by the engine thread.
struct Engine {
    store: SqliteStore,
    embedder: Option<Box<dyn Embedder>>,
    tolerance: f64,
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the store connection and the embedder; every request is
/// served in arrival order, so store reads and writes never interleave.
pub fn spawn_engine(
    store: SqliteStore,
    embedder: Option<Box<dyn Embedder>>,
    tolerance: f64,
) -> Result<EngineHandle, EngineError> {
    if embedder.is_none() {
        tracing::warn!("no embedder configured; image operations will be rejected");
    }

    let mut engine = Engine {
        store,
        embedder,
        tolerance,
    };
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("facematch-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                engine.handle(req);
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

impl Engine {
    fn handle(&mut self, req: EngineRequest) {
        match req {
            EngineRequest::Register {
                profile,
                image,
                reply,
            } => {
                let _ = reply.send(self.register(profile, &image));
            }
            EngineRequest::Recognize {
                image,
                tolerance,
                reply,
            } => {
                let _ = reply.send(self.recognize(&image, tolerance));
            }
            EngineRequest::Encode { image, reply } => {
                let _ = reply.send(
                    self.embedder()
                        .and_then(|e| e.embed(&image).map_err(EngineError::from)),
                );
            }
            EngineRequest::Detect { image, reply } => {
                let _ = reply.send(self.embedder().and_then(|e| {
                    e.detect(&image)
                        .map(|faces| faces.len())
                        .map_err(EngineError::from)
                }));
            }
            EngineRequest::Get { id, reply } => {
                let _ = reply.send(self.store.get_identity(&id).map_err(EngineError::from));
            }
            EngineRequest::List { reply } => {
                let _ = reply.send(self.store.list_identities().map_err(EngineError::from));
            }
            EngineRequest::Update { id, update, reply } => {
                let _ = reply.send(
                    self.store
                        .update_identity(&id, &update)
                        .map_err(EngineError::from),
                );
            }
            EngineRequest::Delete { id, reply } => {
                let _ = reply.send(self.store.delete_identity(&id).map_err(EngineError::from));
            }
            EngineRequest::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn embedder(&self) -> Result<&dyn Embedder, EngineError> {
        self.embedder.as_deref().ok_or(EngineError::NoEmbedder)
    }

    fn register(
        &mut self,
        profile: IdentityProfile,
        image: &[u8],
    ) -> Result<IdentityRecord, EngineError> {
        let embedding = self.embedder()?.embed(image)?;
        let record = self.store.create_identity(profile, &embedding)?;
        tracing::info!(id = %record.id, name = %record.profile.name, "identity registered");
        Ok(record)
    }

    fn recognize(&self, image: &[u8], tolerance: Option<f64>) -> Result<Recognition, EngineError> {
        let tolerance = tolerance.unwrap_or(self.tolerance);
        let probe = self.embedder()?.embed(image)?;
        let resolution = resolve(&self.store, &probe, tolerance)?;

        tracing::info!(
            matched = resolution.result.matched,
            confidence = resolution.result.confidence,
            id = resolution.result.identity.as_ref().map(|r| r.id.as_str()),
            skipped = resolution.warnings.len(),
            tolerance,
            "recognize complete"
        );

        Ok(Recognition {
            result: resolution.result,
            warnings: resolution.warnings,
            tolerance,
        })
    }

    fn status(&self) -> Result<EngineStatus, EngineError> {
        Ok(EngineStatus {
            identities: self.store.count()?,
            embedding_dim: self.store.embedding_dim(),
            embedder_configured: self.embedder.is_some(),
            tolerance: self.tolerance,
        })
    }
}
