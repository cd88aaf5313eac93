//! SQLite-backed reference store.

use crate::update::{normalize_profile, validate_embedding, IdentityUpdate, PROFILE_FIELDS};
use chrono::{SecondsFormat, Utc};
use facematch_core::{
    codec, Embedding, EmbeddingError, IdentityProfile, IdentityRecord, ReferenceStore,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS identities (
    seq           INTEGER PRIMARY KEY AUTOINCREMENT,
    id            TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE COLLATE NOCASE,
    phone         TEXT,
    department    TEXT,
    notes         TEXT,
    embedding     BLOB NOT NULL,
    embedding_dim INTEGER NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT
);
";

const SELECT_COLUMNS: &str =
    "SELECT id, name, email, phone, department, notes, embedding, created_at, updated_at
     FROM identities";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("identity not found: {0}")]
    NotFound(String),
    #[error("an identity with email {0} already exists")]
    EmailTaken(String),
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error(
        "unknown profile field: {0} (expected one of {fields})",
        fields = PROFILE_FIELDS.join(", ")
    )]
    UnknownField(String),
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),
    #[error("embedding: {0}")]
    Embedding(#[from] EmbeddingError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable store of identity records and their encoded embeddings.
pub struct SqliteStore {
    conn: Connection,
    /// Required embedding length, when enforced.
    embedding_dim: Option<usize>,
}

impl SqliteStore {
    /// Open or create the store at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>, embedding_dim: Option<usize>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "opened identity store");
        Self::init(conn, embedding_dim)
    }

    /// A private in-memory store, discarded on drop.
    pub fn open_in_memory(embedding_dim: Option<usize>) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, embedding_dim)
    }

    fn init(conn: Connection, embedding_dim: Option<usize>) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn, embedding_dim })
    }

    pub fn embedding_dim(&self) -> Option<usize> {
        self.embedding_dim
    }

    /// Insert a new identity together with its embedding.
    pub fn create_identity(
        &mut self,
        profile: IdentityProfile,
        embedding: &Embedding,
    ) -> Result<IdentityRecord> {
        let profile = normalize_profile(profile)?;
        validate_embedding(embedding, self.embedding_dim)?;

        let record = IdentityRecord {
            id: uuid::Uuid::new_v4().to_string(),
            profile,
            embedding: codec::encode(embedding),
            created_at: now_rfc3339(),
            updated_at: None,
        };

        let tx = self.conn.transaction()?;
        if email_owner(&tx, &record.profile.email)?.is_some() {
            return Err(StoreError::EmailTaken(record.profile.email));
        }
        tx.execute(
            "INSERT INTO identities (
                id, name, email, phone, department, notes,
                embedding, embedding_dim, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL)",
            params![
                record.id,
                record.profile.name,
                record.profile.email,
                record.profile.phone,
                record.profile.department,
                record.profile.notes,
                record.embedding,
                embedding.dim() as i64,
                record.created_at,
            ],
        )?;
        tx.commit()?;

        tracing::info!(id = %record.id, dim = embedding.dim(), "identity created");
        Ok(record)
    }

    pub fn get_identity(&self, id: &str) -> Result<Option<IdentityRecord>> {
        self.conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                decode_row,
            )
            .optional()
            .map_err(StoreError::from)
    }

    /// Case-insensitive lookup by email.
    pub fn get_identity_by_email(&self, email: &str) -> Result<Option<IdentityRecord>> {
        self.conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE email = ?1"),
                params![email.trim()],
                decode_row,
            )
            .optional()
            .map_err(StoreError::from)
    }

    /// All identities in creation order.
    pub fn list_identities(&self) -> Result<Vec<IdentityRecord>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{SELECT_COLUMNS} ORDER BY seq"))?;
        let records = stmt
            .query_map([], decode_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Apply a partial profile update. The whole update is validated before
    /// anything is written.
    pub fn update_identity(&mut self, id: &str, update: &IdentityUpdate) -> Result<IdentityRecord> {
        let current = self
            .get_identity(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if update.is_empty() {
            return Ok(current);
        }

        let profile = normalize_profile(update.apply(&current.profile))?;
        let updated_at = now_rfc3339();

        let tx = self.conn.transaction()?;
        if let Some(owner) = email_owner(&tx, &profile.email)? {
            if owner != id {
                return Err(StoreError::EmailTaken(profile.email));
            }
        }
        tx.execute(
            "UPDATE identities
             SET name = ?2, email = ?3, phone = ?4, department = ?5, notes = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                id,
                profile.name,
                profile.email,
                profile.phone,
                profile.department,
                profile.notes,
                updated_at,
            ],
        )?;
        tx.commit()?;

        tracing::info!(id, "identity updated");
        Ok(IdentityRecord {
            profile,
            updated_at: Some(updated_at),
            ..current
        })
    }

    pub fn delete_identity(&mut self, id: &str) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM identities WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        tracing::info!(id, "identity deleted");
        Ok(())
    }
}

impl ReferenceStore for SqliteStore {
    type Error = StoreError;

    fn list_all(&self) -> Result<Vec<IdentityRecord>> {
        self.list_identities()
    }

    fn persist_embedding(&mut self, id: &str, embedding: &Embedding) -> Result<()> {
        validate_embedding(embedding, self.embedding_dim)?;
        let updated = self.conn.execute(
            "UPDATE identities SET embedding = ?2, embedding_dim = ?3, updated_at = ?4
             WHERE id = ?1",
            params![
                id,
                codec::encode(embedding),
                embedding.dim() as i64,
                now_rfc3339()
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        tracing::info!(id, dim = embedding.dim(), "embedding persisted");
        Ok(())
    }
}

fn email_owner(conn: &Connection, email: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM identities WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )
    .optional()
    .map_err(StoreError::from)
}

fn decode_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IdentityRecord> {
    Ok(IdentityRecord {
        id: row.get(0)?,
        profile: IdentityProfile {
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            department: row.get(4)?,
            notes: row.get(5)?,
        },
        embedding: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
