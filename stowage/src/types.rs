//! Identifier and record types for the drive adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, globally unique identifier assigned by the owning domain to a
/// logical file. Immutable for the lifetime of the file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub String);

impl From<String> for ExternalId {
    fn from(id: String) -> Self {
        ExternalId(id)
    }
}

impl From<&str> for ExternalId {
    fn from(id: &str) -> Self {
        ExternalId(id.to_string())
    }
}

impl std::ops::Deref for ExternalId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier issued by the remote drive service, locating one blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKey(pub String);

impl From<String> for ContentKey {
    fn from(key: String) -> Self {
        ContentKey(key)
    }
}

impl From<&str> for ContentKey {
    fn from(key: &str) -> Self {
        ContentKey(key.to_string())
    }
}

impl std::ops::Deref for ContentKey {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        RecordId(uuid)
    }
}

impl std::ops::Deref for RecordId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Descriptor of one logical file known to the host application.
///
/// The record itself is owned by the host's domain layer; the adapter only
/// reads it. `content_key` is absent until content has been uploaded (or
/// when the host never wrote content). `filename` is only used to name the
/// outgoing multipart file field.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub external_id: ExternalId,
    pub content_key: Option<ContentKey>,
    pub filename: String,
}

impl StoredFile {
    pub fn new(external_id: impl Into<ExternalId>, filename: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            content_key: None,
            filename: filename.into(),
        }
    }

    pub fn with_content_key(mut self, content_key: impl Into<ContentKey>) -> Self {
        self.content_key = Some(content_key.into());
        self
    }
}

/// Bookkeeping fact that a blob exists (or existed) remotely for a file
/// under a given backend.
///
/// Created when the adapter stores content. `pending_delete` is flipped in
/// the same ledger-store operation that deletes the logical file, and the
/// record is removed only once a reconciliation pass has dealt with the
/// remote side.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFileRecord {
    pub id: RecordId,
    /// Name of the backend that owns the remote blob.
    pub backend: String,
    pub external_id: ExternalId,
    /// Absent when the file never had remote content (no-content marker).
    pub content_key: Option<ContentKey>,
    pub pending_delete: bool,
    pub recorded_at: DateTime<Utc>,
}

impl RemoteFileRecord {
    pub fn new(
        backend: impl Into<String>,
        external_id: ExternalId,
        content_key: Option<ContentKey>,
    ) -> Self {
        Self {
            id: RecordId::from(Uuid::new_v4()),
            backend: backend.into(),
            external_id,
            content_key,
            pending_delete: false,
            recorded_at: Utc::now(),
        }
    }
}
