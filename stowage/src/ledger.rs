//! Bookkeeping of remote blobs and deferred deletions.
//!
//! The adapter never deletes remotely inline. A delete is recorded as a
//! durable fact, in the same ledger-store operation that removes the
//! logical file, and an externally triggered reconciliation pass purges
//! the remote side later. A crash mid-pass leaves the remaining records
//! for the next pass.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::types::{ExternalId, RecordId, RemoteFileRecord};

/// Persistence contract for remote-file bookkeeping.
///
/// Implementations own durability and atomicity: `mark_for_deletion` must
/// pair the host's logical file deletion with the pending-deletion mark as
/// one unit, and `pending_deletions` must enumerate durably recorded marks
/// filterable by owning backend.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Record that a blob exists remotely for a file. Re-registering a
    /// file replaces its previous record.
    async fn register(&self, record: RemoteFileRecord) -> Result<()>;

    /// Look up the record for a file, if any.
    async fn get(&self, external_id: &ExternalId) -> Result<Option<RemoteFileRecord>>;

    /// Mark the file's remote content for deletion. Returns `false` when
    /// no record exists for the file.
    async fn mark_for_deletion(&self, external_id: &ExternalId) -> Result<bool>;

    /// All records marked for deletion under the given backend.
    async fn pending_deletions(&self, backend: &str) -> Result<Vec<RemoteFileRecord>>;

    /// Drop a record once its remote blob has been dealt with.
    async fn remove(&self, id: RecordId) -> Result<()>;
}

/// In-memory ledger suitable for tests and single-process hosts.
///
/// Records are lost on restart; hosts that need the deferred deletions to
/// survive a crash supply their own durable implementation.
#[derive(Default)]
pub struct InMemoryLedger {
    records: RwLock<HashMap<ExternalId, RemoteFileRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, marked or not.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn register(&self, record: RemoteFileRecord) -> Result<()> {
        self.records
            .write()
            .insert(record.external_id.clone(), record);
        Ok(())
    }

    async fn get(&self, external_id: &ExternalId) -> Result<Option<RemoteFileRecord>> {
        Ok(self.records.read().get(external_id).cloned())
    }

    async fn mark_for_deletion(&self, external_id: &ExternalId) -> Result<bool> {
        let mut records = self.records.write();
        match records.get_mut(external_id) {
            Some(record) => {
                record.pending_delete = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pending_deletions(&self, backend: &str) -> Result<Vec<RemoteFileRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|record| record.pending_delete && record.backend == backend)
            .cloned()
            .collect())
    }

    async fn remove(&self, id: RecordId) -> Result<()> {
        self.records.write().retain(|_, record| record.id != id);
        Ok(())
    }
}
