//! Drive-backed storage adapter: the public store/read/delete surface.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::client::{ByteStream, DeleteOutcome, DriveClient, UploadSource};
use crate::config::DriveConfig;
use crate::error::{Result, StowageError};
use crate::ledger::LedgerStore;
use crate::path::remote_path;
use crate::token::{ClaimSigner, RsaClaimSigner, TokenCache};
use crate::types::{ContentKey, RemoteFileRecord, StoredFile};

/// Counters from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Records the pass looked at.
    pub attempted: usize,
    /// Records removed from the ledger.
    pub cleared: usize,
    /// Cleared records whose remote answered with something other than 204.
    pub absorbed: usize,
    /// Records kept because the remote was unreachable.
    pub retained: usize,
    /// Records skipped because another backend owns them.
    pub skipped: usize,
}

/// Storage adapter for one remote drive backend.
///
/// Orchestrates path sharding, token-authorized HTTP calls, and the
/// deletion ledger behind a store/read/delete surface. One instance serves
/// arbitrarily many concurrent callers; the token cache is the only shared
/// mutable state.
pub struct DriveStorage<S, L> {
    client: DriveClient<S>,
    ledger: Arc<L>,
}

impl<L: LedgerStore> DriveStorage<RsaClaimSigner, L> {
    /// Build an adapter from configuration, loading the signing key from
    /// disk. Fails fast on an unreadable or invalid key.
    pub fn from_config(config: DriveConfig, ledger: Arc<L>) -> Result<Self> {
        let signer = RsaClaimSigner::from_key_file(&config.token.signing_key_path)?;
        let tokens = TokenCache::new(
            signer,
            config.backend.remote_username.clone(),
            config.token.ttl,
        );
        let client = DriveClient::new(config.backend, &config.http, tokens)?;
        Ok(Self::with_client(client, ledger))
    }
}

impl<S: ClaimSigner, L: LedgerStore> DriveStorage<S, L> {
    /// Build an adapter around an existing client, e.g. one with a custom
    /// signer.
    pub fn with_client(client: DriveClient<S>, ledger: Arc<L>) -> Self {
        Self { client, ledger }
    }

    pub fn backend_name(&self) -> &str {
        self.client.backend_name()
    }

    /// Store in-memory content for a file.
    ///
    /// `None` is the no-content marker: the adapter records bookkeeping
    /// for the file's existing content key, so a later delete has
    /// something to act on, but performs no upload and returns no content
    /// key.
    pub async fn store(
        &self,
        file: &StoredFile,
        content: Option<&[u8]>,
    ) -> Result<Option<ContentKey>> {
        match content {
            Some(content) => {
                let key = self
                    .upload_and_register(file, UploadSource::Bytes(content.to_vec()))
                    .await?;
                Ok(Some(key))
            }
            None => {
                self.ledger
                    .register(RemoteFileRecord::new(
                        self.backend_name(),
                        file.external_id.clone(),
                        file.content_key.clone(),
                    ))
                    .await?;
                tracing::debug!(
                    external_id = %file.external_id,
                    "Recorded no-content file without upload"
                );
                Ok(None)
            }
        }
    }

    /// Store streamed content for a file.
    pub async fn store_stream(
        &self,
        file: &StoredFile,
        stream: reqwest::Body,
    ) -> Result<ContentKey> {
        self.upload_and_register(file, UploadSource::Stream(stream))
            .await
    }

    /// Store content read from a local file.
    pub async fn store_file(&self, file: &StoredFile, local_path: &Path) -> Result<ContentKey> {
        self.upload_and_register(file, UploadSource::File(local_path.to_path_buf()))
            .await
    }

    async fn upload_and_register(
        &self,
        file: &StoredFile,
        source: UploadSource,
    ) -> Result<ContentKey> {
        let destination = remote_path(&file.external_id);
        let key = self
            .client
            .upload(&destination, source, &file.filename)
            .await?;

        // The content key is only recorded after a confirmed upload; a
        // failed upload leaves nothing referenced.
        self.ledger
            .register(RemoteFileRecord::new(
                self.backend_name(),
                file.external_id.clone(),
                Some(key.clone()),
            ))
            .await?;
        Ok(key)
    }

    /// Read a file's content fully into memory.
    pub async fn read(&self, file: &StoredFile) -> Result<Bytes> {
        let key = self.require_content_key(file)?;
        self.client.download(key).await
    }

    /// Read a file's content as a stream. The underlying connection is
    /// released when the stream is dropped.
    pub async fn read_stream(&self, file: &StoredFile) -> Result<ByteStream> {
        let key = self.require_content_key(file)?;
        self.client.download_stream(key).await
    }

    fn require_content_key<'a>(&self, file: &'a StoredFile) -> Result<&'a ContentKey> {
        file.content_key
            .as_ref()
            .ok_or_else(|| StowageError::NoContent(file.external_id.to_string()))
    }

    /// Record the intent to delete the file's remote content. Performs no
    /// HTTP; the reconcile pass purges the remote side later.
    pub async fn schedule_delete(&self, file: &StoredFile) -> Result<()> {
        let marked = self.ledger.mark_for_deletion(&file.external_id).await?;
        if !marked {
            // No bookkeeping yet: the host may have adopted this file
            // before the adapter saw it. Record it already marked.
            let mut record = RemoteFileRecord::new(
                self.backend_name(),
                file.external_id.clone(),
                file.content_key.clone(),
            );
            record.pending_delete = true;
            self.ledger.register(record).await?;
        }
        tracing::debug!(external_id = %file.external_id, "Scheduled remote deletion");
        Ok(())
    }

    /// Attempt previously deferred remote deletions for this backend.
    ///
    /// Idempotent and safe to re-run after partial completion: records are
    /// removed only once their remote blob has been dealt with, a remote
    /// failure on one record never aborts the pass, and a repeated pass
    /// over an empty ledger issues no calls.
    #[tracing::instrument(skip(self), fields(backend = %self.backend_name()))]
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let pending = self.ledger.pending_deletions(self.backend_name()).await?;
        let mut report = ReconcileReport::default();

        for record in pending {
            report.attempted += 1;

            // Re-check ownership: the record may have migrated to another
            // backend between enumeration and processing.
            if record.backend != self.backend_name() {
                tracing::warn!(
                    record_id = %record.id,
                    owner = %record.backend,
                    "Skipping pending deletion owned by another backend"
                );
                report.skipped += 1;
                continue;
            }

            let outcome = match &record.content_key {
                Some(key) => self.client.delete(key).await?,
                // Nothing was ever uploaded; there is no remote blob.
                None => DeleteOutcome::Confirmed,
            };

            match outcome {
                DeleteOutcome::Confirmed => {
                    self.ledger.remove(record.id).await?;
                    report.cleared += 1;
                }
                DeleteOutcome::Absorbed => {
                    self.ledger.remove(record.id).await?;
                    report.cleared += 1;
                    report.absorbed += 1;
                }
                DeleteOutcome::Unreachable => {
                    report.retained += 1;
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            cleared = report.cleared,
            absorbed = report.absorbed,
            retained = report.retained,
            skipped = report.skipped,
            "Reconciliation pass finished"
        );
        Ok(report)
    }
}
