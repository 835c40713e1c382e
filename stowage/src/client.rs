//! HTTP client for the remote drive API.
//!
//! Three wire operations: multipart upload into a remote directory,
//! download with a single unauthenticated redirect hop, and delete with
//! fire-and-forget semantics. All three carry a bearer token fetched from
//! the cache per call, so a request begun just after expiry always carries
//! a fresh token.

use std::path::PathBuf;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use reqwest::{Body, StatusCode};
use tokio_util::io::ReaderStream;

use crate::config::{BackendConfig, HttpConfig};
use crate::error::{Result, StowageError};
use crate::token::{ClaimSigner, TokenCache};
use crate::types::ContentKey;

/// Streaming download body. Dropping the stream drops the underlying
/// response and releases its connection, even if the consumer abandons it
/// early.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Content handed to an upload. Each variant is consumed exactly once;
/// content is never re-read.
pub enum UploadSource {
    /// Fully materialized content.
    Bytes(Vec<u8>),
    /// An arbitrary byte stream.
    Stream(Body),
    /// Content read from a local file.
    File(PathBuf),
}

impl From<Vec<u8>> for UploadSource {
    fn from(bytes: Vec<u8>) -> Self {
        UploadSource::Bytes(bytes)
    }
}

impl From<&[u8]> for UploadSource {
    fn from(bytes: &[u8]) -> Self {
        UploadSource::Bytes(bytes.to_vec())
    }
}

/// Outcome of a remote delete attempt.
///
/// Deletion is fire-and-forget: callers never see an error. `Absorbed`
/// means the remote answered with something other than 204; the failure is
/// logged and treated as handled. `Unreachable` means the request never
/// got an answer; the ledger entry is kept so a later pass retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The remote confirmed the delete with 204.
    Confirmed,
    /// The remote answered with a non-204 status; logged and absorbed.
    Absorbed,
    /// Transport-level failure; nothing remote was observed.
    Unreachable,
}

impl DeleteOutcome {
    /// Whether the remote side answered at all (confirmed or absorbed).
    pub fn is_handled(&self) -> bool {
        !matches!(self, DeleteOutcome::Unreachable)
    }
}

/// Client for one remote drive backend.
pub struct DriveClient<S> {
    http: reqwest::Client,
    backend: BackendConfig,
    tokens: TokenCache<S>,
}

impl<S: ClaimSigner> DriveClient<S> {
    /// Build the client. Redirects are never followed automatically:
    /// redirect targets carry their own access grant and must not receive
    /// our credentials.
    pub fn new(backend: BackendConfig, http: &HttpConfig, tokens: TokenCache<S>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(Policy::none())
            .connect_timeout(http.connect_timeout)
            .read_timeout(http.read_timeout)
            .pool_max_idle_per_host(http.pool_max_idle_per_host)
            .build()
            .map_err(|e| StowageError::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            backend,
            tokens,
        })
    }

    pub fn backend_name(&self) -> &str {
        &self.backend.name
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{path}",
            self.backend.base_url.as_str().trim_end_matches('/')
        )
    }

    /// Upload content into the backend's remote directory under
    /// `destination`. Returns the content key the remote issued for the
    /// blob.
    #[tracing::instrument(skip(self, source), fields(backend = %self.backend.name, destination = %destination))]
    pub async fn upload(
        &self,
        destination: &str,
        source: UploadSource,
        filename: &str,
    ) -> Result<ContentKey> {
        let part = match source {
            UploadSource::Bytes(bytes) => Part::bytes(bytes),
            UploadSource::Stream(body) => Part::stream(body),
            UploadSource::File(path) => {
                let file = tokio::fs::File::open(&path).await?;
                Part::stream(Body::wrap_stream(ReaderStream::new(file)))
            }
        }
        .file_name(filename.to_string());

        let form = Form::new()
            .text("path", destination.to_string())
            .part("file", part);

        let token = self.tokens.token()?;
        let response = self
            .http
            .post(self.url(&format!(
                "/api/drive/directory/{}",
                self.backend.remote_directory_id
            )))
            .bearer_auth(&token)
            .header("X-Requested-With", "XMLHttpRequest")
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let content_key = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("id")
                    .and_then(serde_json::Value::as_str)
                    .map(ContentKey::from)
            });

        match content_key {
            Some(key) => {
                tracing::info!(status = %status, content_key = %key, "Uploaded file to drive");
                Ok(key)
            }
            None => {
                tracing::error!(status = %status, body = %body, "Drive upload response carried no id");
                Err(StowageError::Protocol { body })
            }
        }
    }

    /// Download a blob fully into memory.
    #[tracing::instrument(skip(self), fields(backend = %self.backend.name, content_key = %content_key))]
    pub async fn download(&self, content_key: &ContentKey) -> Result<Bytes> {
        let response = self.resolve_download(content_key).await?;
        Ok(response.bytes().await?)
    }

    /// Download a blob as a stream of chunks. The connection stays open
    /// for the lifetime of the returned stream and is released when it is
    /// dropped.
    #[tracing::instrument(skip(self), fields(backend = %self.backend.name, content_key = %content_key))]
    pub async fn download_stream(&self, content_key: &ContentKey) -> Result<ByteStream> {
        let response = self.resolve_download(content_key).await?;
        Ok(Box::pin(
            response.bytes_stream().map(|chunk| chunk.map_err(StowageError::from)),
        ))
    }

    /// Issue the download request, following at most one 307 hop. The
    /// redirect target is assumed to carry its own access grant (e.g. a
    /// pre-signed URL) and is fetched without the Authorization header.
    async fn resolve_download(&self, content_key: &ContentKey) -> Result<reqwest::Response> {
        let token = self.tokens.token()?;
        let response = self
            .http
            .get(self.url(&format!("/api/drive/file/{content_key}/download")))
            .bearer_auth(&token)
            .send()
            .await?;

        let response = if response.status() == StatusCode::TEMPORARY_REDIRECT {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| StowageError::Protocol {
                    body: "redirect without Location header".to_string(),
                })?;
            tracing::debug!(location = %location, "Following drive download redirect");
            self.http.get(location).send().await?
        } else {
            response
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "Drive download failed");
            return Err(StowageError::Protocol { body });
        }
        Ok(response)
    }

    /// Delete a remote blob. Any answer other than 204 is logged and
    /// absorbed rather than surfaced: a hard failure here would orphan the
    /// pending-deletion record, and a later reconciliation pass retries
    /// anyway.
    #[tracing::instrument(skip(self), fields(backend = %self.backend.name, content_key = %content_key))]
    pub async fn delete(&self, content_key: &ContentKey) -> Result<DeleteOutcome> {
        let token = self.tokens.token()?;
        let response = match self
            .http
            .delete(self.url(&format!("/api/drive/file/{content_key}")))
            .bearer_auth(&token)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Drive delete request failed; will retry on a later pass");
                return Ok(DeleteOutcome::Unreachable);
            }
        };

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(DeleteOutcome::Confirmed);
        }

        let status = response.status();
        tracing::warn!(status = %status, "Failed to delete drive file");
        if tracing::enabled!(tracing::Level::DEBUG) {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(body = %body, "Drive delete failure response");
        }
        Ok(DeleteOutcome::Absorbed)
    }
}
