//! Remote drive storage adapter.
//!
//! This crate stores, retrieves, and deletes file content by delegating to
//! a remote HTTP drive service, while presenting a stable local identity
//! (a content key) for each stored file. It provides:
//! - Sharded remote paths derived from opaque identifiers, bounding
//!   directory fan-out on the remote side
//! - A cached, RS256-signed access credential with single-flight refresh
//! - Multipart upload (from bytes, a stream, or a local file), download
//!   with a single unauthenticated redirect hop, and fire-and-forget
//!   deletion
//! - A deferred-deletion ledger reconciled by an externally triggered,
//!   idempotent pass
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use stowage::{DriveConfig, DriveStorage, InMemoryLedger, StoredFile};
//!
//! let config: DriveConfig = serde_json::from_str(config_json)?;
//! let ledger = Arc::new(InMemoryLedger::new());
//! let storage = DriveStorage::from_config(config, ledger)?;
//!
//! let file = StoredFile::new("281474976710661", "report.pdf");
//! let key = storage.store(&file, Some(b"content")).await?.unwrap();
//!
//! let bytes = storage.read(&file.with_content_key(key)).await?;
//!
//! // Later, from the host's scheduler:
//! storage.reconcile().await?;
//! ```

pub mod adapter;
pub mod client;
pub mod config;
pub mod error;
pub mod ledger;
pub mod path;
pub mod token;
pub mod types;

// Re-export the public surface
pub use adapter::{DriveStorage, ReconcileReport};
pub use client::{ByteStream, DeleteOutcome, DriveClient, UploadSource};
pub use config::{BackendConfig, DriveConfig, HttpConfig, TokenConfig};
pub use error::{Result, StowageError};
pub use ledger::{InMemoryLedger, LedgerStore};
pub use path::{remote_path, shard_prefix};
pub use token::{AccessCredential, ClaimSigner, DriveClaims, RsaClaimSigner, TokenCache};
pub use types::{ContentKey, ExternalId, RecordId, RemoteFileRecord, StoredFile};
