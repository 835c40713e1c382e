//! Configuration for drive backends, the HTTP client, and token signing.
//!
//! These are plain data structs supplied by the host application; the
//! crate performs no config-file loading of its own. Duration fields
//! deserialize from humantime strings (`"95s"`, `"1h"`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// One configured remote drive endpoint.
///
/// All fields are immutable after construction; a single backend serves
/// arbitrarily many concurrent store/read/delete operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend name, used to scope ledger records to their owner.
    pub name: String,
    /// Base URL of the remote drive service.
    pub base_url: Url,
    /// Identity asserted in signed access tokens.
    pub remote_username: String,
    /// Target collection on the remote side for uploads.
    pub remote_directory_id: String,
}

/// HTTP client tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Connection establishment timeout.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Socket read timeout.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Maximum idle connections retained per host, bounding the pool.
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(95),
            read_timeout: Duration::from_secs(140),
            pool_max_idle_per_host: 32,
        }
    }
}

/// Access token signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Path to the RS256 private key PEM used to sign drive claims.
    pub signing_key_path: PathBuf,

    /// How long a signed token is trusted locally before a fresh one is
    /// signed. The cache tracks this deadline itself rather than decoding
    /// the token's own expiry claim.
    #[serde(with = "humantime_serde", default = "default_token_ttl")]
    pub ttl: Duration,
}

fn default_token_ttl() -> Duration {
    Duration::from_secs(3600)
}

/// Top-level adapter configuration for one backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriveConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub token: TokenConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let config: DriveConfig = serde_json::from_str(
            r#"{
                "backend": {
                    "name": "drive",
                    "base_url": "https://drive.example.com",
                    "remote_username": "svc-files",
                    "remote_directory_id": "dir-1"
                },
                "token": { "signing_key_path": "/etc/keys/drive.pem" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.backend.name, "drive");
        assert_eq!(config.http.connect_timeout, Duration::from_secs(95));
        assert_eq!(config.http.read_timeout, Duration::from_secs(140));
        assert_eq!(config.token.ttl, Duration::from_secs(3600));
    }

    #[test]
    fn durations_accept_humantime_strings() {
        let http: HttpConfig = serde_json::from_str(
            r#"{ "connect_timeout": "10s", "read_timeout": "2m", "pool_max_idle_per_host": 4 }"#,
        )
        .unwrap();
        assert_eq!(http.connect_timeout, Duration::from_secs(10));
        assert_eq!(http.read_timeout, Duration::from_secs(120));
        assert_eq!(http.pool_max_idle_per_host, 4);
    }
}
