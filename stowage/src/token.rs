//! Signed drive access credentials with lazy, single-flight refresh.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{Result, StowageError};

/// Claims asserted in a drive access token.
#[derive(Debug, Clone, Serialize)]
pub struct DriveClaims {
    /// Identity the remote service authorizes operations against.
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Seam for producing signed claim tokens.
pub trait ClaimSigner: Send + Sync {
    fn sign(&self, claims: &DriveClaims) -> Result<String>;
}

/// RS256 signer backed by a PEM private key loaded from disk.
pub struct RsaClaimSigner {
    key: EncodingKey,
}

impl RsaClaimSigner {
    /// Load the signing key. A missing or malformed key is fatal
    /// configuration, surfaced immediately rather than retried.
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let pem = std::fs::read(path).map_err(|e| {
            StowageError::Configuration(format!(
                "cannot read signing key {}: {e}",
                path.display()
            ))
        })?;
        let key = EncodingKey::from_rsa_pem(&pem).map_err(|e| {
            StowageError::Configuration(format!(
                "invalid RSA signing key {}: {e}",
                path.display()
            ))
        })?;
        Ok(Self { key })
    }
}

impl ClaimSigner for RsaClaimSigner {
    fn sign(&self, claims: &DriveClaims) -> Result<String> {
        Ok(encode(&Header::new(Algorithm::RS256), claims, &self.key)?)
    }
}

/// A signed token plus the locally recorded deadline after which the cache
/// treats it as stale.
#[derive(Debug, Clone)]
pub struct AccessCredential {
    pub token: Arc<str>,
    pub valid_until: DateTime<Utc>,
}

/// Caches one signed access credential per backend and refreshes it lazily
/// on first use past its deadline.
///
/// Refresh is double-checked: the fast path is a shared read of the cached
/// credential; a caller that finds it missing or stale takes the exclusive
/// lock, re-checks (another caller may have signed in the meantime), and
/// signs at most once per expiry window. Concurrent callers racing a stale
/// token block briefly and reuse the winner's result.
pub struct TokenCache<S> {
    signer: S,
    username: String,
    ttl: chrono::Duration,
    current: RwLock<Option<AccessCredential>>,
}

impl<S: ClaimSigner> TokenCache<S> {
    pub fn new(signer: S, username: impl Into<String>, ttl: Duration) -> Self {
        Self {
            signer,
            username: username.into(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365)),
            current: RwLock::new(None),
        }
    }

    /// Return a credential whose recorded deadline is in the future at the
    /// moment of return, signing a fresh one if needed.
    pub fn credential(&self) -> Result<AccessCredential> {
        if let Some(credential) = self.current.read().as_ref() {
            if Utc::now() < credential.valid_until {
                return Ok(credential.clone());
            }
        }

        let mut slot = self.current.write();
        // Re-check under the exclusive lock: a concurrent caller may have
        // already signed for this window.
        if let Some(credential) = slot.as_ref() {
            if Utc::now() < credential.valid_until {
                return Ok(credential.clone());
            }
        }

        let now = Utc::now();
        let claims = DriveClaims {
            username: self.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let token: Arc<str> = self.signer.sign(&claims)?.into();
        let credential = AccessCredential {
            token,
            valid_until: now + self.ttl,
        };
        tracing::debug!(
            username = %self.username,
            valid_until = %credential.valid_until,
            "Signed fresh drive access token"
        );
        *slot = Some(credential.clone());
        Ok(credential)
    }

    /// The bearer token itself, refreshed if stale.
    pub fn token(&self) -> Result<Arc<str>> {
        Ok(self.credential()?.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    struct CountingSigner {
        calls: AtomicUsize,
    }

    impl CountingSigner {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl<'a> ClaimSigner for &'a CountingSigner {
        fn sign(&self, claims: &DriveClaims) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("token-{}-{}", claims.username, claims.exp))
        }
    }

    #[test]
    fn concurrent_callers_trigger_exactly_one_signing() {
        const CALLERS: usize = 16;

        let signer = CountingSigner::new();
        let cache = TokenCache::new(&signer, "svc-files", Duration::from_secs(3600));
        let barrier = Barrier::new(CALLERS);

        std::thread::scope(|scope| {
            for _ in 0..CALLERS {
                scope.spawn(|| {
                    barrier.wait();
                    let credential = cache.credential().unwrap();
                    assert!(credential.valid_until > Utc::now());
                });
            }
        });

        assert_eq!(signer.count(), 1);
    }

    #[test]
    fn racing_past_an_expired_token_signs_once() {
        const CALLERS: usize = 16;

        let signer = CountingSigner::new();
        let cache = TokenCache::new(&signer, "svc-files", Duration::from_millis(50));

        cache.token().unwrap();
        assert_eq!(signer.count(), 1);
        std::thread::sleep(Duration::from_millis(60));

        let barrier = Barrier::new(CALLERS);
        std::thread::scope(|scope| {
            for _ in 0..CALLERS {
                scope.spawn(|| {
                    barrier.wait();
                    let credential = cache.credential().unwrap();
                    assert!(credential.valid_until > Utc::now());
                });
            }
        });

        // One signing for the initial token, one for the refresh window.
        assert_eq!(signer.count(), 2);
    }

    #[test]
    fn stale_credential_is_resigned() {
        let signer = CountingSigner::new();
        let cache = TokenCache::new(&signer, "svc-files", Duration::ZERO);

        cache.token().unwrap();
        cache.token().unwrap();

        // Zero ttl means every call finds the credential already stale.
        assert_eq!(signer.count(), 2);
    }

    #[test]
    fn valid_credential_is_reused() {
        let signer = CountingSigner::new();
        let cache = TokenCache::new(&signer, "svc-files", Duration::from_secs(3600));

        let first = cache.token().unwrap();
        let second = cache.token().unwrap();

        assert_eq!(first, second);
        assert_eq!(signer.count(), 1);
    }

    #[test]
    fn claims_carry_the_backend_username() {
        let signer = CountingSigner::new();
        let cache = TokenCache::new(&signer, "svc-files", Duration::from_secs(60));

        let token = cache.token().unwrap();
        assert!(token.starts_with("token-svc-files-"));
    }

    #[test]
    fn missing_key_file_is_fatal_configuration() {
        let result = RsaClaimSigner::from_key_file(Path::new("/nonexistent/key.pem"));
        assert!(matches!(result, Err(StowageError::Configuration(_))));
    }

    #[test]
    fn garbage_key_file_is_fatal_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.pem");
        std::fs::write(&path, "not a pem").unwrap();

        let result = RsaClaimSigner::from_key_file(&path);
        assert!(matches!(result, Err(StowageError::Configuration(_))));
    }

    #[test]
    fn rsa_signer_produces_a_compact_jwt() {
        let path = concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/drive_signing_key.pem"
        );
        let signer = RsaClaimSigner::from_key_file(Path::new(path)).unwrap();

        let now = Utc::now();
        let token = signer
            .sign(&DriveClaims {
                username: "svc-files".to_string(),
                iat: now.timestamp(),
                exp: (now + chrono::Duration::hours(1)).timestamp(),
            })
            .unwrap();

        assert_eq!(token.split('.').count(), 3);
    }
}
