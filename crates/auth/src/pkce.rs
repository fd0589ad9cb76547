//! PKCE (Proof Key for Code Exchange) attempt generation and persistence
//!
//! Implements RFC 7636 challenge construction, plus the attempt-scoped
//! storage that carries the verifier across the authorization redirect. The
//! redirect is a real page-load boundary, not an in-memory await: the attempt
//! written by [`crate::session::SessionManager::begin_login`] is the only
//! thing connecting the outbound redirect to the callback that later consumes
//! it.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::errors::AuthError;
use crate::storage::StorageBackend;

/// Storage key for the in-flight attempt, scoped to the tab/session backend.
pub const ATTEMPT_STORAGE_KEY: &str = "staffport.pkce_attempt";

/// Generate a cryptographically secure code verifier.
///
/// Returns a URL-safe base64-encoded string of 32 random bytes (43 chars,
/// 256 bits of entropy). Per RFC 7636, verifiers must be 43-128 characters.
///
/// # Errors
/// Fails only if the OS secure random source is unavailable.
pub fn generate_code_verifier() -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| AuthError::Pkce(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Derive the code challenge from a verifier.
///
/// Per RFC 7636, the challenge is BASE64URL(SHA256(ASCII(code_verifier)))
/// with padding stripped.
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate a random state token for CSRF protection.
///
/// # Errors
/// Fails only if the OS secure random source is unavailable.
pub fn generate_state() -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| AuthError::Pkce(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// One PKCE authorization attempt.
///
/// Tied to exactly one authorization code: persisted when the redirect is
/// initiated, consumed exactly once by the token exchange, never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkceAttempt {
    /// Random verifier, kept secret until the token exchange
    pub code_verifier: String,

    /// SHA-256 hash of the verifier, sent in the authorization request
    pub code_challenge: String,

    /// CSRF protection token echoed back by the provider
    pub state: String,
}

impl PkceAttempt {
    /// Generate a fresh attempt with new random material.
    ///
    /// # Errors
    /// Fails only if the OS secure random source is unavailable — fatal,
    /// since a predictable verifier defeats PKCE entirely.
    pub fn generate() -> Result<Self, AuthError> {
        let code_verifier = generate_code_verifier()?;
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = generate_state()?;

        Ok(Self { code_verifier, code_challenge, state })
    }

    /// Challenge method (always "S256").
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        "S256"
    }
}

/// Single-use persistence for the in-flight [`PkceAttempt`].
///
/// Backed by session-scoped storage: the attempt must survive the redirect
/// round trip but not a full browser restart, and must never leak across
/// tabs.
pub struct AttemptStore {
    backend: Arc<dyn StorageBackend>,
}

impl AttemptStore {
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Persist `attempt`, replacing any previous one.
    ///
    /// # Errors
    /// Returns a storage error if the backend write fails.
    pub fn save(&self, attempt: &PkceAttempt) -> Result<(), AuthError> {
        let raw = serde_json::to_string(attempt)
            .map_err(crate::storage::StorageError::Serialization)?;
        self.backend.set(ATTEMPT_STORAGE_KEY, &raw)?;
        debug!("PKCE attempt persisted");
        Ok(())
    }

    /// Remove and return the stored attempt, if any.
    ///
    /// The attempt is deleted before it is returned; a second `take` yields
    /// `None`. A stored value that fails to deserialize is discarded and
    /// treated as absent — it cannot complete any exchange.
    ///
    /// # Errors
    /// Returns a storage error if the backend read or delete fails.
    pub fn take(&self) -> Result<Option<PkceAttempt>, AuthError> {
        let Some(raw) = self.backend.get(ATTEMPT_STORAGE_KEY)? else {
            return Ok(None);
        };
        self.backend.remove(ATTEMPT_STORAGE_KEY)?;

        match serde_json::from_str(&raw) {
            Ok(attempt) => Ok(Some(attempt)),
            Err(e) => {
                warn!(error = %e, "discarding unreadable PKCE attempt");
                Ok(None)
            }
        }
    }

    /// Discard any stored attempt.
    pub fn clear(&self) {
        if let Err(e) = self.backend.remove(ATTEMPT_STORAGE_KEY) {
            warn!(error = %e, "failed to clear PKCE attempt");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn generated_attempt_meets_rfc_lengths() {
        let attempt = PkceAttempt::generate().unwrap();

        // RFC 7636: 43-128 chars
        assert!(attempt.code_verifier.len() >= 43);
        assert!(attempt.code_verifier.len() <= 128);
        assert!(!attempt.code_challenge.is_empty());
        assert!(!attempt.state.is_empty());
        assert_eq!(attempt.challenge_method(), "S256");
    }

    #[test]
    fn attempts_are_unique() {
        let a = PkceAttempt::generate().unwrap();
        let b = PkceAttempt::generate().unwrap();

        assert_ne!(a.code_verifier, b.code_verifier);
        assert_ne!(a.code_challenge, b.code_challenge);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn challenge_is_base64url_without_padding() {
        let attempt = PkceAttempt::generate().unwrap();

        for value in [&attempt.code_verifier, &attempt.code_challenge, &attempt.state] {
            assert!(!value.contains('='));
            assert!(!value.contains('+'));
            assert!(!value.contains('/'));
        }
    }

    #[test]
    fn challenge_is_sha256_of_verifier() {
        let attempt = PkceAttempt::generate().unwrap();
        assert_eq!(attempt.code_challenge, generate_code_challenge(&attempt.code_verifier));
    }

    #[test]
    fn known_verifier_produces_known_challenge() {
        // RFC 7636 appendix B test vector
        let challenge = generate_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn attempt_store_is_single_use() {
        let store = AttemptStore::new(Arc::new(MemoryStorage::new()));
        let attempt = PkceAttempt::generate().unwrap();

        store.save(&attempt).unwrap();

        let taken = store.take().unwrap().unwrap();
        assert_eq!(taken.code_verifier, attempt.code_verifier);

        // consumed: a second take finds nothing
        assert!(store.take().unwrap().is_none());
    }

    #[test]
    fn attempt_store_discards_corrupt_value() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set(ATTEMPT_STORAGE_KEY, "{not json").unwrap();

        let store = AttemptStore::new(backend.clone());
        assert!(store.take().unwrap().is_none());
        assert_eq!(backend.get(ATTEMPT_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn save_replaces_previous_attempt() {
        let store = AttemptStore::new(Arc::new(MemoryStorage::new()));
        let first = PkceAttempt::generate().unwrap();
        let second = PkceAttempt::generate().unwrap();

        store.save(&first).unwrap();
        store.save(&second).unwrap();

        let taken = store.take().unwrap().unwrap();
        assert_eq!(taken.code_verifier, second.code_verifier);
    }
}
