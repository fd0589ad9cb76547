//! Token store
//!
//! The single owner of persisted credential state. Every other component
//! reads through [`TokenStore::get`] and mutates only through
//! [`TokenStore::set`] / [`TokenStore::clear`]; nothing else touches the
//! underlying storage keys, so no two components can disagree about what the
//! current token set is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::errors::AuthError;
use crate::storage::StorageBackend;
use crate::types::TokenSet;

/// Storage key for the persisted token set, scoped to the profile backend.
pub const TOKEN_STORAGE_KEY: &str = "staffport.tokens";

type Listener = Box<dyn Fn(Option<&TokenSet>) + Send + Sync>;

/// Durable, observable storage of the current token set.
///
/// `set` is last-writer-wins and atomic from the caller's perspective: the
/// value is persisted first and swapped into memory whole, so a subscriber or
/// reader never observes a partial token set. Change notifications run
/// synchronously inside `set`/`clear`, before the call returns — a state
/// machine reading after a mutation always sees the post-mutation value.
pub struct TokenStore {
    backend: Arc<dyn StorageBackend>,
    current: RwLock<Option<TokenSet>>,
    generation: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

impl TokenStore {
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Load the persisted token set, if any. Called once at application
    /// start; does not notify subscribers.
    ///
    /// # Errors
    /// Returns a storage error if the backend read fails. An unreadable
    /// persisted value is discarded and treated as absent.
    pub fn init(&self) -> Result<bool, AuthError> {
        let Some(raw) = self.backend.get(TOKEN_STORAGE_KEY)? else {
            debug!("no persisted token set");
            return Ok(false);
        };

        match serde_json::from_str::<TokenSet>(&raw) {
            Ok(tokens) => {
                *self.current.write() = Some(tokens);
                info!("token set restored from storage");
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "discarding unreadable persisted token set");
                self.backend.remove(TOKEN_STORAGE_KEY)?;
                Ok(false)
            }
        }
    }

    /// Replace the current token set.
    ///
    /// # Errors
    /// Returns a storage error if persistence fails; in that case the
    /// in-memory value is left untouched and no notification fires.
    pub fn set(&self, tokens: TokenSet) -> Result<(), AuthError> {
        let raw = serde_json::to_string(&tokens)
            .map_err(crate::storage::StorageError::Serialization)?;
        self.backend.set(TOKEN_STORAGE_KEY, &raw)?;

        *self.current.write() = Some(tokens.clone());
        self.generation.fetch_add(1, Ordering::SeqCst);
        debug!("token set replaced");

        self.notify(Some(&tokens));
        Ok(())
    }

    /// Current token set, if any.
    #[must_use]
    pub fn get(&self) -> Option<TokenSet> {
        self.current.read().clone()
    }

    /// Remove the token set. Idempotent; notifies subscribers on every call.
    ///
    /// # Errors
    /// Returns a storage error if the backend delete fails.
    pub fn clear(&self) -> Result<(), AuthError> {
        self.backend.remove(TOKEN_STORAGE_KEY)?;

        *self.current.write() = None;
        self.generation.fetch_add(1, Ordering::SeqCst);
        debug!("token set cleared");

        self.notify(None);
        Ok(())
    }

    /// Monotonic counter bumped on every `set`/`clear`. Consumers cache
    /// derived data (the user profile) tagged with this value to detect
    /// token replacement.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Register a listener invoked synchronously after each `set`/`clear`.
    ///
    /// Listeners must not call `subscribe` re-entrantly.
    pub fn subscribe(&self, listener: impl Fn(Option<&TokenSet>) + Send + Sync + 'static) {
        self.listeners.lock().push(Box::new(listener));
    }

    fn notify(&self, tokens: Option<&TokenSet>) {
        for listener in self.listeners.lock().iter() {
            listener(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::storage::MemoryStorage;

    fn sample_tokens() -> TokenSet {
        TokenSet::new(
            "access_token_123".to_string(),
            "id_token_789".to_string(),
            Some("refresh_token_456".to_string()),
            3600,
        )
    }

    #[test]
    fn set_then_get_roundtrips() {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()));
        let tokens = sample_tokens();

        store.set(tokens.clone()).unwrap();
        assert_eq!(store.get(), Some(tokens));
    }

    #[test]
    fn clear_leaves_store_empty() {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()));
        store.set(sample_tokens()).unwrap();

        store.clear().unwrap();
        assert_eq!(store.get(), None);

        // idempotent
        store.clear().unwrap();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn init_restores_persisted_value() {
        let backend = Arc::new(MemoryStorage::new());
        let tokens = sample_tokens();

        let store = TokenStore::new(backend.clone());
        store.set(tokens.clone()).unwrap();

        // a fresh store over the same backend sees the persisted set
        let restored = TokenStore::new(backend);
        assert!(restored.init().unwrap());
        assert_eq!(restored.get(), Some(tokens));
    }

    #[test]
    fn init_discards_corrupt_value() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set(TOKEN_STORAGE_KEY, "{broken").unwrap();

        let store = TokenStore::new(backend.clone());
        assert!(!store.init().unwrap());
        assert_eq!(backend.get(TOKEN_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn subscribers_fire_synchronously_on_set_and_clear() {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let seen = calls.clone();
        store.subscribe(move |tokens| {
            seen.fetch_add(1, Ordering::SeqCst);
            if seen.load(Ordering::SeqCst) == 1 {
                // first event is the set; the value is fully formed
                assert_eq!(tokens.map(|t| t.access_token.as_str()), Some("access_token_123"));
            } else {
                assert!(tokens.is_none());
            }
        });

        store.set(sample_tokens()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.clear().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn generation_bumps_on_each_mutation() {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()));
        let start = store.generation();

        store.set(sample_tokens()).unwrap();
        assert_eq!(store.generation(), start + 1);

        store.clear().unwrap();
        assert_eq!(store.generation(), start + 2);
    }

    #[test]
    fn last_writer_wins() {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()));

        let first = sample_tokens();
        let second = TokenSet::new("newer".to_string(), "id".to_string(), None, 60);

        store.set(first).unwrap();
        store.set(second.clone()).unwrap();

        assert_eq!(store.get(), Some(second));
    }
}
