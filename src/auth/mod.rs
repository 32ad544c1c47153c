//! Credential ownership. Sessions borrow the token at `start()` and report
//! back through [`AuthGate::invalidate`] when the server rejects it.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::watch;

pub trait AuthGate: Send + Sync {
    /// Current bearer credential, if any.
    fn get(&self) -> Option<String>;

    /// Drops the credential and signals that the user must re-authenticate.
    fn invalidate(&self);
}

/// In-process holder for the bearer token.
///
/// Subscribers see `true` on the watch channel once the token has been
/// invalidated; setting a new token resets it to `false`.
#[derive(Debug)]
pub struct TokenStore {
    token: RwLock<Option<String>>,
    invalidated: watch::Sender<bool>,
    invalidations: AtomicU64,
}

impl TokenStore {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        let token = token.filter(|value| !value.trim().is_empty());
        let (invalidated, _) = watch::channel(false);
        Self {
            token: RwLock::new(token),
            invalidated,
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        *self.token.write().unwrap_or_else(PoisonError::into_inner) =
            Some(token).filter(|value| !value.trim().is_empty());
        self.invalidated.send_replace(false);
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.invalidated.subscribe()
    }

    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        *self.invalidated.borrow()
    }

    /// Number of `invalidate()` calls over the store's lifetime.
    #[must_use]
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AuthGate for TokenStore {
    fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn invalidate(&self) {
        self.token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        self.invalidated.send_replace(true);
        tracing::warn!("Credential invalidated; re-authentication required");
    }
}
