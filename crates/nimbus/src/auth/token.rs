//! Shared token state

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::sync::{Arc, RwLock};

/// What a successful authentication produced.
#[derive(Debug, Clone)]
pub struct TokenState {
    /// The auth token
    pub token: SecretString,
    /// When the identity service says the token stops working
    pub expires: Option<DateTime<Utc>>,
    /// Service endpoint picked from the catalog
    pub endpoint: Option<String>,
    /// Tenant the token is scoped to
    pub tenant_id: Option<String>,
}

impl TokenState {
    /// A bare token with no expiry or endpoint.
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            expires: None,
            endpoint: None,
            tenant_id: None,
        }
    }
}

/// Token storage shared by a resolver, the header hook and the URL builder.
///
/// Cloning shares the same slot.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<Option<TokenState>>>,
}

impl TokenStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored state.
    pub fn set(&self, state: TokenState) {
        // A poisoned lock only means a writer panicked mid-assignment of an Option
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(state);
    }

    /// Drop the stored state.
    pub fn clear(&self) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    /// Snapshot of the stored state.
    pub fn get(&self) -> Option<TokenState> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The current token.
    pub fn token(&self) -> Option<SecretString> {
        self.get().map(|state| state.token)
    }

    /// The catalog endpoint recorded at authentication.
    pub fn endpoint(&self) -> Option<String> {
        self.get().and_then(|state| state.endpoint)
    }

    /// True when a token is stored and its expiry, if known, is after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.get() {
            Some(state) => state.expires.is_none_or(|expires| expires > now),
            None => false,
        }
    }
}
