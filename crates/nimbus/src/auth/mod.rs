//! Authentication resolvers
//!
//! The pipeline treats authentication as a single async operation: an
//! [`AuthResolver`] either establishes a usable token or fails. What a token
//! is and where it lives is the resolver's business; the resolvers in this
//! module publish into a shared [`TokenStore`] that hooks and URL builders
//! read from.

mod keystone;
mod token;

pub use keystone::{Credentials, KeystoneAuth};
pub use token::{TokenState, TokenStore};

use crate::error::Result;
use async_trait::async_trait;
use nimbus_transport::Transport;
use secrecy::SecretString;
use std::fmt;

/// Establishes authentication for a client.
///
/// Called by the pipeline before dispatch whenever the client is not yet
/// authorized. Implementations may issue their own requests through
/// `transport`.
#[async_trait]
pub trait AuthResolver: Send + Sync + fmt::Debug {
    /// Run the authentication round trip.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`](crate::Error::Auth) when credentials are
    /// rejected or the identity response is unusable, or a transport error.
    async fn authenticate(&self, transport: &dyn Transport) -> Result<()>;
}

/// Resolver for endpoints that need no credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl AuthResolver for NoAuth {
    async fn authenticate(&self, _transport: &dyn Transport) -> Result<()> {
        Ok(())
    }
}

/// Resolver holding a token issued out of band.
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: SecretString,
    store: TokenStore,
}

impl StaticToken {
    /// Publish `token` into `store` on authentication.
    pub fn new(token: impl Into<String>, store: TokenStore) -> Self {
        Self {
            token: SecretString::new(token.into().into_boxed_str()),
            store,
        }
    }
}

#[async_trait]
impl AuthResolver for StaticToken {
    async fn authenticate(&self, _transport: &dyn Transport) -> Result<()> {
        self.store.set(TokenState::new(self.token.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_transport::MockTransport;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn test_no_auth_succeeds_without_requests() {
        let transport = MockTransport::new();
        NoAuth.authenticate(&transport).await.unwrap();
        assert_eq!(transport.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_static_token_publishes() {
        let store = TokenStore::new();
        let resolver = StaticToken::new("tok-123", store.clone());
        assert!(store.token().is_none());

        resolver.authenticate(&MockTransport::new()).await.unwrap();
        assert_eq!(store.token().unwrap().expose_secret(), "tok-123");
    }
}
