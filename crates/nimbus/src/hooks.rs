//! Pre-request hooks
//!
//! Hooks rewrite a [`RequestDescriptor`] before its URI is resolved. They run
//! in registration order; a hook that returns `None` leaves the descriptor as
//! the previous hook produced it.

use crate::auth::TokenStore;
use crate::client::ClientState;
use crate::request::RequestDescriptor;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Trait for pre-request hooks.
pub trait BeforeHook: Send + Sync {
    /// Inspect `descriptor` and optionally return a replacement.
    fn before(
        &self,
        client: &ClientState,
        descriptor: &RequestDescriptor,
    ) -> Option<RequestDescriptor>;
}

impl<F> BeforeHook for F
where
    F: Fn(&ClientState, &RequestDescriptor) -> Option<RequestDescriptor> + Send + Sync,
{
    fn before(
        &self,
        client: &ClientState,
        descriptor: &RequestDescriptor,
    ) -> Option<RequestDescriptor> {
        self(client, descriptor)
    }
}

/// Ordered hook list.
///
/// Registration takes the write lock; every request reads an immutable
/// snapshot so registration never races a running request.
#[derive(Default)]
pub struct HookChain {
    hooks: RwLock<Vec<Arc<dyn BeforeHook>>>,
}

impl HookChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook to the end of the chain.
    pub fn push(&self, hook: Arc<dyn BeforeHook>) {
        self.hooks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(hook);
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True when no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The hooks registered right now.
    pub fn snapshot(&self) -> Vec<Arc<dyn BeforeHook>> {
        self.hooks.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Run `hooks` over `descriptor` in order.
pub fn apply_hooks(
    hooks: &[Arc<dyn BeforeHook>],
    client: &ClientState,
    mut descriptor: RequestDescriptor,
) -> RequestDescriptor {
    for hook in hooks {
        if let Some(replacement) = hook.before(client, &descriptor) {
            descriptor = replacement;
        }
    }
    descriptor
}

/// Adds configured headers the request did not set itself.
#[derive(Debug, Clone)]
pub struct DefaultHeaders {
    headers: HashMap<String, String>,
}

impl DefaultHeaders {
    /// Hook adding `headers`.
    pub fn new(headers: HashMap<String, String>) -> Self {
        Self { headers }
    }
}

impl BeforeHook for DefaultHeaders {
    fn before(
        &self,
        _client: &ClientState,
        descriptor: &RequestDescriptor,
    ) -> Option<RequestDescriptor> {
        let missing: Vec<_> = self
            .headers
            .iter()
            .filter(|(k, _)| !descriptor.has_header(k))
            .collect();
        if missing.is_empty() {
            return None;
        }

        let mut next = descriptor.clone();
        for (k, v) in missing {
            next.headers.insert(k.clone(), v.clone());
        }
        Some(next)
    }
}

/// Sets `x-auth-token` from a [`TokenStore`].
#[derive(Debug, Clone)]
pub struct AuthTokenHeader {
    store: TokenStore,
}

impl AuthTokenHeader {
    /// Hook reading from `store`.
    pub fn new(store: TokenStore) -> Self {
        Self { store }
    }
}

impl BeforeHook for AuthTokenHeader {
    fn before(
        &self,
        _client: &ClientState,
        descriptor: &RequestDescriptor,
    ) -> Option<RequestDescriptor> {
        let token = self.store.token()?;
        Some(
            descriptor
                .clone()
                .header("x-auth-token", token.expose_secret()),
        )
    }
}

/// Sets `user-agent` unless the request has one.
#[derive(Debug, Clone)]
pub struct UserAgent(pub String);

impl BeforeHook for UserAgent {
    fn before(
        &self,
        _client: &ClientState,
        descriptor: &RequestDescriptor,
    ) -> Option<RequestDescriptor> {
        if descriptor.has_header("user-agent") {
            None
        } else {
            Some(descriptor.clone().header("user-agent", self.0.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenState;
    use crate::client::ClientState;
    use crate::profile::ProviderProfile;
    use crate::ClientConfig;
    use http::Method;
    use secrecy::SecretString;

    fn state() -> ClientState {
        ClientState::new(
            ClientConfig::default(),
            ProviderProfile::builder("test")
                .base_url("http://localhost")
                .unwrap()
                .build(),
        )
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let chain = HookChain::new();
        chain.push(Arc::new(|_: &ClientState, d: &RequestDescriptor| {
            Some(d.clone().header("x-order", "first"))
        }));
        chain.push(Arc::new(|_: &ClientState, d: &RequestDescriptor| {
            let prior = d.get_header("x-order").unwrap_or_default().to_string();
            Some(d.clone().header("x-order", format!("{prior},second")))
        }));

        let out = apply_hooks(
            &chain.snapshot(),
            &state(),
            RequestDescriptor::new(Method::GET, "x"),
        );
        assert_eq!(out.get_header("x-order"), Some("first,second"));
    }

    #[test]
    fn test_none_keeps_prior_descriptor() {
        let hooks: Vec<Arc<dyn BeforeHook>> = vec![
            Arc::new(|_: &ClientState, d: &RequestDescriptor| {
                Some(d.clone().header("x-a", "1"))
            }),
            Arc::new(|_: &ClientState, _: &RequestDescriptor| None),
            Arc::new(|_: &ClientState, d: &RequestDescriptor| {
                assert_eq!(d.get_header("x-a"), Some("1"));
                Some(d.clone().header("x-b", "2"))
            }),
        ];

        let out = apply_hooks(&hooks, &state(), RequestDescriptor::new(Method::GET, "x"));
        assert_eq!(out.get_header("x-a"), Some("1"));
        assert_eq!(out.get_header("x-b"), Some("2"));
    }

    #[test]
    fn test_default_headers_do_not_override() {
        let mut headers = HashMap::new();
        headers.insert("accept".to_string(), "application/json".to_string());
        headers.insert("x-trace".to_string(), "on".to_string());
        let hook = DefaultHeaders::new(headers);

        let descriptor = RequestDescriptor::new(Method::GET, "x").header("Accept", "text/plain");
        let out = hook.before(&state(), &descriptor).unwrap();
        assert_eq!(out.get_header("accept"), Some("text/plain"));
        assert_eq!(out.get_header("x-trace"), Some("on"));
    }

    #[test]
    fn test_auth_token_header() {
        let store = TokenStore::new();
        let hook = AuthTokenHeader::new(store.clone());
        let descriptor = RequestDescriptor::new(Method::GET, "x");
        assert!(hook.before(&state(), &descriptor).is_none());

        store.set(TokenState::new(SecretString::new("tok".to_string().into_boxed_str())));
        let out = hook.before(&state(), &descriptor).unwrap();
        assert_eq!(out.get_header("x-auth-token"), Some("tok"));
    }

    #[test]
    fn test_user_agent() {
        let hook = UserAgent("nimbus/test".into());
        let out = hook
            .before(&state(), &RequestDescriptor::new(Method::GET, "x"))
            .unwrap();
        assert_eq!(out.get_header("user-agent"), Some("nimbus/test"));
    }
}
