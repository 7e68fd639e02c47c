//! Provider profiles
//!
//! A profile bundles what the pipeline needs to know about one provider: its
//! name, its fail-code table, how it builds URIs, how it authenticates, and
//! whether requests must wait behind the auth gate.

use crate::auth::{AuthResolver, NoAuth, TokenStore};
use crate::endpoint::{BaseUrlBuilder, UrlBuilder};
use crate::error::{Error, Result};
use crate::fail_codes::FailCodeTable;
use crate::hooks::BeforeHook;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Everything provider-specific the pipeline consults.
#[derive(Clone)]
pub struct ProviderProfile {
    pub(crate) name: String,
    pub(crate) fail_codes: FailCodeTable,
    pub(crate) url_builder: Arc<dyn UrlBuilder>,
    pub(crate) auth: Arc<dyn AuthResolver>,
    pub(crate) auth_gated: bool,
    pub(crate) hooks: Vec<Arc<dyn BeforeHook>>,
    pub(crate) tokens: Option<TokenStore>,
}

impl ProviderProfile {
    /// Start a profile for provider `name`.
    pub fn builder(name: impl Into<String>) -> ProviderProfileBuilder {
        ProviderProfileBuilder {
            name: name.into(),
            fail_codes: FailCodeTable::new(),
            url_builder: None,
            auth: None,
            auth_gated: false,
            hooks: Vec::new(),
            tokens: None,
        }
    }

    /// Provider name used in error messages and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The provider's fail-code table.
    pub fn fail_codes(&self) -> &FailCodeTable {
        &self.fail_codes
    }

    /// Whether unauthorized requests wait behind the auth gate.
    pub fn auth_gated(&self) -> bool {
        self.auth_gated
    }

    /// Token store shared with the resolver, when the profile has one.
    pub fn tokens(&self) -> Option<&TokenStore> {
        self.tokens.as_ref()
    }

    /// Build the URI for `segments`.
    pub fn url(&self, segments: &[String]) -> Result<Url> {
        self.url_builder.build(segments)
    }
}

impl fmt::Debug for ProviderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderProfile")
            .field("name", &self.name)
            .field("fail_codes", &self.fail_codes.len())
            .field("auth", &self.auth)
            .field("auth_gated", &self.auth_gated)
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ProviderProfile`].
pub struct ProviderProfileBuilder {
    name: String,
    fail_codes: FailCodeTable,
    url_builder: Option<Arc<dyn UrlBuilder>>,
    auth: Option<Arc<dyn AuthResolver>>,
    auth_gated: bool,
    hooks: Vec<Arc<dyn BeforeHook>>,
    tokens: Option<TokenStore>,
}

impl ProviderProfileBuilder {
    /// Set the fail-code table.
    pub fn fail_codes(mut self, fail_codes: FailCodeTable) -> Self {
        self.fail_codes = fail_codes;
        self
    }

    /// Set the URL builder.
    pub fn url_builder(mut self, builder: impl UrlBuilder + 'static) -> Self {
        self.url_builder = Some(Arc::new(builder));
        self
    }

    /// Use a fixed base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `base` does not parse as a URL.
    pub fn base_url(self, base: &str) -> Result<Self> {
        Ok(self.url_builder(BaseUrlBuilder::new(base)?))
    }

    /// Set the auth resolver. Defaults to [`NoAuth`].
    pub fn auth(mut self, auth: impl AuthResolver + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    /// Hold unauthorized requests until authentication completes.
    pub fn auth_gated(mut self, gated: bool) -> Self {
        self.auth_gated = gated;
        self
    }

    /// Append a provider hook; provider hooks run before client hooks.
    pub fn hook(mut self, hook: impl BeforeHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Token store shared with the resolver.
    pub fn token_store(mut self, store: TokenStore) -> Self {
        self.tokens = Some(store);
        self
    }

    /// Finish the profile.
    pub fn build(self) -> ProviderProfile {
        let name = self.name.clone();
        let url_builder = self.url_builder.unwrap_or_else(|| {
            Arc::new(move |_: &[String]| -> Result<Url> {
                Err(Error::InvalidUrl(format!(
                    "no URL builder configured for {name}"
                )))
            })
        });

        ProviderProfile {
            name: self.name,
            fail_codes: self.fail_codes,
            url_builder,
            auth: self.auth.unwrap_or_else(|| Arc::new(NoAuth)),
            auth_gated: self.auth_gated,
            hooks: self.hooks,
            tokens: self.tokens,
        }
    }
}
