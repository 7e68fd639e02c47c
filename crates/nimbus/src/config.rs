//! Configuration for the nimbus client

use crate::error::{Error, Result};
use crate::providers::Provider;
use secrecy::SecretString;
use std::collections::HashMap;
use std::time::Duration;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Configuration for a nimbus client.
///
/// Holds the credentials and endpoints a provider profile is built from.
/// Everything here is immutable once the client is constructed.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Which provider the client talks to
    pub provider: Option<Provider>,

    /// Identity (Keystone) endpoint, e.g. `https://identity.api.rackspacecloud.com`
    pub auth_url: Option<String>,

    /// Account user name
    pub username: Option<String>,

    /// Password for password authentication (OpenStack)
    pub password: Option<SecretString>,

    /// API key for key authentication (Rackspace)
    pub api_key: Option<SecretString>,

    /// Tenant / project name
    pub tenant_name: Option<String>,

    /// Region used to pick an endpoint out of the service catalog
    pub region: Option<String>,

    /// Service endpoint used when the catalog does not provide one
    pub base_url: Option<String>,

    /// Default timeout for requests
    pub timeout: Duration,

    /// Connect timeout
    pub connect_timeout: Duration,

    /// Custom headers to include with every request
    pub default_headers: HashMap<String, String>,

    /// User-Agent header value
    pub user_agent: Option<String>,

    /// Force the auth gate on or off; `None` keeps the provider default
    pub auth_gate: Option<bool>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            provider: None,
            auth_url: None,
            username: None,
            password: None,
            api_key: None,
            tenant_name: None,
            region: None,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: Duration::from_secs(30),
            default_headers: HashMap::new(),
            user_agent: None,
            auth_gate: None,
        }
    }
}

impl ClientConfig {
    /// Configuration for a provider with a user name.
    pub fn new(provider: Provider, username: impl Into<String>) -> Self {
        Self {
            provider: Some(provider),
            username: Some(username.into()),
            ..Default::default()
        }
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::new(password.into().into_boxed_str()));
        self
    }

    /// Set the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into().into_boxed_str()));
        self
    }

    /// Set the identity endpoint.
    pub fn auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = Some(auth_url.into());
        self
    }

    /// Set the region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the fallback service endpoint.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the tenant name.
    pub fn tenant_name(mut self, tenant: impl Into<String>) -> Self {
        self.tenant_name = Some(tenant.into());
        self
    }

    /// Add a header sent with every request.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first when present.
    /// This will look for:
    /// - `NIMBUS_PROVIDER` (`openstack` or `rackspace`)
    /// - `NIMBUS_AUTH_URL`, `NIMBUS_USERNAME`, `NIMBUS_PASSWORD`, `NIMBUS_API_KEY`
    /// - `NIMBUS_TENANT`, `NIMBUS_REGION`, `NIMBUS_BASE_URL`
    /// - `NIMBUS_TIMEOUT` for request timeout (in seconds)
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self> {
        use std::env;

        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(provider) = env::var("NIMBUS_PROVIDER") {
            config.provider = Some(provider.parse()?);
        }

        config.auth_url = env::var("NIMBUS_AUTH_URL").ok();
        config.username = env::var("NIMBUS_USERNAME").ok();
        config.password = env::var("NIMBUS_PASSWORD")
            .ok()
            .map(|s| SecretString::new(s.into_boxed_str()));
        config.api_key = env::var("NIMBUS_API_KEY")
            .ok()
            .map(|s| SecretString::new(s.into_boxed_str()));
        config.tenant_name = env::var("NIMBUS_TENANT").ok();
        config.region = env::var("NIMBUS_REGION").ok();
        config.base_url = env::var("NIMBUS_BASE_URL").ok();

        if let Ok(timeout_str) = env::var("NIMBUS_TIMEOUT") {
            let secs = timeout_str.parse::<u64>().map_err(|_| {
                Error::InvalidConfig(format!("NIMBUS_TIMEOUT is not a number: {timeout_str}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Merge this configuration with another, with the other taking precedence.
    pub fn merge(mut self, other: ClientConfig) -> Self {
        if other.provider.is_some() {
            self.provider = other.provider;
        }
        if other.auth_url.is_some() {
            self.auth_url = other.auth_url;
        }
        if other.username.is_some() {
            self.username = other.username;
        }
        if other.password.is_some() {
            self.password = other.password;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.tenant_name.is_some() {
            self.tenant_name = other.tenant_name;
        }
        if other.region.is_some() {
            self.region = other.region;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.timeout != DEFAULT_TIMEOUT {
            self.timeout = other.timeout;
        }
        self.default_headers.extend(other.default_headers);
        if other.user_agent.is_some() {
            self.user_agent = other.user_agent;
        }
        if other.auth_gate.is_some() {
            self.auth_gate = other.auth_gate;
        }

        self
    }

    /// Check that the credentials the configured provider needs are present.
    pub fn validate(&self) -> Result<()> {
        let provider = self
            .provider
            .ok_or_else(|| Error::MissingConfig("provider".to_string()))?;

        if self.username.is_none() {
            return Err(Error::MissingConfig("username".to_string()));
        }

        match provider {
            Provider::OpenStack if self.password.is_none() => {
                Err(Error::MissingConfig("password".to_string()))
            }
            Provider::Rackspace if self.api_key.is_none() && self.password.is_none() => {
                Err(Error::MissingConfig("api_key or password".to_string()))
            }
            Provider::OpenStack if self.auth_url.is_none() => {
                Err(Error::MissingConfig("auth_url".to_string()))
            }
            _ => Ok(()),
        }
    }
}
