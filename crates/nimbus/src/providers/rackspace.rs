//! Rackspace Cloud profile

use crate::auth::{Credentials, KeystoneAuth, TokenStore};
use crate::config::ClientConfig;
use crate::endpoint::CatalogUrlBuilder;
use crate::error::{Error, Result};
use crate::fail_codes::FailCodeTable;
use crate::hooks::AuthTokenHeader;
use crate::profile::ProviderProfile;

/// Rackspace identity endpoint used when `auth_url` is not configured.
pub const DEFAULT_AUTH_URL: &str = "https://identity.api.rackspacecloud.com";

/// Profile for a Rackspace service of type `service_type`.
///
/// Authenticates with the `RAX-KSKEY` API-key extension (or a password when
/// no key is configured). Requests made before authentication wait behind the
/// auth gate, so callers can start uploads right away.
pub fn profile(config: &ClientConfig, service_type: &str) -> Result<ProviderProfile> {
    let username = config
        .username
        .clone()
        .ok_or_else(|| Error::MissingConfig("username".to_string()))?;
    let credentials = match (&config.api_key, &config.password) {
        (Some(api_key), _) => Credentials::ApiKey {
            username,
            api_key: api_key.clone(),
        },
        (None, Some(password)) => Credentials::Password {
            username,
            password: password.clone(),
        },
        (None, None) => return Err(Error::MissingConfig("api_key or password".to_string())),
    };

    let store = TokenStore::new();
    let auth_url = config.auth_url.as_deref().unwrap_or(DEFAULT_AUTH_URL);
    let mut auth =
        KeystoneAuth::new(auth_url, credentials, store.clone()).service_type(service_type);
    if let Some(tenant) = &config.tenant_name {
        auth = auth.tenant_name(tenant);
    }
    if let Some(region) = &config.region {
        auth = auth.region(region);
    }

    let mut urls = CatalogUrlBuilder::new(store.clone());
    if let Some(base) = &config.base_url {
        urls = urls.fallback(base)?;
    }

    Ok(ProviderProfile::builder("rackspace")
        .fail_codes(FailCodeTable::rackspace())
        .url_builder(urls)
        .auth(auth)
        .auth_gated(config.auth_gate.unwrap_or(true))
        .hook(AuthTokenHeader::new(store.clone()))
        .token_store(store)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Provider;

    #[test]
    fn test_profile_is_gated() {
        let config = ClientConfig::new(Provider::Rackspace, "bob").api_key("k");
        let profile = profile(&config, "object-store").unwrap();
        assert_eq!(profile.name(), "rackspace");
        assert!(profile.auth_gated());
        assert_eq!(profile.fail_codes().reason("403"), Some("Resize not allowed"));
    }

    #[test]
    fn test_gate_can_be_disabled() {
        let config = ClientConfig {
            auth_gate: Some(false),
            ..ClientConfig::new(Provider::Rackspace, "bob").password("pw")
        };
        assert!(!profile(&config, "compute").unwrap().auth_gated());
    }
}
