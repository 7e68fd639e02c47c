//! OpenStack profile

use crate::auth::{Credentials, KeystoneAuth, TokenStore};
use crate::config::ClientConfig;
use crate::endpoint::CatalogUrlBuilder;
use crate::error::{Error, Result};
use crate::fail_codes::FailCodeTable;
use crate::hooks::AuthTokenHeader;
use crate::profile::ProviderProfile;

/// Profile for an OpenStack service of type `service_type`.
///
/// Authenticates with Keystone v2.0 password credentials and takes the
/// endpoint from the service catalog, falling back to `config.base_url`.
/// Not gated unless `config.auth_gate` says so; call
/// [`Client::authenticate`](crate::Client::authenticate) first.
pub fn profile(config: &ClientConfig, service_type: &str) -> Result<ProviderProfile> {
    let auth_url = config
        .auth_url
        .clone()
        .ok_or_else(|| Error::MissingConfig("auth_url".to_string()))?;
    let username = config
        .username
        .clone()
        .ok_or_else(|| Error::MissingConfig("username".to_string()))?;
    let password = config
        .password
        .clone()
        .ok_or_else(|| Error::MissingConfig("password".to_string()))?;

    let store = TokenStore::new();
    let mut auth = KeystoneAuth::new(
        auth_url,
        Credentials::Password { username, password },
        store.clone(),
    )
    .service_type(service_type);
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

    Ok(ProviderProfile::builder("openstack")
        .fail_codes(FailCodeTable::openstack())
        .url_builder(urls)
        .auth(auth)
        .auth_gated(config.auth_gate.unwrap_or(false))
        .hook(AuthTokenHeader::new(store.clone()))
        .token_store(store)
        .build())
}
