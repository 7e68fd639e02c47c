//! Identity v2.0 (Keystone) token authentication
//!
//! Posts credentials to `{auth_url}/v2.0/tokens`, records the issued token and
//! optionally the public endpoint of one service from the returned catalog.

use super::{AuthResolver, TokenState, TokenStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nimbus_transport::{HttpRequest, Transport};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

/// Credentials understood by the identity service.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// `passwordCredentials`, the stock OpenStack form
    Password {
        /// User name
        username: String,
        /// Password
        password: SecretString,
    },
    /// `RAX-KSKEY:apiKeyCredentials`, the Rackspace extension
    ApiKey {
        /// User name
        username: String,
        /// API key
        api_key: SecretString,
    },
}

impl Credentials {
    fn to_json(&self, tenant_name: Option<&str>) -> serde_json::Value {
        let mut auth = match self {
            Credentials::Password { username, password } => json!({
                "passwordCredentials": {
                    "username": username,
                    "password": password.expose_secret(),
                }
            }),
            Credentials::ApiKey { username, api_key } => json!({
                "RAX-KSKEY:apiKeyCredentials": {
                    "username": username,
                    "apiKey": api_key.expose_secret(),
                }
            }),
        };
        if let (Some(tenant), Some(obj)) = (tenant_name, auth.as_object_mut()) {
            obj.insert("tenantName".to_string(), json!(tenant));
        }
        json!({ "auth": auth })
    }
}

/// Keystone v2.0 resolver.
#[derive(Debug, Clone)]
pub struct KeystoneAuth {
    auth_url: String,
    credentials: Credentials,
    tenant_name: Option<String>,
    service_type: Option<String>,
    region: Option<String>,
    store: TokenStore,
}

impl KeystoneAuth {
    /// Resolver posting `credentials` to `auth_url`, publishing into `store`.
    pub fn new(auth_url: impl Into<String>, credentials: Credentials, store: TokenStore) -> Self {
        Self {
            auth_url: auth_url.into(),
            credentials,
            tenant_name: None,
            service_type: None,
            region: None,
            store,
        }
    }

    /// Scope the token to a tenant.
    pub fn tenant_name(mut self, tenant: impl Into<String>) -> Self {
        self.tenant_name = Some(tenant.into());
        self
    }

    /// Record the endpoint of this service type from the catalog.
    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    /// Prefer catalog endpoints in this region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// The shared token store.
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    fn tokens_url(&self) -> String {
        format!("{}/v2.0/tokens", self.auth_url.trim_end_matches('/'))
    }

    fn pick_endpoint(&self, catalog: &[CatalogEntry]) -> Option<String> {
        let service_type = self.service_type.as_deref()?;
        let entry = catalog.iter().find(|e| e.service_type == service_type)?;

        let in_region = self.region.as_deref().and_then(|region| {
            entry.endpoints.iter().find(|ep| {
                ep.region
                    .as_deref()
                    .is_some_and(|r| r.eq_ignore_ascii_case(region))
            })
        });

        in_region
            .or_else(|| entry.endpoints.first())
            .and_then(|ep| ep.public_url.clone())
    }
}

#[async_trait]
impl AuthResolver for KeystoneAuth {
    async fn authenticate(&self, transport: &dyn Transport) -> Result<()> {
        let payload = self.credentials.to_json(self.tenant_name.as_deref());
        let request = HttpRequest::new("POST", self.tokens_url())
            .with_header("content-type", "application/json")
            .with_header("accept", "application/json")
            .with_body(serde_json::to_vec(&payload)?);

        tracing::debug!(url = %request.url, "requesting identity token");
        let response = transport.send_http(request).await?;

        if !response.is_success() {
            return Err(Error::Auth(format!(
                "identity service returned {}: {}",
                response.status,
                String::from_utf8_lossy(&response.body)
            )));
        }

        let parsed: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| Error::Auth(format!("unreadable identity response: {e}")))?;

        let access = parsed.access;
        let expires = access
            .token
            .expires
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let endpoint = self.pick_endpoint(&access.service_catalog);

        if self.service_type.is_some() && endpoint.is_none() {
            tracing::warn!(
                service_type = ?self.service_type,
                region = ?self.region,
                "no catalog endpoint matched"
            );
        }

        self.store.set(TokenState {
            token: SecretString::new(access.token.id.into_boxed_str()),
            expires,
            endpoint,
            tenant_id: access.token.tenant.map(|t| t.id),
        });

        tracing::debug!(expires = ?expires, "identity token stored");
        Ok(())
    }
}

// Identity v2.0 response shapes

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
    expires: Option<String>,
    tenant: Option<Tenant>,
}

#[derive(Debug, Deserialize)]
struct Tenant {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogEndpoint {
    region: Option<String>,
    #[serde(rename = "publicURL")]
    public_url: Option<String>,
}
