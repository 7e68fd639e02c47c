//! Provider profiles shipped with nimbus
//!
//! Each submodule builds a [`ProviderProfile`](crate::profile::ProviderProfile)
//! from a [`ClientConfig`]. Other providers can be plugged in by building a
//! profile by hand and passing it to
//! [`ClientBuilder::profile`](crate::client::ClientBuilder::profile).

pub mod openstack;
pub mod rackspace;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::profile::ProviderProfile;
use std::fmt;
use std::str::FromStr;

/// Service type used when the client is built from configuration alone.
pub const DEFAULT_SERVICE: &str = "compute";

/// Known providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Stock OpenStack with Keystone password auth
    OpenStack,
    /// Rackspace Cloud with API-key auth
    Rackspace,
}

impl Provider {
    /// Lower-case provider name, as used in errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenStack => "openstack",
            Provider::Rackspace => "rackspace",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openstack" => Ok(Provider::OpenStack),
            "rackspace" => Ok(Provider::Rackspace),
            other => Err(Error::InvalidConfig(format!("unknown provider: {other}"))),
        }
    }
}

/// Build the profile for `config.provider` and [`DEFAULT_SERVICE`].
///
/// # Errors
///
/// Returns [`Error::MissingConfig`] when the configuration lacks the provider
/// or the credentials it needs.
pub fn profile_for(config: &ClientConfig) -> Result<ProviderProfile> {
    config.validate()?;
    match config.provider {
        Some(Provider::OpenStack) => openstack::profile(config, DEFAULT_SERVICE),
        Some(Provider::Rackspace) => rackspace::profile(config, DEFAULT_SERVICE),
        None => Err(Error::MissingConfig("provider".to_string())),
    }
}
