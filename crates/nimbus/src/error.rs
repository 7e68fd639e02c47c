//! Error types for the nimbus client
//!
//! Every failure of a pipeline run comes back through one [`Error`] value:
//! the transport failed, the provider answered with a status code listed in
//! its fail-code table, the failure body could not be decoded, or the
//! authentication round trip failed.

use nimbus_transport::TransportError;
use thiserror::Error;

/// Result type alias for operations that can fail with a nimbus error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the nimbus client.
#[derive(Debug, Error)]
pub enum Error {
    /// Network or connection failure reported by the transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The provider answered with a status code from its fail-code table.
    #[error("{provider} Error ({code}): {reason}")]
    Provider {
        /// Provider name, e.g. `rackspace`
        provider: String,
        /// Status code as a string key
        code: String,
        /// Reason from the fail-code table
        reason: String,
        /// The response body decoded as JSON
        result: serde_json::Value,
    },

    /// A failure status whose body is not valid JSON.
    #[error("{provider} Error ({code}): {reason} (unparseable error body)")]
    MalformedErrorBody {
        /// Provider name
        provider: String,
        /// Status code as a string key
        code: String,
        /// Reason from the fail-code table
        reason: String,
        /// Raw body, lossily decoded
        body: String,
        /// Decoder failure
        #[source]
        source: serde_json::Error,
    },

    /// The authentication round trip failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The URL builder could not produce a request URI.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Streaming body or pipeline task error.
    #[error("Streaming error: {0}")]
    Streaming(String),

    /// Missing required configuration.
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    /// Configuration value that cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Status code of a provider failure, if this is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Provider { code, .. } | Error::MalformedErrorBody { code, .. } => {
                code.parse().ok()
            }
            _ => None,
        }
    }

    /// Decoded failure body of a provider error.
    pub fn result(&self) -> Option<&serde_json::Value> {
        if let Error::Provider { result, .. } = self {
            Some(result)
        } else {
            None
        }
    }

    /// True when the failure happened before a response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_error_message() {
        let err = Error::Provider {
            provider: "rackspace".into(),
            code: "404".into(),
            reason: "Item not found".into(),
            result: json!({"itemNotFound": {"code": 404}}),
        };

        assert_eq!(err.to_string(), "rackspace Error (404): Item not found");
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.result().unwrap()["itemNotFound"]["code"], 404);
    }

    #[test]
    fn test_malformed_body_keeps_source() {
        use std::error::Error as _;

        let source = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
        let err = Error::MalformedErrorBody {
            provider: "openstack".into(),
            code: "500".into(),
            reason: "Fault".into(),
            body: "<html>".into(),
            source,
        };

        assert!(err.to_string().starts_with("openstack Error (500): Fault"));
        assert!(err.source().is_some());
        assert!(err.result().is_none());
    }

    #[test]
    fn test_transport_conversion() {
        let err: Error = TransportError::Timeout.into();
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "Timeout");
    }
}
