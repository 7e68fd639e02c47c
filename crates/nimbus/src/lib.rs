//! # nimbus
//!
//! One request pipeline for several cloud providers:
//! - Several call shapes normalized into one request descriptor
//! - Pre-request hooks and per-provider URL builders
//! - Requests held behind authentication, with upload data buffered meanwhile
//! - Streamed uploads and downloads
//! - Provider errors classified from a per-provider fail-code table
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nimbus::{Client, ClientConfig, providers::Provider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::from_config(
//!         ClientConfig::new(Provider::Rackspace, "alice")
//!             .api_key("0123abcd")
//!             .region("DFW"),
//!     )?;
//!
//!     // Returned before authentication finishes; writes are buffered.
//!     let upload = client.upload(["photos", "cat.jpg"]);
//!     upload.pipe_from(tokio::fs::File::open("cat.jpg").await?).await?;
//!     let reply = upload.outcome().await?;
//!
//!     println!("uploaded: {}", reply.response.status);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Re-export commonly used types
pub use client::{Client, ClientBuilder, ClientState};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use fail_codes::FailCodeTable;
pub use hooks::BeforeHook;
pub use profile::ProviderProfile;
pub use request::{RequestDescriptor, RequestOptions, RequestPath};
pub use stream::{Reply, RequestHandle, ResponseHead, StreamBuffer};

// Module declarations
pub mod auth;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod fail_codes;
pub mod hooks;
pub mod observability;
mod pipeline;
pub mod profile;
pub mod providers;
pub mod request;
pub mod response;
pub mod stream;

// Re-export key dependencies for convenience
pub use async_trait::async_trait;
pub use http::Method;
pub use serde_json::Value as JsonValue;

/// Transport layer re-exports
pub mod transport {
    pub use nimbus_transport::{
        HttpRequest, HttpResponse, HttpTransport, HttpTransportConfig, RequestBody,
        StreamingResponse, Transport, TransportError,
    };
}

/// Prelude module for common imports
///
/// # Examples
///
/// ```rust
/// use nimbus::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BeforeHook, Client, ClientConfig, ClientState, Error, FailCodeTable, Method,
        ProviderProfile, Reply, RequestDescriptor, RequestHandle, RequestOptions, Result,
        providers::Provider,
    };
}

/// Crate version, automatically updated from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
