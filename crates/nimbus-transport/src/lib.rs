//! HTTP transport abstraction layer for nimbus
//!
//! Provides the trait-based transport the request pipeline dispatches through.
//! The pipeline never talks to reqwest directly: it hands a fully-formed
//! [`HttpRequest`] to a [`Transport`] and gets back either a buffered
//! [`HttpResponse`] or a [`StreamingResponse`].
//!
//! # Architecture
//!
//! - **Transport trait**: Generic interface for any transport implementation
//! - **HTTP transport**: reqwest-backed client with streaming request bodies

#![deny(unsafe_code)]
#![warn(missing_docs)]
//! - **Mock transport**: recording transport for tests (`testing` feature)
//! - **Error handling**: Unified error type for transport failures
//!
//! # Usage
//!
//! ```ignore
//! use nimbus_transport::{HttpRequest, HttpTransport, Transport};
//!
//! let transport = HttpTransport::new()?;
//! let request = HttpRequest::new("GET", "https://identity.example.com/v2.0");
//! let response = transport.send_http(request).await?;
//! ```

pub mod error;
pub mod http;
#[cfg(any(test, feature = "testing"))]
pub mod mock;
pub mod traits;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use http::{HttpTransport, HttpTransportConfig};
#[cfg(any(test, feature = "testing"))]
pub use mock::{MockTransport, RecordedRequest};
pub use traits::{
    BodyStream, HttpRequest, HttpResponse, RequestBody, StreamingResponse, Transport,
};
