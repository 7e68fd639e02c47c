//! The canonical request description handed through the pipeline

use bytes::Bytes;
use http::Method;
use serde::Serialize;
use std::collections::HashMap;

/// Path of a request as a sequence of segments.
///
/// A bare string is a one-element sequence. The URL builder decides how the
/// segments become a URI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestPath(Vec<String>);

impl RequestPath {
    /// Build from segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The segments in order.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Append a segment.
    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    /// True if there are no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for RequestPath {
    fn from(path: &str) -> Self {
        Self(vec![path.to_string()])
    }
}

impl From<String> for RequestPath {
    fn from(path: String) -> Self {
        Self(vec![path])
    }
}

impl From<Vec<String>> for RequestPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<Vec<&str>> for RequestPath {
    fn from(segments: Vec<&str>) -> Self {
        Self::new(segments)
    }
}

impl<const N: usize> From<[&str; N]> for RequestPath {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

/// A logical request, before the URI is resolved.
///
/// Built once per call by normalization, rewritten only by pre-request hooks
/// and read-only from URL resolution onward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: Method,
    /// Path segments handed to the URL builder
    pub path: RequestPath,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Buffered body, if any
    pub body: Option<Bytes>,
    /// Query parameters in insertion order
    pub query: Vec<(String, String)>,
    /// Body is streamed in through the request handle
    pub upload: bool,
    /// Response body is streamed out through the request handle
    pub download: bool,
}

impl Default for RequestDescriptor {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: RequestPath::default(),
            headers: HashMap::new(),
            body: None,
            query: Vec::new(),
            upload: false,
            download: false,
        }
    }
}

impl RequestDescriptor {
    /// A descriptor with `method` and `path`, everything else defaulted.
    pub fn new(method: Method, path: impl Into<RequestPath>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Append a query parameter.
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a buffered body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> crate::Result<Self> {
        let body = serde_json::to_vec(value)?;
        self.body = Some(Bytes::from(body));
        self.headers
            .insert("content-type".to_string(), "application/json".to_string());
        Ok(self)
    }

    /// Mark as a streamed upload.
    pub fn upload(mut self) -> Self {
        self.upload = true;
        self
    }

    /// Mark as a streamed download.
    pub fn download(mut self) -> Self {
        self.download = true;
        self
    }

    /// Form-urlencoded query string, `None` when it would be empty.
    pub fn encoded_query(&self) -> Option<String> {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        (!encoded.is_empty()).then_some(encoded)
    }

    /// Case-insensitive header lookup.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether a header is present, ignoring case.
    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }
}
