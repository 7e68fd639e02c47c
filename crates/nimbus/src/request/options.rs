//! Call shapes accepted by [`Client::request`](crate::Client::request)
//!
//! Each variant is one of the ways a caller can describe a request. They all
//! normalize to a single [`RequestDescriptor`].

use super::descriptor::{RequestDescriptor, RequestPath};
use http::Method;

/// The accepted request shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOptions {
    /// A fully built descriptor, used as is.
    Descriptor(RequestDescriptor),

    /// A path alone; the method is GET.
    Path(RequestPath),

    /// Method and path.
    MethodPath {
        /// HTTP method
        method: Method,
        /// Request path
        path: RequestPath,
    },

    /// Method, path and query parameters.
    MethodPathQuery {
        /// HTTP method
        method: Method,
        /// Request path
        path: RequestPath,
        /// Query parameters in insertion order
        query: Vec<(String, String)>,
    },
}

impl RequestOptions {
    /// Method + path + query shape.
    pub fn with_query<I, K, V>(method: Method, path: impl Into<RequestPath>, query: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::MethodPathQuery {
            method,
            path: path.into(),
            query: query
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Produce the canonical descriptor for this call shape.
    pub fn normalize(self) -> RequestDescriptor {
        match self {
            Self::Descriptor(descriptor) => descriptor,
            Self::Path(path) => RequestDescriptor::new(Method::GET, path),
            Self::MethodPath { method, path } => RequestDescriptor::new(method, path),
            Self::MethodPathQuery {
                method,
                path,
                query,
            } => RequestDescriptor {
                query,
                ..RequestDescriptor::new(method, path)
            },
        }
    }
}

impl From<RequestDescriptor> for RequestOptions {
    fn from(descriptor: RequestDescriptor) -> Self {
        Self::Descriptor(descriptor)
    }
}

impl From<&str> for RequestOptions {
    fn from(path: &str) -> Self {
        Self::Path(path.into())
    }
}

impl From<String> for RequestOptions {
    fn from(path: String) -> Self {
        Self::Path(path.into())
    }
}

impl From<RequestPath> for RequestOptions {
    fn from(path: RequestPath) -> Self {
        Self::Path(path)
    }
}

impl<P: Into<RequestPath>> From<(Method, P)> for RequestOptions {
    fn from((method, path): (Method, P)) -> Self {
        Self::MethodPath {
            method,
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::descriptor(RequestOptions::Descriptor(RequestDescriptor::new(Method::GET, "servers")))]
    #[case::path(RequestOptions::from("servers"))]
    #[case::method_path(RequestOptions::from((Method::GET, "servers")))]
    #[case::empty_query(RequestOptions::with_query(Method::GET, "servers", Vec::<(String, String)>::new()))]
    fn test_equivalent_shapes_without_query(#[case] options: RequestOptions) {
        let descriptor = options.normalize();
        assert_eq!(descriptor.method, Method::GET);
        assert_eq!(descriptor.path, RequestPath::from("servers"));
        assert_eq!(descriptor.encoded_query(), None);
        assert!(descriptor.headers.is_empty());
    }

    #[rstest]
    #[case::descriptor(RequestOptions::Descriptor(
        RequestDescriptor::new(Method::DELETE, "servers").query_param("force", "true")
    ))]
    #[case::method_path_query(RequestOptions::with_query(Method::DELETE, "servers", [("force", "true")]))]
    fn test_equivalent_shapes_with_query(#[case] options: RequestOptions) {
        let descriptor = options.normalize();
        assert_eq!(descriptor.method, Method::DELETE);
        assert_eq!(descriptor.path, RequestPath::from("servers"));
        assert_eq!(descriptor.encoded_query().as_deref(), Some("force=true"));
    }

    #[test]
    fn test_descriptor_passes_through_untouched() {
        let original = RequestDescriptor::new(Method::PUT, ["container", "object"])
            .header("x-object-meta-color", "blue")
            .upload();
        let descriptor = RequestOptions::from(original.clone()).normalize();
        assert_eq!(descriptor, original);
    }
}
