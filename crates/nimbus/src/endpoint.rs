//! URL builders
//!
//! After hooks run, the pipeline hands the request's path segments to the
//! profile's [`UrlBuilder`]. This is where providers put region, API version
//! or account identifiers into the URI without the pipeline knowing about
//! them.

use crate::auth::TokenStore;
use crate::error::{Error, Result};
use url::Url;

/// Turns path segments into a request URI.
pub trait UrlBuilder: Send + Sync {
    /// Build the URI for `segments`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] when no URI can be formed.
    fn build(&self, segments: &[String]) -> Result<Url>;
}

impl<F> UrlBuilder for F
where
    F: Fn(&[String]) -> Result<Url> + Send + Sync,
{
    fn build(&self, segments: &[String]) -> Result<Url> {
        self(segments)
    }
}

/// Append `segments` to `base` as path segments.
///
/// Each segment is split on `/` and empty pieces are skipped, so
/// `"servers/detail"` and `["servers", "detail"]` give the same URI. Pieces are
/// percent-encoded.
pub fn join_segments(base: &Url, segments: &[String]) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| Error::InvalidUrl(format!("{base} cannot be a base URL")))?;
        path.pop_if_empty();
        for piece in segments
            .iter()
            .flat_map(|s| s.split('/'))
            .filter(|p| !p.is_empty())
        {
            path.push(piece);
        }
    }
    Ok(url)
}

/// Parse a URL, reporting failures as [`Error::InvalidUrl`].
pub fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))
}

/// Fixed base URL plus path segments.
#[derive(Debug, Clone)]
pub struct BaseUrlBuilder {
    base: Url,
}

impl BaseUrlBuilder {
    /// Builder rooted at `base`.
    pub fn new(base: &str) -> Result<Self> {
        Ok(Self {
            base: parse_url(base)?,
        })
    }

    /// The base URL.
    pub fn base(&self) -> &Url {
        &self.base
    }
}

impl UrlBuilder for BaseUrlBuilder {
    fn build(&self, segments: &[String]) -> Result<Url> {
        join_segments(&self.base, segments)
    }
}

/// Endpoint taken from the service catalog at authentication time.
///
/// Falls back to a fixed base URL while no catalog endpoint is known.
#[derive(Debug, Clone)]
pub struct CatalogUrlBuilder {
    store: TokenStore,
    fallback: Option<Url>,
}

impl CatalogUrlBuilder {
    /// Builder reading the endpoint from `store`.
    pub fn new(store: TokenStore) -> Self {
        Self {
            store,
            fallback: None,
        }
    }

    /// Use `base` when the catalog has no endpoint.
    pub fn fallback(mut self, base: &str) -> Result<Self> {
        self.fallback = Some(parse_url(base)?);
        Ok(self)
    }
}

impl UrlBuilder for CatalogUrlBuilder {
    fn build(&self, segments: &[String]) -> Result<Url> {
        let base = match self.store.endpoint() {
            Some(endpoint) => parse_url(&endpoint)?,
            None => self.fallback.clone().ok_or_else(|| {
                Error::InvalidUrl(
                    "no service endpoint known; authenticate first or configure base_url"
                        .to_string(),
                )
            })?,
        };
        join_segments(&base, segments)
    }
}
