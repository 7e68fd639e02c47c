//! Provider status-code tables
//!
//! A [`FailCodeTable`] lists the status codes a provider answers with when a
//! call failed, keyed by the code as a string, with a human-readable reason.
//! Codes not in the table are treated as success.

use std::collections::HashMap;

/// Status codes that mean failure for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailCodeTable {
    codes: HashMap<String, String>,
}

impl FailCodeTable {
    /// An empty table; every response is a success.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn with(mut self, code: u16, reason: impl Into<String>) -> Self {
        self.codes.insert(code.to_string(), reason.into());
        self
    }

    /// Reason for a status code, if it is a failure code.
    pub fn reason(&self, code: &str) -> Option<&str> {
        self.codes.get(code).map(String::as_str)
    }

    /// Whether the code is listed.
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains_key(code)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// True when the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Codes shared by OpenStack-style compute and storage APIs.
    pub fn openstack() -> Self {
        Self::new()
            .with(400, "Bad Request")
            .with(401, "Unauthorized")
            .with(403, "Forbidden")
            .with(404, "Item not found")
            .with(405, "Bad Method")
            .with(409, "Build In Progress")
            .with(413, "Over Limit")
            .with(415, "Bad Media Type")
            .with(500, "Fault")
            .with(501, "Not Implemented")
            .with(503, "Service Unavailable")
    }

    /// Rackspace cloud codes.
    pub fn rackspace() -> Self {
        Self::openstack()
            .with(403, "Resize not allowed")
            .with(422, "Unprocessable Entity")
            .with(502, "Bad Gateway")
    }
}

impl<S: Into<String>> FromIterator<(u16, S)> for FailCodeTable {
    fn from_iter<T: IntoIterator<Item = (u16, S)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::new(), |table, (code, reason)| table.with(code, reason))
    }
}
