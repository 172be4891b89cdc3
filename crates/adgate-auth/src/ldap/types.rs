//! Directory types
//!
//! Endpoints, typed entries, search pages and operation results shared by the
//! transport, connection and user layers.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Attribute holding the Active Directory password
pub const UNICODE_PWD: &str = "unicodePwd";

/// Request every user attribute
pub const ALL_ATTRIBUTES: &str = "*";

// ============================================================================
// Server Endpoint
// ============================================================================

/// One directory server. Immutable once added to a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    host: String,
    port: u16,
    use_tls: bool,
    connect_timeout: Duration,
}

impl ServerEndpoint {
    pub fn new(host: impl Into<String>, port: u16, use_tls: bool, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls,
            connect_timeout,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// `ldaps://host:port` or `ldap://host:port`
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

// ============================================================================
// Directory Entry
// ============================================================================

/// A directory entry: its DN and a mapping from attribute name to values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// All values of an attribute. Attribute names match case-insensitively.
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes
            .get(name)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, values)| values)
            })
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First value of an attribute
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }
}

// ============================================================================
// Search
// ============================================================================

/// One subtree search, repeated per page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub filter: String,
    pub attributes: Vec<String>,
    pub page_size: u32,
}

/// One page of results plus the server's continuation cookie
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub entries: Vec<DirectoryEntry>,
    pub cookie: Vec<u8>,
}

impl SearchPage {
    pub fn new(entries: Vec<DirectoryEntry>, cookie: impl Into<Vec<u8>>) -> Self {
        Self {
            entries,
            cookie: cookie.into(),
        }
    }

    /// An empty cookie ends the paged search
    pub fn is_last(&self) -> bool {
        self.cookie.is_empty()
    }
}

// ============================================================================
// Operation Results
// ============================================================================

/// Result code and diagnostic text of a directory operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub code: u32,
    pub message: String,
}

impl OperationResult {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn success() -> Self {
        Self::new(0, "")
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "code {}", self.code)
        } else {
            write!(f, "code {}: {}", self.code, self.message)
        }
    }
}

/// One attribute modification with binary values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeChange {
    Add(String, Vec<Vec<u8>>),
    Delete(String, Vec<Vec<u8>>),
    Replace(String, Vec<Vec<u8>>),
}

/// Outcome of an in-place password change
#[derive(Debug, Clone, Serialize)]
pub struct PasswordChange {
    pub success: bool,
    pub detail: OperationResult,
}
