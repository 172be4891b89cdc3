//! Local identity types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which authentication path a local record takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogonType {
    /// Verify the secret against the stored credential hash
    #[default]
    Local,
    /// Delegate to the directory service
    #[serde(alias = "LDAP")]
    Directory,
}

impl fmt::Display for LogonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogonType::Local => write!(f, "LOCAL"),
            LogonType::Directory => write!(f, "DIRECTORY"),
        }
    }
}

/// A user record held by the local identity store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalIdentityRecord {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// PHC-format credential hash; absent for directory-only accounts
    #[serde(default)]
    pub credential_hash: Option<String>,
    #[serde(default)]
    pub logon_type: LogonType,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl LocalIdentityRecord {
    pub fn new(id: impl Into<String>, username: impl Into<String>, logon_type: LogonType) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: None,
            phone: None,
            credential_hash: None,
            logon_type,
            permissions: Vec::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_credential_hash(mut self, hash: impl Into<String>) -> Self {
        self.credential_hash = Some(hash.into());
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Whether `key` is one of the natural keys of this record
    pub fn matches_natural_key(&self, key: &str) -> bool {
        self.username == key
            || self.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(key))
            || self.phone.as_deref() == Some(key)
    }
}

/// An authenticated identity handed back to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub logon_type: LogonType,
    pub permissions: Vec<String>,
    /// Distinguished name, for directory-backed identities
    pub distinguished_name: Option<String>,
    pub authenticated_at: DateTime<Utc>,
}

impl Identity {
    pub fn from_record(record: &LocalIdentityRecord) -> Self {
        Self {
            id: record.id.clone(),
            username: record.username.clone(),
            email: record.email.clone(),
            logon_type: record.logon_type,
            permissions: record.permissions.clone(),
            distinguished_name: None,
            authenticated_at: Utc::now(),
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.username, self.logon_type)
    }
}
