//! userAccountControl decoding
//!
//! The attribute is a signed 32-bit bitmask in Active Directory. Values are
//! kept as `i64` and tested bitwise, so a negative value decodes the same as
//! its two's complement bit pattern.

use adgate_core::Error;
use std::fmt;
use std::str::FromStr;

/// Known account control bits, in the order they are listed
pub const ACCOUNT_CONTROL_FLAGS: &[(&str, i64)] = &[
    ("SCRIPT", 1),
    ("ACCOUNTDISABLE", 2),
    ("HOMEDIR_REQUIRED", 8),
    ("LOCKOUT", 16),
    ("PASSWD_NOTREQD", 32),
    ("PASSWD_CANT_CHANGE", 64),
    ("ENCRYPTED_TEXT_PWD_ALLOWD", 128),
    ("TEMP_DUPLICATE_ACCOUNT", 256),
    ("NORMAL_ACCOUNT", 512),
    ("INTERDOMAIN_TRUST_ACCOUNT", 2048),
    ("WORKSTATION_TRUST_ACCOUNT", 4096),
    ("SERVER_TRUST_ACCOUNT", 8192),
    ("DONT_EXPIRE_PASSWORD", 65536),
    ("MNS_LOGON_ACCOUNT", 131072),
    ("SMARTCARD_REQUIRED", 262144),
    ("TRUSTED_FOR_DELEGATION", 524288),
    ("NOT_DELEGATED", 1048576),
    ("USE_DES_KEY_ONLY", 2097152),
    ("DONT_REQ_PREAUTH", 4194304),
    ("PASSWORD_EXPIRED", 8388608),
    ("TRUSTED_TO_AUTH_FOR_DELEGATION", 16777216),
    ("PARTIAL_SECRETS_ACCOUNT", 67108864),
];

const ACCOUNTDISABLE: i64 = 2;
const LOCKOUT: i64 = 16;
const PASSWORD_EXPIRED: i64 = 8388608;

/// Decoded userAccountControl value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountControlFlags {
    raw: i64,
}

impl AccountControlFlags {
    pub fn from_raw(raw: i64) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> i64 {
        self.raw
    }

    /// True when the named flag is set. Unknown names are never set.
    pub fn contains(&self, name: &str) -> bool {
        ACCOUNT_CONTROL_FLAGS
            .iter()
            .any(|(flag, bit)| flag.eq_ignore_ascii_case(name) && self.raw & bit != 0)
    }

    pub fn is_disabled(&self) -> bool {
        self.raw & ACCOUNTDISABLE != 0
    }

    pub fn is_locked(&self) -> bool {
        self.raw & LOCKOUT != 0
    }

    pub fn password_expired(&self) -> bool {
        self.raw & PASSWORD_EXPIRED != 0
    }

    /// Names of every set flag in table order. Bits outside the table are
    /// ignored.
    pub fn names(&self) -> Vec<&'static str> {
        ACCOUNT_CONTROL_FLAGS
            .iter()
            .filter(|(_, bit)| self.raw & bit != 0)
            .map(|(name, _)| *name)
            .collect()
    }
}

impl From<i64> for AccountControlFlags {
    fn from(raw: i64) -> Self {
        Self::from_raw(raw)
    }
}

impl FromStr for AccountControlFlags {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self::from_raw)
            .map_err(|_| Error::InvalidControlValue(s.to_string()))
    }
}

impl TryFrom<&str> for AccountControlFlags {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AccountControlFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(","))
    }
}
