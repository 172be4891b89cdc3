//! Configuration for Adgate
//!
//! Example config:
//! ```toml
//! [directory]
//! PREFIX = "CORP"
//! BASE_DN = "dc=corp,dc=example,dc=com"
//! use_ssl = true
//! connect_timeout = 5
//!
//! [[directory.SERVERS]]
//! host = "dc1.corp.example.com"
//! port = 636
//!
//! [[directory.SERVERS]]
//! host = "dc2.corp.example.com"
//! port = 389
//! use_ssl = false
//!
//! [auth]
//! PERMIT_EMPTY_PASSWORD = false
//! users_file = "/etc/adgate/users.toml"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdgateConfig {
    #[serde(default)]
    pub directory: DirectoryConfigSection,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AdgateConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Configuration(format!("Failed to read config: {}", e)))?;

        let config = toml::from_str(&content)
            .map_err(|e| crate::Error::Configuration(format!("Failed to parse config: {}", e)))?;
        tracing::debug!("Loaded configuration from {}", path);
        Ok(config)
    }

    pub fn from_env() -> crate::Result<Self> {
        let mut config = Self::default();

        if let Ok(prefix) = std::env::var("ADGATE_PREFIX") {
            config.directory.prefix = prefix;
        }
        if let Ok(base_dn) = std::env::var("ADGATE_BASE_DN") {
            config.directory.base_dn = base_dn;
        }
        if let Ok(use_ssl) = std::env::var("ADGATE_USE_SSL") {
            config.directory.use_ssl = parse_bool(&use_ssl);
        }
        if let Ok(timeout) = std::env::var("ADGATE_CONNECT_TIMEOUT") {
            config.directory.connect_timeout = timeout.parse().map_err(|_| {
                crate::Error::Configuration(format!("Invalid ADGATE_CONNECT_TIMEOUT: {}", timeout))
            })?;
        }
        if let Ok(filter) = std::env::var("ADGATE_USER_FILTER") {
            config.directory.user_filter = filter;
        }
        // Parsed after use_ssl so bare host:port entries inherit it
        if let Ok(servers) = std::env::var("ADGATE_SERVERS") {
            config.directory.servers = servers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| ServerConfig::parse(s, config.directory.use_ssl))
                .collect::<crate::Result<Vec<_>>>()?;
        }
        if std::env::var("ADGATE_SELECTION").map(|v| v == "random").unwrap_or(false) {
            config.directory.selection = SelectionStrategy::Random;
        }
        if let Ok(permit) = std::env::var("ADGATE_PERMIT_EMPTY_PASSWORD") {
            config.auth.permit_empty_password = parse_bool(&permit);
        }
        if let Ok(path) = std::env::var("ADGATE_USERS_FILE") {
            config.auth.users_file = Some(PathBuf::from(path));
        }
        if let Ok(level) = std::env::var("ADGATE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("ADGATE_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Check everything a directory-backed deployment needs at startup
    pub fn validate(&self) -> crate::Result<()> {
        self.directory.validate()
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Endpoint selection strategy for the directory server pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Try endpoints in configured order, failing over on transport errors
    #[default]
    First,
    /// Start from a random endpoint, then fail over through the rest
    Random,
}

/// One configured directory server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    /// Overrides the section-wide `use_ssl` when set
    #[serde(default)]
    pub use_ssl: Option<bool>,
}

impl ServerConfig {
    /// Parse `ldap://host:port`, `ldaps://host:port`, `host:port` or `host`
    pub fn parse(spec: &str, default_ssl: bool) -> crate::Result<Self> {
        let (use_ssl, rest) = if let Some(rest) = spec.strip_prefix("ldaps://") {
            (Some(true), rest)
        } else if let Some(rest) = spec.strip_prefix("ldap://") {
            (Some(false), rest)
        } else {
            (None, spec)
        };
        let rest = rest.trim_end_matches('/');

        let ssl = use_ssl.unwrap_or(default_ssl);
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    crate::Error::Configuration(format!("Invalid port in server spec: {}", spec))
                })?;
                (host, port)
            }
            None => (rest, if ssl { 636 } else { 389 }),
        };

        if host.is_empty() {
            return Err(crate::Error::Configuration(format!(
                "Missing host in server spec: {}",
                spec
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            use_ssl,
        })
    }
}

/// Directory (LDAP/Active Directory) Configuration Section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfigSection {
    /// Domain short name prepended to the bind principal
    #[serde(default, alias = "PREFIX")]
    pub prefix: String,

    /// Search root
    #[serde(default, alias = "BASE_DN")]
    pub base_dn: String,

    /// Ordered list of directory servers
    #[serde(default, alias = "SERVERS")]
    pub servers: Vec<ServerConfig>,

    /// Default transport security for servers without their own setting
    #[serde(default = "default_true")]
    pub use_ssl: bool,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Skip TLS certificate verification (not recommended for production)
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// User search filter (use {username} placeholder)
    #[serde(default = "default_user_filter")]
    pub user_filter: String,

    /// Bind principal format (use {prefix} and {username} placeholders)
    #[serde(default = "default_bind_format")]
    pub bind_format: String,

    /// Server-side page size for searches
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default)]
    pub selection: SelectionStrategy,
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    crate::DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_user_filter() -> String {
    "(sAMAccountName={username})".to_string()
}

fn default_bind_format() -> String {
    "{prefix}\\{username}".to_string()
}

fn default_page_size() -> u32 {
    crate::DEFAULT_PAGE_SIZE
}

impl Default for DirectoryConfigSection {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            base_dn: String::new(),
            servers: Vec::new(),
            use_ssl: default_true(),
            connect_timeout: default_connect_timeout(),
            skip_tls_verify: false,
            user_filter: default_user_filter(),
            bind_format: default_bind_format(),
            page_size: default_page_size(),
            selection: SelectionStrategy::default(),
        }
    }
}

impl DirectoryConfigSection {
    pub fn validate(&self) -> crate::Result<()> {
        if self.servers.is_empty() {
            return Err(crate::Error::Configuration(
                "At least one directory server is required".into(),
            ));
        }

        if self.base_dn.is_empty() {
            return Err(crate::Error::Configuration("BASE_DN is required".into()));
        }

        if !self.user_filter.contains("{username}") {
            return Err(crate::Error::Configuration(
                "User filter must contain {username} placeholder".into(),
            ));
        }

        if !self.bind_format.contains("{username}") {
            return Err(crate::Error::Configuration(
                "Bind format must contain {username} placeholder".into(),
            ));
        }

        if self.page_size == 0 {
            return Err(crate::Error::Configuration("Page size must be positive".into()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Delegate to the directory even when the secret is empty
    #[serde(default, alias = "PERMIT_EMPTY_PASSWORD")]
    pub permit_empty_password: bool,

    /// TOML file seeding the local identity store
    #[serde(default)]
    pub users_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
