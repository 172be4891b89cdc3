//! Directory server pool
//!
//! Ordered set of endpoints with shared domain settings. Built once at
//! startup, then only read. Endpoint selection fails over to the next server
//! on transport errors; a bind rejected by a reachable server is final.

use super::connection::DirectoryConnection;
use super::transport::{DirectorySession, DirectoryTransport};
use super::types::ServerEndpoint;
use adgate_core::config::{DirectoryConfigSection, SelectionStrategy};
use adgate_core::{Error, Result, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_PAGE_SIZE};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct DirectoryServerPool {
    endpoints: Vec<ServerEndpoint>,
    strategy: SelectionStrategy,
    prefix: String,
    base_dn: String,
    user_filter: String,
    bind_format: String,
    page_size: u32,
    use_tls: bool,
    connect_timeout: Duration,
    transport: Arc<dyn DirectoryTransport>,
}

impl DirectoryServerPool {
    /// Empty pool. TLS is on and the connect timeout is 5 seconds unless
    /// overridden with [`with_defaults`](Self::with_defaults).
    pub fn new(
        prefix: impl Into<String>,
        base_dn: impl Into<String>,
        transport: Arc<dyn DirectoryTransport>,
    ) -> Self {
        Self {
            endpoints: Vec::new(),
            strategy: SelectionStrategy::First,
            prefix: prefix.into(),
            base_dn: base_dn.into(),
            user_filter: "(sAMAccountName={username})".to_string(),
            bind_format: "{prefix}\\{username}".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            use_tls: true,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            transport,
        }
    }

    /// Build a pool from the `[directory]` config section
    pub fn from_config(
        config: &DirectoryConfigSection,
        transport: Arc<dyn DirectoryTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let mut pool = Self::new(&config.prefix, &config.base_dn, transport)
            .with_defaults(config.use_ssl, Duration::from_secs(config.connect_timeout))
            .with_strategy(config.selection)
            .with_user_filter(&config.user_filter)
            .with_bind_format(&config.bind_format)
            .with_page_size(config.page_size);

        for server in &config.servers {
            pool.add_endpoint(&server.host, server.port, server.use_ssl, None);
        }

        info!(
            "Directory pool ready: {} endpoint(s), base {}, {:?} selection",
            pool.endpoints.len(),
            pool.base_dn,
            pool.strategy
        );
        Ok(pool)
    }

    pub fn with_defaults(mut self, use_tls: bool, connect_timeout: Duration) -> Self {
        self.use_tls = use_tls;
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_user_filter(mut self, filter: impl Into<String>) -> Self {
        self.user_filter = filter.into();
        self
    }

    pub fn with_bind_format(mut self, format: impl Into<String>) -> Self {
        self.bind_format = format.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Append an endpoint. Unset TLS and timeout fall back to the pool
    /// defaults.
    pub fn add_endpoint(
        &mut self,
        host: impl Into<String>,
        port: u16,
        use_tls: Option<bool>,
        connect_timeout: Option<Duration>,
    ) {
        let endpoint = ServerEndpoint::new(
            host,
            port,
            use_tls.unwrap_or(self.use_tls),
            connect_timeout.unwrap_or(self.connect_timeout),
        );
        debug!("Added directory endpoint {}", endpoint);
        self.endpoints.push(endpoint);
    }

    pub fn endpoints(&self) -> &[ServerEndpoint] {
        &self.endpoints
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Bind principal for a bare username, `PREFIX\username` by default
    pub fn principal(&self, username: &str) -> String {
        self.bind_format
            .replace("{prefix}", &self.prefix)
            .replace("{username}", username)
    }

    /// Search filter for a username, with filter metacharacters escaped
    pub fn user_filter(&self, username: &str) -> String {
        self.user_filter
            .replace("{username}", &ldap3::ldap_escape(username))
    }

    /// Endpoints in the order they should be tried
    fn selection_order(&self) -> Vec<&ServerEndpoint> {
        let start = match self.strategy {
            SelectionStrategy::First => 0,
            SelectionStrategy::Random => rand::rng().random_range(0..self.endpoints.len()),
        };

        self.endpoints[start..]
            .iter()
            .chain(self.endpoints[..start].iter())
            .collect()
    }

    /// Open a session on the first reachable endpoint
    async fn open_session(&self) -> Result<(Box<dyn DirectorySession>, ServerEndpoint)> {
        if self.endpoints.is_empty() {
            return Err(Error::Configuration(
                "Directory server pool has no endpoints".into(),
            ));
        }

        let mut last_error = None;
        for endpoint in self.selection_order() {
            match self.transport.open(endpoint).await {
                Ok(session) => {
                    debug!("Opened directory session on {}", endpoint);
                    return Ok((session, endpoint.clone()));
                }
                Err(e) => {
                    warn!("Directory server {} unavailable: {}", endpoint, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::Transport("No directory server reachable".into())))
    }

    /// Bind as `username` and keep the session open for further operations
    pub async fn connect(&self, username: &str, secret: &str) -> Result<DirectoryConnection> {
        let (session, endpoint) = self.open_session().await?;
        let mut conn = DirectoryConnection::new(
            session,
            endpoint,
            self.principal(username),
            secret,
            &self.base_dn,
            self.page_size,
        );

        if let Err(e) = conn.bind().await {
            if let Err(unbind_err) = conn.unbind().await {
                debug!("Unbind after failed bind: {}", unbind_err);
            }
            return Err(e);
        }

        Ok(conn)
    }

    /// Bind as `username` to verify the credentials, then unbind
    pub async fn probe(&self, username: &str, secret: &str) -> Result<()> {
        let conn = self.connect(username, secret).await?;
        let endpoint = conn.endpoint().clone();

        if let Err(e) = conn.unbind().await {
            debug!("Unbind after probe of {} failed: {}", endpoint, e);
        }
        Ok(())
    }
}

impl fmt::Display for DirectoryServerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<DirectoryServerPool> {} ({} endpoints)",
            self.base_dn,
            self.endpoints.len()
        )
    }
}

impl fmt::Debug for DirectoryServerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryServerPool")
            .field("endpoints", &self.endpoints)
            .field("strategy", &self.strategy)
            .field("prefix", &self.prefix)
            .field("base_dn", &self.base_dn)
            .finish_non_exhaustive()
    }
}
