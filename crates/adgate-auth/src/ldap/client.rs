//! LDAP wire client
//!
//! Production [`DirectoryTransport`] built on `ldap3`. Supports LDAPS
//! endpoints directly and upgrades plain LDAP sessions with STARTTLS on
//! demand.

use super::transport::{DirectorySession, DirectoryTransport};
use super::types::*;
use adgate_core::{Error, Result, PAGED_RESULTS_OID};
use async_trait::async_trait;
use ldap3::controls::{Control, ControlType, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Mod, Scope, SearchEntry};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Opens `ldap3` sessions
#[derive(Debug, Clone, Default)]
pub struct Ldap3Transport {
    skip_tls_verify: bool,
}

impl Ldap3Transport {
    pub fn new(skip_tls_verify: bool) -> Self {
        if skip_tls_verify {
            warn!("TLS certificate verification is disabled for directory connections");
        }
        Self { skip_tls_verify }
    }

    /// Create LDAP connection with proper TLS settings
    async fn create_connection(&self, endpoint: &ServerEndpoint, starttls: bool) -> Result<Ldap> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(endpoint.connect_timeout())
            .set_starttls(starttls)
            .set_no_tls_verify(self.skip_tls_verify);

        debug!("Connecting to directory server: {}", endpoint);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &endpoint.url())
            .await
            .map_err(|e| {
                Error::Transport(format!("Failed to connect to {}: {}", endpoint, e))
            })?;

        ldap3::drive!(conn);
        Ok(ldap)
    }
}

#[async_trait]
impl DirectoryTransport for Ldap3Transport {
    async fn open(&self, endpoint: &ServerEndpoint) -> Result<Box<dyn DirectorySession>> {
        let ldap = self.create_connection(endpoint, false).await?;

        Ok(Box::new(Ldap3Session {
            ldap,
            endpoint: endpoint.clone(),
            transport: self.clone(),
            encrypted: endpoint.use_tls(),
            credentials: None,
        }))
    }
}

/// One `ldap3` connection
struct Ldap3Session {
    ldap: Ldap,
    endpoint: ServerEndpoint,
    transport: Ldap3Transport,
    encrypted: bool,
    credentials: Option<(String, String)>,
}

#[async_trait]
impl DirectorySession for Ldap3Session {
    async fn simple_bind(&mut self, principal: &str, secret: &str) -> Result<OperationResult> {
        let result = self
            .ldap
            .simple_bind(principal, secret)
            .await
            .map_err(|e| transport_error("Bind", e))?;

        if result.rc == 0 {
            self.credentials = Some((principal.to_string(), secret.to_string()));
        }

        Ok(OperationResult::new(result.rc, result.text))
    }

    async fn search_page(&mut self, request: &SearchRequest, cookie: &[u8]) -> Result<SearchPage> {
        let control = PagedResults {
            size: request.page_size as i32,
            cookie: cookie.to_vec(),
        };
        let attrs: Vec<&str> = request.attributes.iter().map(String::as_str).collect();

        let (rs, res) = self
            .ldap
            .with_controls(control)
            .search(&request.base_dn, Scope::Subtree, &request.filter, attrs)
            .await
            .map_err(|e| transport_error("Search", e))?
            .success()
            .map_err(|e| operation_error("Search", e))?;

        let cookie = res
            .ctrls
            .iter()
            .find_map(|ctrl| match ctrl {
                Control(Some(ControlType::PagedResults), raw) => {
                    Some(raw.parse::<PagedResults>().cookie)
                }
                Control(None, raw) if raw.ctype == PAGED_RESULTS_OID => {
                    Some(raw.parse::<PagedResults>().cookie)
                }
                _ => None,
            })
            .unwrap_or_default();

        // Continuation references carry no attributes
        let entries = rs
            .into_iter()
            .filter(|entry| !entry.is_ref())
            .map(SearchEntry::construct)
            .map(|entry| DirectoryEntry {
                dn: entry.dn,
                attributes: entry.attrs,
            })
            .collect::<Vec<_>>();

        debug!(
            "Search page from {} returned {} entries",
            self.endpoint,
            entries.len()
        );
        Ok(SearchPage::new(entries, cookie))
    }

    async fn start_tls(&mut self) -> Result<()> {
        if self.encrypted {
            return Ok(());
        }

        // ldap3 negotiates StartTLS only at connect time, so reconnect and
        // restore the previous bind
        debug!("Reconnecting to {} with StartTLS", self.endpoint);
        let mut upgraded = self.transport.create_connection(&self.endpoint, true).await?;

        if let Some((principal, secret)) = &self.credentials {
            let result = upgraded
                .simple_bind(principal, secret)
                .await
                .map_err(|e| transport_error("Bind", e))?;

            if result.rc != 0 {
                if let Err(e) = upgraded.unbind().await {
                    debug!("Unbind after failed StartTLS rebind: {}", e);
                }
                return Err(Error::Bind {
                    code: result.rc,
                    message: result.text,
                });
            }
        }

        if let Err(e) = self.ldap.unbind().await {
            debug!("Unbind of plaintext session to {}: {}", self.endpoint, e);
        }
        self.ldap = upgraded;
        self.encrypted = true;
        Ok(())
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    async fn modify(
        &mut self,
        dn: &str,
        changes: Vec<AttributeChange>,
    ) -> Result<OperationResult> {
        let mods: Vec<Mod<Vec<u8>>> = changes
            .into_iter()
            .map(|change| match change {
                AttributeChange::Add(attr, values) => Mod::Add(attr.into_bytes(), value_set(values)),
                AttributeChange::Delete(attr, values) => {
                    Mod::Delete(attr.into_bytes(), value_set(values))
                }
                AttributeChange::Replace(attr, values) => {
                    Mod::Replace(attr.into_bytes(), value_set(values))
                }
            })
            .collect();

        let result = self
            .ldap
            .modify(dn, mods)
            .await
            .map_err(|e| transport_error("Modify", e))?;

        Ok(OperationResult::new(result.rc, result.text))
    }

    async fn unbind(&mut self) -> Result<()> {
        self.credentials = None;
        self.ldap
            .unbind()
            .await
            .map_err(|e| transport_error("Unbind", e))
    }
}

fn value_set(values: Vec<Vec<u8>>) -> HashSet<Vec<u8>> {
    values.into_iter().collect()
}

fn transport_error(operation: &str, e: LdapError) -> Error {
    Error::Transport(format!("{} failed: {}", operation, e))
}

/// Keep the server's result code when the operation itself was refused
fn operation_error(operation: &str, e: LdapError) -> Error {
    match e {
        LdapError::LdapResult { result } => Error::Operation {
            code: result.rc,
            message: result.text,
        },
        other => transport_error(operation, other),
    }
}
