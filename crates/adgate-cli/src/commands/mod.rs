//! CLI command implementations

pub mod authenticate;
pub mod directory;
pub mod hash;
pub mod uac;

use crate::OutputFormat;
use adgate_auth::{AuthenticationOrchestrator, DirectoryServerPool, Ldap3Transport};
use adgate_core::AdgateConfig;
use adgate_crypto::CredentialHasher;
use adgate_metadata::MemoryIdentityStore;
use crate::utils::read_secret;
use anyhow::{bail, Context, Result};
use std::sync::Arc;

/// Context passed to all commands
pub struct CommandContext {
    pub config: AdgateConfig,
    pub output_format: OutputFormat,
    pub verbose: bool,
    pub quiet: bool,
}

impl CommandContext {
    /// Check if output should be JSON
    pub fn is_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Print info message if not quiet
    pub fn info(&self, msg: &str) {
        if !self.quiet && !self.is_json() {
            println!("{}", msg);
        }
    }

    /// Print verbose message if verbose mode
    pub fn debug(&self, msg: &str) {
        if self.verbose {
            eprintln!("[DEBUG] {}", msg);
        }
    }

    /// Read a secret that will be sent to the directory in a simple bind.
    /// Empty secrets are refused unless explicitly permitted.
    pub fn directory_secret(&self, provided: Option<String>, prompt: &str) -> Result<String> {
        let secret = read_secret(provided, prompt)?;
        if secret.is_empty() && !self.config.auth.permit_empty_password {
            bail!("Empty passwords are not sent to the directory");
        }
        Ok(secret)
    }

    /// Directory pool over the real LDAP transport
    pub fn pool(&self) -> Result<Arc<DirectoryServerPool>> {
        let directory = &self.config.directory;
        let transport = Arc::new(Ldap3Transport::new(directory.skip_tls_verify));
        let pool = DirectoryServerPool::from_config(directory, transport)
            .context("Invalid [directory] configuration")?;

        self.debug(&format!(
            "Directory pool: {} endpoint(s), base {}",
            pool.endpoints().len(),
            pool.base_dn()
        ));
        Ok(Arc::new(pool))
    }

    /// Orchestrator over the configured users file and directory pool
    pub async fn orchestrator(&self) -> Result<AuthenticationOrchestrator> {
        let store = match &self.config.auth.users_file {
            Some(path) => MemoryIdentityStore::from_file(path).await?,
            None => MemoryIdentityStore::new(),
        };
        if store.is_empty().await {
            self.debug("Local identity store is empty");
        }

        // Local-only deployments run without servers; directory users then
        // fail with a configuration error
        let directory = &self.config.directory;
        let pool = if directory.servers.is_empty() {
            self.debug("No directory servers configured");
            let transport = Arc::new(Ldap3Transport::new(directory.skip_tls_verify));
            Arc::new(DirectoryServerPool::new(
                &directory.prefix,
                &directory.base_dn,
                transport,
            ))
        } else {
            self.pool()?
        };

        let hasher = CredentialHasher::new()?;
        Ok(AuthenticationOrchestrator::new(Arc::new(store), pool, hasher)
            .with_config(&self.config.auth))
    }
}
