//! Authentication orchestrator
//!
//! Looks up the local record for an identifier and routes the attempt by the
//! record's logon type: local credential hash verification, or delegation to
//! the directory. Every ordinary failure is a plain [`AuthOutcome::Denied`];
//! only deployment defects surface as `Err`.

mod hooks;

pub use hooks::{EmailPopulator, ErrorHook, PopulateHook};

use crate::ldap::{DirectoryServerPool, DirectoryUser};
use adgate_core::config::AuthConfig;
use adgate_core::types::{Identity, LocalIdentityRecord, LogonType};
use adgate_core::{Error, Result};
use adgate_crypto::CredentialHasher;
use adgate_metadata::LocalIdentityStore;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of one authentication attempt
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Authenticated(Identity),
    Denied,
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthOutcome::Authenticated(identity) => Some(identity),
            AuthOutcome::Denied => None,
        }
    }

    pub fn into_identity(self) -> Option<Identity> {
        match self {
            AuthOutcome::Authenticated(identity) => Some(identity),
            AuthOutcome::Denied => None,
        }
    }
}

pub struct AuthenticationOrchestrator {
    store: Arc<dyn LocalIdentityStore>,
    directory: Arc<DirectoryServerPool>,
    hasher: Arc<CredentialHasher>,
    permit_empty_password: bool,
    populate_hook: Option<Arc<dyn PopulateHook>>,
    error_hook: Option<Arc<dyn ErrorHook>>,
}

impl AuthenticationOrchestrator {
    pub fn new(
        store: Arc<dyn LocalIdentityStore>,
        directory: Arc<DirectoryServerPool>,
        hasher: CredentialHasher,
    ) -> Self {
        Self {
            store,
            directory,
            hasher: Arc::new(hasher),
            permit_empty_password: false,
            populate_hook: None,
            error_hook: None,
        }
    }

    pub fn with_config(self, config: &AuthConfig) -> Self {
        self.with_permit_empty_password(config.permit_empty_password)
    }

    /// Delegate empty secrets to the directory instead of denying them.
    ///
    /// Many directories treat a simple bind with an empty password as an
    /// anonymous bind and report success.
    pub fn with_permit_empty_password(mut self, permit: bool) -> Self {
        if permit {
            warn!("Empty passwords will be passed to the directory");
        }
        self.permit_empty_password = permit;
        self
    }

    pub fn with_populate_hook(mut self, hook: Arc<dyn PopulateHook>) -> Self {
        self.populate_hook = Some(hook);
        self
    }

    pub fn with_error_hook(mut self, hook: Arc<dyn ErrorHook>) -> Self {
        self.error_hook = Some(hook);
        self
    }

    pub fn directory(&self) -> &Arc<DirectoryServerPool> {
        &self.directory
    }

    /// Authenticate `identifier` (username, email or phone) with `secret`
    pub async fn authenticate(&self, identifier: &str, secret: &str) -> Result<AuthOutcome> {
        let record = match self.store.find_by_natural_key(identifier).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                // Same hashing cost as a wrong password for a known user
                self.verify_credential(secret, None).await;
                info!("Failed to login: {}", identifier);
                return Ok(AuthOutcome::Denied);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(code = e.code(), "Identity lookup for {} failed: {}", identifier, e);
                self.verify_credential(secret, None).await;
                return Ok(AuthOutcome::Denied);
            }
        };

        match record.logon_type {
            LogonType::Local => Ok(self.authenticate_local(&record, secret).await),
            LogonType::Directory => self.authenticate_directory(&record, secret).await,
        }
    }

    /// Load an identity by id without authenticating it
    pub async fn get_identity(&self, id: &str) -> Result<Option<Identity>> {
        let record = self.store.find_by_id(id).await?;
        Ok(record.as_ref().map(Identity::from_record))
    }

    async fn authenticate_local(&self, record: &LocalIdentityRecord, secret: &str) -> AuthOutcome {
        if self
            .verify_credential(secret, record.credential_hash.clone())
            .await
        {
            info!("Completed local login: {}", record.username);
            AuthOutcome::Authenticated(Identity::from_record(record))
        } else {
            info!("Failed to login: {}", record.username);
            AuthOutcome::Denied
        }
    }

    /// Argon2 verification on the blocking pool. A record without a stored
    /// hash, or with one that does not parse, is checked against the
    /// placeholder and never matches.
    async fn verify_credential(&self, secret: &str, stored: Option<String>) -> bool {
        let hasher = Arc::clone(&self.hasher);
        let secret = secret.to_string();

        let verified = tokio::task::spawn_blocking(move || match stored {
            Some(hash) => hasher.verify(&secret, &hash).map_err(|e| {
                hasher.verify_placeholder(&secret);
                e
            }),
            None => Ok(hasher.verify_placeholder(&secret)),
        })
        .await;

        match verified {
            Ok(Ok(matched)) => matched,
            Ok(Err(e)) => {
                let err = Error::CredentialHash(e.to_string());
                error!(code = err.code(), "{}", err);
                false
            }
            Err(e) => {
                error!("Credential verification task failed: {}", e);
                false
            }
        }
    }

    async fn authenticate_directory(
        &self,
        record: &LocalIdentityRecord,
        secret: &str,
    ) -> Result<AuthOutcome> {
        if secret.is_empty() && !self.permit_empty_password {
            info!("Rejected empty password for directory user {}", record.username);
            return Ok(AuthOutcome::Denied);
        }

        info!("Authenticating {} against the directory", record.username);
        let mut user = DirectoryUser::new(Arc::clone(&self.directory), &record.username);
        let outcome = self.directory_login(&mut user, record, secret).await;
        user.logout().await;
        outcome
    }

    async fn directory_login(
        &self,
        user: &mut DirectoryUser,
        record: &LocalIdentityRecord,
        secret: &str,
    ) -> Result<AuthOutcome> {
        if let Err(e) = user.login(secret).await {
            self.report("login", &record.username, &e);
            if e.is_fatal() {
                return Err(e);
            }
            info!("Failed to login with directory: {}", record.username);
            return Ok(AuthOutcome::Denied);
        }

        let mut identity = Identity::from_record(record);
        identity.distinguished_name = user.cached_dn().map(str::to_string);

        if let Some(hook) = &self.populate_hook {
            if let Err(e) = hook.populate(&mut identity, user).await {
                self.report("populate", &record.username, &e);
                if e.is_fatal() {
                    return Err(e);
                }
            }
        }

        info!("Directory login completed: {}", record.username);
        Ok(AuthOutcome::Authenticated(identity))
    }

    fn report(&self, context: &str, username: &str, error: &Error) {
        let cause = error.root_cause();
        warn!(
            code = cause.code(),
            "Directory {} failed for {}: {}", context, username, cause
        );

        if let Some(hook) = &self.error_hook {
            hook.on_directory_error(context, username, error);
        }
    }
}
