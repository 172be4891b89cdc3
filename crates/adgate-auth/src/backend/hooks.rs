//! Callbacks injected into the authentication orchestrator

use crate::ldap::DirectoryUser;
use adgate_core::types::Identity;
use adgate_core::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

/// Runs after a successful directory login, before the session is released.
///
/// A failing hook is reported through the error hook but does not turn a
/// successful login into a denial.
#[async_trait]
pub trait PopulateHook: Send + Sync {
    async fn populate(&self, identity: &mut Identity, directory_user: &mut DirectoryUser)
        -> Result<()>;
}

/// Receives every directory failure the orchestrator collapses into a denial
pub trait ErrorHook: Send + Sync {
    /// `context` is the step that failed: `"login"` or `"populate"`
    fn on_directory_error(&self, context: &str, username: &str, error: &Error);
}

impl<F> ErrorHook for F
where
    F: Fn(&str, &str, &Error) + Send + Sync,
{
    fn on_directory_error(&self, context: &str, username: &str, error: &Error) {
        self(context, username, error)
    }
}

/// Copies the directory email onto the identity when the directory has one
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailPopulator;

#[async_trait]
impl PopulateHook for EmailPopulator {
    async fn populate(
        &self,
        identity: &mut Identity,
        directory_user: &mut DirectoryUser,
    ) -> Result<()> {
        if let Some(email) = directory_user.email().await? {
            debug!("Directory email for {}: {}", identity.username, email);
            identity.email = Some(email);
        }
        Ok(())
    }
}
