//! Per-attempt directory user
//!
//! Wraps one login: bind as the user, resolve the user's own entry on the same
//! session, answer attribute queries from the cached entry, then log out.

use super::connection::DirectoryConnection;
use super::flags::AccountControlFlags;
use super::pool::DirectoryServerPool;
use super::types::{DirectoryEntry, PasswordChange};
use adgate_core::{Error, Result};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryUserState {
    Unbound,
    Bound,
    Resolved,
    LoggedOut,
}

pub struct DirectoryUser {
    pool: Arc<DirectoryServerPool>,
    username: String,
    state: DirectoryUserState,
    conn: Option<DirectoryConnection>,
    entry: Option<DirectoryEntry>,
    email: Option<String>,
    last_error: Option<String>,
}

impl DirectoryUser {
    pub fn new(pool: Arc<DirectoryServerPool>, username: impl Into<String>) -> Self {
        Self {
            pool,
            username: username.into(),
            state: DirectoryUserState::Unbound,
            conn: None,
            entry: None,
            email: None,
            last_error: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn state(&self) -> DirectoryUserState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.conn.is_some()
    }

    /// Diagnostic from the most recent failed operation of this attempt
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Distinguished name, if the entry has been resolved
    pub fn cached_dn(&self) -> Option<&str> {
        self.entry.as_ref().map(|entry| entry.dn.as_str())
    }

    /// Bind as this user and resolve the user's entry on the same session.
    ///
    /// Every failure, whether transport, bind or a missing entry, is reported
    /// as `Error::LoginFailed` with the cause attached.
    pub async fn login(&mut self, secret: &str) -> Result<()> {
        if self.conn.is_some() {
            self.logout().await;
        }

        let connected = self.pool.connect(&self.username, secret).await;
        let conn = match connected {
            Ok(conn) => conn,
            Err(e) => return Err(self.login_failure(e)),
        };
        self.conn = Some(conn);
        self.state = DirectoryUserState::Bound;

        if let Err(e) = self.resolve_entry().await {
            self.logout().await;
            return Err(self.login_failure(e));
        }

        self.state = DirectoryUserState::Resolved;
        self.last_error = None;
        Ok(())
    }

    fn login_failure(&mut self, cause: Error) -> Error {
        debug!("Directory login for {} failed: {}", self.username, cause);
        self.last_error = Some(cause.to_string());
        Error::login_failed(cause)
    }

    /// Release the connection and drop cached attributes. Safe to call
    /// repeatedly.
    pub async fn logout(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.unbind().await {
                debug!("Unbind for {} failed: {}", self.username, e);
            }
        }

        self.entry = None;
        self.email = None;
        if self.state != DirectoryUserState::Unbound {
            self.state = DirectoryUserState::LoggedOut;
        }
    }

    fn connection(&mut self) -> Result<&mut DirectoryConnection> {
        self.conn.as_mut().ok_or(Error::NotBound)
    }

    async fn resolve_entry(&mut self) -> Result<&DirectoryEntry> {
        if self.entry.is_none() {
            let filter = self.pool.user_filter(&self.username);
            let found = self.connection()?.search(&filter, None).await?;

            let entry = found.into_iter().next().ok_or_else(|| {
                Error::Resolution(format!("No directory entry matches {}", filter))
            })?;
            debug!("Resolved {} to {}", self.username, entry.dn);
            self.entry = Some(entry);
        }

        self.entry.as_ref().ok_or(Error::NotBound)
    }

    /// The user's full entry with all attributes
    pub async fn entry(&mut self) -> Result<&DirectoryEntry> {
        self.resolve_entry().await
    }

    pub async fn user_dn(&mut self) -> Result<String> {
        Ok(self.resolve_entry().await?.dn.clone())
    }

    /// `mail`, falling back to the address part of the first
    /// `proxyAddresses` value
    pub async fn email(&mut self) -> Result<Option<String>> {
        if self.email.is_none() {
            let email = extract_email(self.resolve_entry().await?);
            self.email = email;
        }
        Ok(self.email.clone())
    }

    /// Decoded `userAccountControl`, if the entry carries one
    pub async fn account_control(&mut self) -> Result<Option<AccountControlFlags>> {
        self.resolve_entry()
            .await?
            .first("userAccountControl")
            .map(str::parse::<AccountControlFlags>)
            .transpose()
    }

    /// Paged subtree search over this user's session
    pub async fn search(
        &mut self,
        filter: &str,
        base_dn: Option<&str>,
    ) -> Result<Vec<DirectoryEntry>> {
        let result = self.connection()?.search(filter, base_dn).await;
        if let Err(e) = &result {
            self.last_error = Some(e.to_string());
        }
        result
    }

    /// Change this user's password in place
    pub async fn change_password(
        &mut self,
        new_secret: &str,
        old_secret: Option<&str>,
    ) -> Result<PasswordChange> {
        let user_dn = self.user_dn().await?;
        let change = self
            .connection()?
            .modify_password(&user_dn, new_secret, old_secret)
            .await?;

        if !change.success {
            self.last_error = Some(change.detail.to_string());
        }
        Ok(change)
    }
}

fn extract_email(entry: &DirectoryEntry) -> Option<String> {
    if let Some(mail) = entry.first("mail").filter(|mail| !mail.is_empty()) {
        return Some(mail.to_string());
    }

    entry
        .first("proxyAddresses")
        .and_then(|address| address.rsplit(':').next())
        .filter(|address| !address.is_empty())
        .map(str::to_string)
}

impl fmt::Display for DirectoryUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<DirectoryUser> {}", self.username)
    }
}

impl fmt::Debug for DirectoryUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryUser")
            .field("username", &self.username)
            .field("state", &self.state)
            .field("dn", &self.cached_dn())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldap::testing::{user_entry, ScriptedDirectory};

    fn pool(directory: &ScriptedDirectory) -> Arc<DirectoryServerPool> {
        let mut pool = DirectoryServerPool::new(
            "CORP",
            "dc=corp,dc=example,dc=com",
            Arc::new(directory.clone()),
        );
        pool.add_endpoint("dc1", 636, None, None);
        Arc::new(pool)
    }

    fn alice_directory() -> ScriptedDirectory {
        ScriptedDirectory::new()
            .with_account("CORP\\alice", "s3cret")
            .with_entry(
                user_entry("alice")
                    .with_attribute("mail", ["alice@corp.example.com"])
                    .with_attribute("userAccountControl", ["66048"]),
            )
    }

    #[tokio::test]
    async fn test_login_resolves_entry() {
        let directory = alice_directory();
        let mut user = DirectoryUser::new(pool(&directory), "alice");
        assert_eq!(user.state(), DirectoryUserState::Unbound);

        user.login("s3cret").await.unwrap();
        assert_eq!(user.state(), DirectoryUserState::Resolved);
        assert_eq!(
            user.user_dn().await.unwrap(),
            "CN=alice,OU=Staff,DC=corp,DC=example,DC=com"
        );
        assert_eq!(
            user.email().await.unwrap().as_deref(),
            Some("alice@corp.example.com")
        );

        let flags = user.account_control().await.unwrap().unwrap();
        assert!(flags.contains("NORMAL_ACCOUNT"));
        assert!(flags.contains("DONT_EXPIRE_PASSWORD"));

        user.logout().await;
        // One bind, one entry lookup, one release
        let stats = directory.stats();
        assert_eq!(stats.binds, 1);
        assert_eq!(stats.searches, 1);
        assert_eq!(stats.unbinds, 1);
    }

    #[tokio::test]
    async fn test_email_falls_back_to_proxy_addresses() {
        let directory = ScriptedDirectory::new()
            .with_account("CORP\\bob", "pw")
            .with_entry(user_entry("bob").with_attribute(
                "proxyAddresses",
                ["SMTP:bob@corp.example.com", "smtp:robert@corp.example.com"],
            ));
        let mut user = DirectoryUser::new(pool(&directory), "bob");

        user.login("pw").await.unwrap();
        assert_eq!(
            user.email().await.unwrap().as_deref(),
            Some("bob@corp.example.com")
        );
        user.logout().await;
    }

    #[tokio::test]
    async fn test_email_absent() {
        let directory = ScriptedDirectory::new()
            .with_account("CORP\\carol", "pw")
            .with_entry(user_entry("carol"));
        let mut user = DirectoryUser::new(pool(&directory), "carol");

        user.login("pw").await.unwrap();
        assert_eq!(user.email().await.unwrap(), None);
        assert_eq!(user.account_control().await.unwrap(), None);
        user.logout().await;
    }

    #[tokio::test]
    async fn test_wrong_password_is_login_failed() {
        let directory = alice_directory();
        let mut user = DirectoryUser::new(pool(&directory), "alice");

        let err = user.login("wrong").await.unwrap_err();
        assert!(matches!(err, Error::LoginFailed(_)));
        assert_eq!(err.root_cause().code(), "BindError");
        assert!(user.last_error().is_some());
        assert!(!user.is_logged_in());
        assert_eq!(directory.stats().unbinds, 1);
    }

    #[tokio::test]
    async fn test_missing_entry_is_login_failed() {
        // The bind succeeds but the search finds nothing
        let directory = ScriptedDirectory::new().with_account("CORP\\ghost", "pw");
        let mut user = DirectoryUser::new(pool(&directory), "ghost");

        let err = user.login("pw").await.unwrap_err();
        assert!(matches!(err.root_cause(), Error::Resolution(_)));
        assert_eq!(user.state(), DirectoryUserState::LoggedOut);
        assert!(!user.is_logged_in());
        assert_eq!(directory.stats().unbinds, 1);
    }

    #[tokio::test]
    async fn test_invalid_account_control() {
        let directory = ScriptedDirectory::new()
            .with_account("CORP\\dave", "pw")
            .with_entry(user_entry("dave").with_attribute("userAccountControl", ["n/a"]));
        let mut user = DirectoryUser::new(pool(&directory), "dave");

        user.login("pw").await.unwrap();
        assert!(matches!(
            user.account_control().await,
            Err(Error::InvalidControlValue(_))
        ));
        user.logout().await;
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let directory = alice_directory();
        let mut user = DirectoryUser::new(pool(&directory), "alice");

        user.logout().await;
        assert_eq!(user.state(), DirectoryUserState::Unbound);

        user.login("s3cret").await.unwrap();
        user.logout().await;
        user.logout().await;
        assert_eq!(user.state(), DirectoryUserState::LoggedOut);
        assert_eq!(user.cached_dn(), None);
        assert_eq!(directory.stats().unbinds, 1);

        assert!(matches!(
            user.search("(objectClass=*)", None).await,
            Err(Error::NotBound)
        ));
    }

    #[tokio::test]
    async fn test_change_password() {
        let directory = alice_directory();
        let mut user = DirectoryUser::new(pool(&directory), "alice");

        user.login("s3cret").await.unwrap();
        let change = user.change_password("n3w-s3cret", None).await.unwrap();
        assert!(change.success);

        let stats = directory.stats();
        assert_eq!(
            stats.modifications[0].0,
            "CN=alice,OU=Staff,DC=corp,DC=example,DC=com"
        );
        user.logout().await;
    }

    #[test]
    fn test_display() {
        let user = DirectoryUser::new(pool(&ScriptedDirectory::new()), "alice");
        assert_eq!(user.to_string(), "<DirectoryUser> alice");
    }
}
