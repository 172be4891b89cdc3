//! Bound directory connection
//!
//! Owned by exactly one authentication attempt. Searches and modifications
//! require a successful bind; `unbind` consumes the connection.

use super::transport::DirectorySession;
use super::types::*;
use adgate_core::{Error, Result};
use adgate_crypto::unicode_pwd;
use std::fmt;
use tracing::{debug, warn};

pub struct DirectoryConnection {
    session: Box<dyn DirectorySession>,
    endpoint: ServerEndpoint,
    principal: String,
    secret: String,
    base_dn: String,
    page_size: u32,
    bound: bool,
    released: bool,
    last_result: Option<OperationResult>,
}

impl DirectoryConnection {
    pub fn new(
        session: Box<dyn DirectorySession>,
        endpoint: ServerEndpoint,
        principal: impl Into<String>,
        secret: &str,
        base_dn: &str,
        page_size: u32,
    ) -> Self {
        Self {
            session,
            endpoint,
            principal: principal.into(),
            secret: secret.to_string(),
            base_dn: base_dn.to_string(),
            page_size,
            bound: false,
            released: false,
            last_result: None,
        }
    }

    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Result of the most recent bind or modify
    pub fn last_result(&self) -> Option<&OperationResult> {
        self.last_result.as_ref()
    }

    /// Simple bind with the stored credentials. No-op when already bound.
    pub async fn bind(&mut self) -> Result<()> {
        if self.bound {
            return Ok(());
        }

        let result = self
            .session
            .simple_bind(&self.principal, &self.secret)
            .await?;
        self.last_result = Some(result.clone());

        if !result.is_success() {
            debug!(
                "Bind as {} on {} rejected: {}",
                self.principal, self.endpoint, result
            );
            return Err(Error::Bind {
                code: result.code,
                message: result.message,
            });
        }

        debug!("Bound as {} on {}", self.principal, self.endpoint);
        self.bound = true;
        Ok(())
    }

    fn ensure_bound(&self) -> Result<()> {
        if self.bound {
            Ok(())
        } else {
            Err(Error::NotBound)
        }
    }

    fn request(&self, filter: &str, base_dn: Option<&str>) -> SearchRequest {
        SearchRequest {
            base_dn: base_dn.unwrap_or(self.base_dn.as_str()).to_string(),
            filter: filter.to_string(),
            attributes: vec![ALL_ATTRIBUTES.to_string()],
            page_size: self.page_size,
        }
    }

    /// Start a paged subtree search. Pages are fetched lazily.
    pub fn paged_search(&mut self, filter: &str, base_dn: Option<&str>) -> Result<PagedSearch<'_>> {
        self.ensure_bound()?;
        let request = self.request(filter, base_dn);

        Ok(PagedSearch {
            conn: self,
            request,
            cookie: Vec::new(),
            finished: false,
            round_trips: 0,
        })
    }

    /// Run a paged subtree search to completion, returning every entry in
    /// server order
    pub async fn search(
        &mut self,
        filter: &str,
        base_dn: Option<&str>,
    ) -> Result<Vec<DirectoryEntry>> {
        let mut pages = self.paged_search(filter, base_dn)?;
        let mut entries = Vec::new();

        while let Some(page) = pages.next_page().await? {
            entries.extend(page.entries);
        }

        debug!(
            "Search {} returned {} entries in {} round trips",
            pages.request.filter,
            entries.len(),
            pages.round_trips
        );
        Ok(entries)
    }

    /// Replace the password of `user_dn` using the Active Directory
    /// delete-old/add-new convention on `unicodePwd`.
    ///
    /// The channel is upgraded with StartTLS first if it is not already
    /// encrypted. `old_secret` defaults to the secret this connection was
    /// bound with.
    pub async fn modify_password(
        &mut self,
        user_dn: &str,
        new_secret: &str,
        old_secret: Option<&str>,
    ) -> Result<PasswordChange> {
        self.ensure_bound()?;

        if !self.session.is_encrypted() {
            debug!("Upgrading connection to {} with StartTLS", self.endpoint);
            self.session.start_tls().await?;
        }

        let old_secret = old_secret.unwrap_or(self.secret.as_str()).to_string();
        let changes = vec![
            AttributeChange::Delete(UNICODE_PWD.to_string(), vec![unicode_pwd(&old_secret)]),
            AttributeChange::Add(UNICODE_PWD.to_string(), vec![unicode_pwd(new_secret)]),
        ];

        let result = self.session.modify(user_dn, changes).await?;
        self.last_result = Some(result.clone());

        let success = result.is_success();
        if success {
            debug!("Password changed for {}", user_dn);
            if old_secret == self.secret {
                self.secret = new_secret.to_string();
            }
        } else {
            warn!("Password change for {} refused: {}", user_dn, result);
        }

        Ok(PasswordChange {
            success,
            detail: result,
        })
    }

    /// Send an unbind and close the session
    pub async fn unbind(mut self) -> Result<()> {
        self.bound = false;
        self.released = true;
        self.session.unbind().await
    }
}

impl fmt::Debug for DirectoryConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConnection")
            .field("endpoint", &self.endpoint.url())
            .field("principal", &self.principal)
            .field("base_dn", &self.base_dn)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

impl Drop for DirectoryConnection {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "Directory connection to {} dropped without unbind",
                self.endpoint
            );
        }
    }
}

/// Lazy paged search over one connection
pub struct PagedSearch<'a> {
    conn: &'a mut DirectoryConnection,
    request: SearchRequest,
    cookie: Vec<u8>,
    finished: bool,
    round_trips: usize,
}

impl PagedSearch<'_> {
    /// Fetch the next page, or `None` once the server returned an empty
    /// cookie
    pub async fn next_page(&mut self) -> Result<Option<SearchPage>> {
        if self.finished {
            return Ok(None);
        }

        let page = self
            .conn
            .session
            .search_page(&self.request, &self.cookie)
            .await?;
        self.round_trips += 1;

        if page.is_last() {
            self.finished = true;
        }
        self.cookie.clone_from(&page.cookie);

        Ok(Some(page))
    }

    pub fn round_trips(&self) -> usize {
        self.round_trips
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldap::testing::{entries, ScriptedDirectory};
    use crate::ldap::transport::DirectoryTransport;
    use std::time::Duration;

    async fn open(directory: &ScriptedDirectory, secret: &str) -> DirectoryConnection {
        let endpoint = ServerEndpoint::new("dc1", 389, false, Duration::from_secs(5));
        let session = directory.open(&endpoint).await.unwrap();
        DirectoryConnection::new(
            session,
            endpoint,
            "CORP\\alice",
            secret,
            "dc=corp,dc=example,dc=com",
            1000,
        )
    }

    #[tokio::test]
    async fn test_operations_require_bind() {
        let directory = ScriptedDirectory::new().with_account("CORP\\alice", "s3cret");
        let mut conn = open(&directory, "s3cret").await;

        assert!(matches!(
            conn.search("(objectClass=*)", None).await,
            Err(Error::NotBound)
        ));
        assert!(matches!(
            conn.modify_password("CN=Alice", "n3w", None).await,
            Err(Error::NotBound)
        ));
        conn.unbind().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_is_idempotent() {
        let directory = ScriptedDirectory::new().with_account("CORP\\alice", "s3cret");
        let mut conn = open(&directory, "s3cret").await;

        conn.bind().await.unwrap();
        conn.bind().await.unwrap();
        assert!(conn.is_bound());
        assert_eq!(directory.stats().binds, 1);
        assert!(conn.last_result().unwrap().is_success());
        conn.unbind().await.unwrap();
    }

    #[tokio::test]
    async fn test_paged_search_follows_cookies() {
        let directory = ScriptedDirectory::new()
            .with_account("CORP\\alice", "s3cret")
            .with_pages(vec![
                SearchPage::new(entries("a", 1000), b"C1".to_vec()),
                SearchPage::new(entries("b", 1000), b"C2".to_vec()),
                SearchPage::new(entries("c", 42), Vec::new()),
            ]);
        let mut conn = open(&directory, "s3cret").await;
        conn.bind().await.unwrap();

        let found = conn.search("(objectClass=user)", None).await.unwrap();
        assert_eq!(found.len(), 2042);
        assert_eq!(found[0].dn, "CN=a0,DC=corp,DC=example,DC=com");
        assert_eq!(found[1000].dn, "CN=b0,DC=corp,DC=example,DC=com");
        assert_eq!(found[2041].dn, "CN=c41,DC=corp,DC=example,DC=com");

        let stats = directory.stats();
        assert_eq!(stats.searches, 3);
        assert_eq!(
            stats.cookies,
            vec![Vec::new(), b"C1".to_vec(), b"C2".to_vec()]
        );
        // No base given, so every page searches the connection's base DN
        assert_eq!(stats.search_bases[0], "dc=corp,dc=example,dc=com");
        assert!(stats.search_bases.iter().all(|b| b == "dc=corp,dc=example,dc=com"));
        conn.unbind().await.unwrap();
    }

    #[tokio::test]
    async fn test_debug_hides_secret() {
        let directory = ScriptedDirectory::new().with_account("CORP\\alice", "s3cret");
        let conn = open(&directory, "s3cret").await;

        let shown = format!("{:?}", conn);
        assert!(shown.contains("CORP\\\\alice"));
        assert!(!shown.contains("s3cret"));
        conn.unbind().await.unwrap();
    }

    #[tokio::test]
    async fn test_paged_search_yields_lazily() {
        let directory = ScriptedDirectory::new()
            .with_account("CORP\\alice", "s3cret")
            .with_pages(vec![
                SearchPage::new(entries("a", 3), b"C1".to_vec()),
                SearchPage::new(entries("b", 2), Vec::new()),
            ]);
        let mut conn = open(&directory, "s3cret").await;
        conn.bind().await.unwrap();

        {
            let mut pages = conn.paged_search("(objectClass=*)", Some("ou=staff")).unwrap();
            let first = pages.next_page().await.unwrap().unwrap();
            assert_eq!(first.entries.len(), 3);
            assert_eq!(pages.round_trips(), 1);

            assert_eq!(pages.next_page().await.unwrap().unwrap().entries.len(), 2);
            assert!(pages.next_page().await.unwrap().is_none());
            assert_eq!(pages.round_trips(), 2);
        }

        assert_eq!(directory.stats().search_bases, vec!["ou=staff", "ou=staff"]);
        conn.unbind().await.unwrap();
    }

    #[tokio::test]
    async fn test_modify_password_upgrades_and_swaps_values() {
        let directory = ScriptedDirectory::new().with_account("CORP\\alice", "s3cret");
        let mut conn = open(&directory, "s3cret").await;
        conn.bind().await.unwrap();

        let change = conn
            .modify_password("CN=Alice,DC=corp", "n3w-s3cret", None)
            .await
            .unwrap();
        assert!(change.success);

        let stats = directory.stats();
        assert_eq!(stats.start_tls, 1);
        let (dn, changes) = &stats.modifications[0];
        assert_eq!(dn, "CN=Alice,DC=corp");
        assert_eq!(
            changes,
            &vec![
                AttributeChange::Delete(UNICODE_PWD.to_string(), vec![unicode_pwd("s3cret")]),
                AttributeChange::Add(UNICODE_PWD.to_string(), vec![unicode_pwd("n3w-s3cret")]),
            ]
        );
        conn.unbind().await.unwrap();
    }

    #[tokio::test]
    async fn test_modify_password_with_explicit_old_secret() {
        let directory = ScriptedDirectory::new()
            .with_account("CORP\\alice", "s3cret")
            .with_modify_code(19, "constraintViolation");
        let mut conn = open(&directory, "s3cret").await;
        conn.bind().await.unwrap();

        let change = conn
            .modify_password("CN=Bob,DC=corp", "n3w", Some("old-bob"))
            .await
            .unwrap();
        assert!(!change.success);
        assert_eq!(change.detail.code, 19);

        let stats = directory.stats();
        let (_, changes) = &stats.modifications[0];
        assert_eq!(
            changes[0],
            AttributeChange::Delete(UNICODE_PWD.to_string(), vec![unicode_pwd("old-bob")])
        );
        conn.unbind().await.unwrap();
    }
}
