//! Transport seam between the directory logic and the wire client
//!
//! The pool opens sessions through a [`DirectoryTransport`]; everything above
//! it only speaks [`DirectorySession`]. The production implementation lives in
//! `client.rs`.

use super::types::{AttributeChange, OperationResult, SearchPage, SearchRequest, ServerEndpoint};
use adgate_core::Result;
use async_trait::async_trait;

/// Opens sessions to directory endpoints
#[async_trait]
pub trait DirectoryTransport: Send + Sync {
    /// Connect to one endpoint. Unreachable servers and timeouts are
    /// `Error::Transport`.
    async fn open(&self, endpoint: &ServerEndpoint) -> Result<Box<dyn DirectorySession>>;
}

/// One open connection to a directory server
#[async_trait]
pub trait DirectorySession: Send {
    /// Simple bind. A rejected bind is `Ok` with a nonzero result code; `Err`
    /// is reserved for transport failures.
    async fn simple_bind(&mut self, principal: &str, secret: &str) -> Result<OperationResult>;

    /// One subtree search round trip with the paged-results control.
    /// An empty `cookie` requests the first page.
    async fn search_page(&mut self, request: &SearchRequest, cookie: &[u8]) -> Result<SearchPage>;

    /// Upgrade to an encrypted channel, keeping any existing bind
    async fn start_tls(&mut self) -> Result<()>;

    fn is_encrypted(&self) -> bool;

    async fn modify(&mut self, dn: &str, changes: Vec<AttributeChange>)
        -> Result<OperationResult>;

    /// Send an unbind and close the session
    async fn unbind(&mut self) -> Result<()>;
}
