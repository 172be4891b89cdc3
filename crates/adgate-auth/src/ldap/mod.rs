//! LDAP/Active Directory access
//!
//! Provides:
//! - A read-only server pool with failover across endpoints
//! - Bound connections with paged search and password modification
//! - Per-attempt directory users with cached entry lookups
//! - userAccountControl decoding
//! - LDAPS and STARTTLS via `ldap3`

mod client;
mod connection;
mod flags;
mod pool;
mod transport;
mod types;
mod user;

#[cfg(test)]
pub(crate) mod testing;

pub use client::Ldap3Transport;
pub use connection::{DirectoryConnection, PagedSearch};
pub use flags::{AccountControlFlags, ACCOUNT_CONTROL_FLAGS};
pub use pool::DirectoryServerPool;
pub use transport::{DirectorySession, DirectoryTransport};
pub use types::*;
pub use user::{DirectoryUser, DirectoryUserState};
