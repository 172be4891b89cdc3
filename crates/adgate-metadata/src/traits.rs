//! Local identity store trait
//!
//! Defines the narrow read-only interface the authentication core uses to
//! reach user records owned by the host application.

use adgate_core::types::LocalIdentityRecord;
use adgate_core::Result;
use async_trait::async_trait;

/// Read-only access to local user records
#[async_trait]
pub trait LocalIdentityStore: Send + Sync {
    /// Look up a record by any natural key the store indexes on
    /// (username, email or phone).
    async fn find_by_natural_key(&self, key: &str) -> Result<Option<LocalIdentityRecord>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<LocalIdentityRecord>>;
}
