//! In-memory identity repository
//!
//! Users file format:
//! ```toml
//! [[users]]
//! id = "1"
//! username = "alice"
//! email = "alice@example.com"
//! logon_type = "LOCAL"
//! credential_hash = "$argon2id$v=19$m=19456,t=2,p=1$..."
//! permissions = ["admin"]
//!
//! [[users]]
//! id = "2"
//! username = "bob"
//! email = "bob@corp.example.com"
//! logon_type = "DIRECTORY"
//! ```

use crate::traits::LocalIdentityStore;
use adgate_core::types::LocalIdentityRecord;
use adgate_core::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<LocalIdentityRecord>,
}

/// Identity store keeping records in memory, keyed by id
#[derive(Default)]
pub struct MemoryIdentityStore {
    records: RwLock<HashMap<String, LocalIdentityRecord>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load records from a TOML users file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Store(format!("Failed to read users file {}: {}", path.display(), e))
        })?;

        let file: UsersFile = toml::from_str(&content).map_err(|e| {
            Error::Store(format!("Failed to parse users file {}: {}", path.display(), e))
        })?;

        let store = Self::new();
        for record in file.users {
            store.insert(record).await?;
        }

        info!(
            "Loaded {} local identities from {}",
            store.len().await,
            path.display()
        );
        Ok(store)
    }

    /// Add a record. Ids and usernames must be unique.
    pub async fn insert(&self, record: LocalIdentityRecord) -> Result<()> {
        let mut records = self.records.write().await;

        if records.contains_key(&record.id) {
            return Err(Error::Store(format!("Duplicate identity id: {}", record.id)));
        }
        if records.values().any(|r| r.username == record.username) {
            return Err(Error::Store(format!(
                "Duplicate username: {}",
                record.username
            )));
        }

        debug!("Registered local identity {} ({})", record.username, record.logon_type);
        records.insert(record.id.clone(), record);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl LocalIdentityStore for MemoryIdentityStore {
    async fn find_by_natural_key(&self, key: &str) -> Result<Option<LocalIdentityRecord>> {
        let records = self.records.read().await;

        // Usernames win over email/phone matches on other records
        let found = records
            .values()
            .find(|r| r.username == key)
            .or_else(|| records.values().find(|r| r.matches_natural_key(key)))
            .cloned();

        Ok(found)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<LocalIdentityRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }
}
