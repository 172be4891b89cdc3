//! Scripted in-memory directory for tests

use super::transport::{DirectorySession, DirectoryTransport};
use super::types::*;
use adgate_core::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Everything the directory was asked to do
#[derive(Debug, Clone, Default)]
pub struct DirectoryStats {
    pub opened: Vec<String>,
    pub binds: usize,
    pub searches: usize,
    pub cookies: Vec<Vec<u8>>,
    pub search_bases: Vec<String>,
    pub start_tls: usize,
    pub modifications: Vec<(String, Vec<AttributeChange>)>,
    pub unbinds: usize,
}

#[derive(Default)]
struct Script {
    accounts: HashMap<String, String>,
    entries: Vec<DirectoryEntry>,
    pages: VecDeque<SearchPage>,
    unreachable: HashSet<String>,
    bind_result: Option<OperationResult>,
    modify_result: Option<OperationResult>,
    stats: DirectoryStats,
}

#[derive(Clone, Default)]
pub struct ScriptedDirectory {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    /// Accept binds for `principal` with `secret`
    pub fn with_account(self, principal: &str, secret: &str) -> Self {
        self.lock()
            .accounts
            .insert(principal.to_string(), secret.to_string());
        self
    }

    pub fn with_entry(self, entry: DirectoryEntry) -> Self {
        self.lock().entries.push(entry);
        self
    }

    /// Answer searches with these pages in order instead of filtering entries
    pub fn with_pages(self, pages: Vec<SearchPage>) -> Self {
        self.lock().pages.extend(pages);
        self
    }

    pub fn with_unreachable(self, host: &str) -> Self {
        self.lock().unreachable.insert(host.to_string());
        self
    }

    /// Answer every bind with this result code
    pub fn with_bind_code(self, code: u32, message: &str) -> Self {
        self.lock().bind_result = Some(OperationResult::new(code, message));
        self
    }

    pub fn with_modify_code(self, code: u32, message: &str) -> Self {
        self.lock().modify_result = Some(OperationResult::new(code, message));
        self
    }

    pub fn stats(&self) -> DirectoryStats {
        self.lock().stats.clone()
    }
}

#[async_trait]
impl DirectoryTransport for ScriptedDirectory {
    async fn open(&self, endpoint: &ServerEndpoint) -> Result<Box<dyn DirectorySession>> {
        let mut script = self.lock();
        script.stats.opened.push(endpoint.host().to_string());

        if script.unreachable.contains(endpoint.host()) {
            return Err(Error::Transport(format!(
                "Failed to connect to {}: connection refused",
                endpoint
            )));
        }

        Ok(Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
            encrypted: endpoint.use_tls(),
        }))
    }
}

struct ScriptedSession {
    script: Arc<Mutex<Script>>,
    encrypted: bool,
}

impl ScriptedSession {
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }
}

#[async_trait]
impl DirectorySession for ScriptedSession {
    async fn simple_bind(&mut self, principal: &str, secret: &str) -> Result<OperationResult> {
        let mut script = self.lock();
        script.stats.binds += 1;

        if let Some(result) = &script.bind_result {
            return Ok(result.clone());
        }

        match script.accounts.get(principal) {
            Some(expected) if expected == secret => Ok(OperationResult::success()),
            _ => Ok(OperationResult::new(49, "invalidCredentials")),
        }
    }

    async fn search_page(&mut self, request: &SearchRequest, cookie: &[u8]) -> Result<SearchPage> {
        let mut script = self.lock();
        script.stats.searches += 1;
        script.stats.cookies.push(cookie.to_vec());
        script.stats.search_bases.push(request.base_dn.clone());

        if let Some(page) = script.pages.pop_front() {
            return Ok(page);
        }

        let matching: Vec<DirectoryEntry> = script
            .entries
            .iter()
            .filter(|entry| matches_filter(entry, &request.filter))
            .cloned()
            .collect();

        let offset: usize = std::str::from_utf8(cookie)
            .ok()
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        let end = (offset + request.page_size as usize).min(matching.len());
        let next = if end < matching.len() {
            end.to_string().into_bytes()
        } else {
            Vec::new()
        };

        Ok(SearchPage::new(matching[offset.min(end)..end].to_vec(), next))
    }

    async fn start_tls(&mut self) -> Result<()> {
        self.lock().stats.start_tls += 1;
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
        let mut script = self.lock();
        script.stats.modifications.push((dn.to_string(), changes));
        Ok(script
            .modify_result
            .clone()
            .unwrap_or_else(OperationResult::success))
    }

    async fn unbind(&mut self) -> Result<()> {
        self.lock().stats.unbinds += 1;
        Ok(())
    }
}

/// Single `(attr=value)` equality or `(attr=*)` presence filters
fn matches_filter(entry: &DirectoryEntry, filter: &str) -> bool {
    let inner = filter.trim_start_matches('(').trim_end_matches(')');
    let Some((attr, value)) = inner.split_once('=') else {
        return false;
    };

    if value == "*" {
        return attr.eq_ignore_ascii_case("objectClass") || !entry.values(attr).is_empty();
    }
    entry
        .values(attr)
        .iter()
        .any(|v| v.eq_ignore_ascii_case(value))
}

/// A user object as Active Directory returns it
pub fn user_entry(username: &str) -> DirectoryEntry {
    DirectoryEntry::new(format!("CN={},OU=Staff,DC=corp,DC=example,DC=com", username))
        .with_attribute("sAMAccountName", [username])
        .with_attribute("objectClass", ["top", "person", "user"])
}

/// `count` numbered entries named after `prefix`
pub fn entries(prefix: &str, count: usize) -> Vec<DirectoryEntry> {
    (0..count)
        .map(|i| DirectoryEntry::new(format!("CN={}{},DC=corp,DC=example,DC=com", prefix, i)))
        .collect()
}
