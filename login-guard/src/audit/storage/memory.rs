//! In-memory audit store

use std::sync::RwLock;

use async_trait::async_trait;

use super::AuditStore;
use crate::audit::event::AuditEntry;
use crate::error::Result;

/// Process-local audit trail
///
/// Entries are kept in global append order; `entries_for` filters that
/// order, so per-account order matches insertion order.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in append order
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Entries for one account in append order
    pub fn entries_for(&self, account_id: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.account_id() == account_id)
            .cloned()
            .collect()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        Ok(())
    }
}
