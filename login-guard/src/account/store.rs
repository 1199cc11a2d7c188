//! Account store trait and in-memory backend

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::Account;
use crate::error::{Error, Result};

/// Persistence for account lock fields
///
/// `save` must replace the stored record for `account.id` atomically. The
/// guard serializes calls per account, so backends do not need their own
/// compare-and-swap.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Load an account, `Ok(None)` if it does not exist
    async fn get(&self, account_id: &str) -> Result<Option<Account>>;

    /// Persist the account's lock fields
    async fn save(&self, account: &Account) -> Result<()>;
}

/// Process-local account store
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: DashMap<String, Account>,
}

impl InMemoryAccountStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh account, failing if the id is taken
    pub fn register(&self, account_id: &str) -> Result<Account> {
        match self.accounts.entry(account_id.to_string()) {
            Entry::Occupied(_) => Err(Error::Conflict(format!(
                "account {} already exists",
                account_id
            ))),
            Entry::Vacant(slot) => {
                let account = Account::new(account_id);
                slot.insert(account.clone());
                Ok(account)
            }
        }
    }

    /// Remove an account (account lifecycle, not used by the guard)
    pub fn remove(&self, account_id: &str) -> Option<Account> {
        self.accounts.remove(account_id).map(|(_, account)| account)
    }

    /// Number of stored accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get(&self, account_id: &str) -> Result<Option<Account>> {
        Ok(self.accounts.get(account_id).map(|a| a.value().clone()))
    }

    async fn save(&self, account: &Account) -> Result<()> {
        match self.accounts.get_mut(&account.id) {
            Some(mut stored) => {
                *stored = account.clone();
                Ok(())
            }
            None => Err(Error::AccountNotFound(account.id.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_get() {
        let store = InMemoryAccountStore::new();
        assert!(store.is_empty());

        let account = store.register("alice@example.com").unwrap();
        assert_eq!(account, Account::new("alice@example.com"));
        assert_eq!(store.len(), 1);

        let loaded = store.get("alice@example.com").await.unwrap();
        assert_eq!(loaded, Some(account));
        assert_eq!(store.get("bob@example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_register_duplicate_conflicts() {
        let store = InMemoryAccountStore::new();
        store.register("alice").unwrap();
        assert!(matches!(store.register("alice"), Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_save_replaces_record() {
        let store = InMemoryAccountStore::new();
        let mut account = store.register("alice").unwrap();
        account.failed_attempts = 2;
        store.save(&account).await.unwrap();

        let loaded = store.get("alice").await.unwrap().unwrap();
        assert_eq!(loaded.failed_attempts, 2);
    }

    #[tokio::test]
    async fn test_save_unknown_account_fails() {
        let store = InMemoryAccountStore::new();
        let result = store.save(&Account::new("ghost")).await;
        assert!(matches!(result, Err(Error::AccountNotFound(id)) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_remove() {
        let store = InMemoryAccountStore::new();
        store.register("alice").unwrap();
        assert!(store.remove("alice").is_some());
        assert_eq!(store.get("alice").await.unwrap(), None);
    }
}
