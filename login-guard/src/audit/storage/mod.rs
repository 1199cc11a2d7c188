//! Audit entry storage trait and backend implementations
//!
//! The [`AuditStore`] trait only offers `append`; there is no update or
//! delete path through this crate.
//!
//! # Available Backends
//!
//! - [`InMemoryAuditStore`]: process-local, queryable per account
//! - [`JsonlAuditStore`]: append-only newline-delimited JSON file

use async_trait::async_trait;

use super::event::AuditEntry;
use crate::error::Result;

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlAuditStore;
pub use memory::InMemoryAuditStore;

/// Trait for audit entry persistence backends
///
/// Implementations must preserve append order per account.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an entry to the trail
    async fn append(&self, entry: &AuditEntry) -> Result<()>;
}
