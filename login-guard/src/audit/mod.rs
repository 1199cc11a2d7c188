//! Append-only audit trail of guard decisions
//!
//! Every decision point of the guard appends exactly one [`AuditEntry`]
//! through an [`AuditStore`]. Entries are never updated or deleted.

pub mod event;
pub mod storage;

pub use event::{AuditAction, AuditEntry};
pub use storage::{AuditStore, InMemoryAuditStore, JsonlAuditStore};
