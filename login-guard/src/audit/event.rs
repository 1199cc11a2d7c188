//! Audit entry types
//!
//! One [`AuditEntry`] is appended per guard decision point.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single audit trail entry
///
/// Entries are built once and never mutated; fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    id: Uuid,
    account_id: String,
    action: AuditAction,
    timestamp: DateTime<Utc>,
    source_ip: Option<IpAddr>,
    detail: Option<String>,
}

impl AuditEntry {
    /// Create an entry for `account_id` at `timestamp`
    pub fn new(account_id: impl Into<String>, action: AuditAction, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            account_id: account_id.into(),
            action,
            timestamp,
            source_ip: None,
            detail: None,
        }
    }

    /// Set the client IP the attempt came from
    pub fn with_source_ip(mut self, source_ip: Option<IpAddr>) -> Self {
        self.source_ip = source_ip;
        self
    }

    /// Attach a short machine-readable detail (e.g. `manual`)
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Unique, time-ordered entry id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Account the entry belongs to
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// What happened
    pub fn action(&self) -> AuditAction {
        self.action
    }

    /// When the guard made the decision
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Client IP, if the caller supplied one
    pub fn source_ip(&self) -> Option<IpAddr> {
        self.source_ip
    }

    /// Optional detail string
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

/// Security-relevant guard decisions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Credential rejected, account still open
    FailedLogin,
    /// Credential verified
    SuccessfulLogin,
    /// Attempt refused because the account is locked
    LockoutAttemptBlocked,
    /// Account locked
    AccountLocked,
    /// Lock lifted, by expiry or by an administrator
    AccountAutoUnlocked,
}

impl AuditAction {
    /// Stable string form used in logs and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailedLogin => "failed_login",
            Self::SuccessfulLogin => "successful_login",
            Self::LockoutAttemptBlocked => "lockout_attempt_blocked",
            Self::AccountLocked => "account_locked",
            Self::AccountAutoUnlocked => "account_auto_unlocked",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
