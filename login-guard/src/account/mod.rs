//! Account lock record and its store
//!
//! [`Account`] holds only the fields the guard needs: the failure counter and
//! the lock state. Profile data lives elsewhere. The transition methods on
//! [`Account`] are the only way the guard changes these fields.

pub mod store;

pub use store::{AccountStore, InMemoryAccountStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lock fields of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier (email or account id)
    pub id: String,
    /// Consecutive failed attempts since the last success or unlock
    pub failed_attempts: u32,
    /// When the current lock expires; `None` with `is_locked` means locked until cleared by an admin
    pub locked_until: Option<DateTime<Utc>>,
    /// Whether the account is locked
    pub is_locked: bool,
}

/// Lock state of an account at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    /// Logins are processed normally
    Open,
    /// Logins are rejected; `until` is `None` for an administrative lock
    Locked {
        /// When the lock expires
        until: Option<DateTime<Utc>>,
    },
    /// Locked, but the lock has expired and will be lifted on the next attempt
    LockExpired,
}

/// Result of [`Account::record_failure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureTransition {
    /// Counter incremented, account still open
    Counted {
        /// Counter value after the increment
        failed_attempts: u32,
    },
    /// Threshold reached, account now locked
    Locked {
        /// Counter value that triggered the lock
        failed_attempts: u32,
        /// When the lock expires
        until: Option<DateTime<Utc>>,
    },
}

impl Account {
    /// Fresh account as created at registration
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            failed_attempts: 0,
            locked_until: None,
            is_locked: false,
        }
    }

    /// Lock state at `now`
    pub fn state(&self, now: DateTime<Utc>) -> AccountState {
        if !self.is_locked {
            return AccountState::Open;
        }
        match self.locked_until {
            Some(until) if now >= until => AccountState::LockExpired,
            until => AccountState::Locked { until },
        }
    }

    /// Count one failed attempt, locking the account once `threshold` is reached
    ///
    /// The counter saturates at `threshold`. If `now + lockout_duration` is not
    /// representable the lock has no expiry.
    pub fn record_failure(
        &mut self,
        threshold: u32,
        lockout_duration: chrono::Duration,
        now: DateTime<Utc>,
    ) -> FailureTransition {
        self.failed_attempts = self.failed_attempts.saturating_add(1).min(threshold);

        if self.failed_attempts >= threshold {
            let until = now.checked_add_signed(lockout_duration);
            self.is_locked = true;
            self.locked_until = until;
            FailureTransition::Locked {
                failed_attempts: self.failed_attempts,
                until,
            }
        } else {
            FailureTransition::Counted {
                failed_attempts: self.failed_attempts,
            }
        }
    }

    /// Reset the counter after a verified login
    pub fn record_success(&mut self) {
        self.failed_attempts = 0;
    }

    /// Lift an expired lock, returning whether anything changed
    pub fn unlock_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.state(now) == AccountState::LockExpired {
            self.unlock();
            true
        } else {
            false
        }
    }

    /// Clear all lock fields back to their registration values
    pub fn unlock(&mut self) {
        self.failed_attempts = 0;
        self.locked_until = None;
        self.is_locked = false;
    }

    /// Lock with no expiry; only [`unlock`](Self::unlock) clears it
    pub fn lock_indefinitely(&mut self) {
        self.is_locked = true;
        self.locked_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_new_account_is_open() {
        let account = Account::new("alice@example.com");
        assert_eq!(account.failed_attempts, 0);
        assert_eq!(account.locked_until, None);
        assert!(!account.is_locked);
        assert_eq!(account.state(t0()), AccountState::Open);
    }

    #[test]
    fn test_failures_lock_at_threshold() {
        let mut account = Account::new("alice");
        let lockout = chrono::Duration::minutes(15);

        for expected in 1..5 {
            assert_eq!(
                account.record_failure(5, lockout, t0()),
                FailureTransition::Counted {
                    failed_attempts: expected
                }
            );
        }

        assert_eq!(
            account.record_failure(5, lockout, t0()),
            FailureTransition::Locked {
                failed_attempts: 5,
                until: Some(t0() + lockout),
            }
        );
        assert!(account.is_locked);
        assert_eq!(
            account.state(t0()),
            AccountState::Locked {
                until: Some(t0() + lockout)
            }
        );
    }

    #[test]
    fn test_counter_never_exceeds_threshold() {
        let mut account = Account::new("alice");
        for _ in 0..20 {
            account.record_failure(3, chrono::Duration::minutes(1), t0());
            assert!(account.failed_attempts <= 3);
        }
        assert_eq!(account.failed_attempts, 3);
    }

    #[test]
    fn test_lock_expires_at_boundary() {
        let mut account = Account::new("alice");
        let lockout = chrono::Duration::minutes(15);
        for _ in 0..5 {
            account.record_failure(5, lockout, t0());
        }

        let just_before = t0() + lockout - chrono::Duration::seconds(1);
        assert!(!account.unlock_if_expired(just_before));
        assert!(account.is_locked);

        let at_expiry = t0() + lockout;
        assert_eq!(account.state(at_expiry), AccountState::LockExpired);
        assert!(account.unlock_if_expired(at_expiry));
        assert_eq!(account, Account::new("alice"));
    }

    #[test]
    fn test_success_resets_counter() {
        let mut account = Account::new("alice");
        for _ in 0..4 {
            account.record_failure(5, chrono::Duration::minutes(15), t0());
        }
        account.record_success();
        assert_eq!(account.failed_attempts, 0);
        assert_eq!(account.state(t0()), AccountState::Open);
    }

    #[test]
    fn test_indefinite_lock_never_expires() {
        let mut account = Account::new("alice");
        account.lock_indefinitely();

        let far_future = t0() + chrono::Duration::days(3650);
        assert_eq!(
            account.state(far_future),
            AccountState::Locked { until: None }
        );
        assert!(!account.unlock_if_expired(far_future));

        account.unlock();
        assert_eq!(account, Account::new("alice"));
    }

    #[test]
    fn test_unrepresentable_expiry_locks_indefinitely() {
        let mut account = Account::new("alice");
        let transition = account.record_failure(1, chrono::Duration::MAX, t0());
        assert_eq!(
            transition,
            FailureTransition::Locked {
                failed_attempts: 1,
                until: None
            }
        );
        assert_eq!(account.state(t0()), AccountState::Locked { until: None });
    }
}
