//! Login guard service
//!
//! Core service that mediates every authentication attempt for an account:
//! rejects locked accounts before the identity provider is contacted, counts
//! failures, locks at the threshold, lifts expired locks lazily, and appends
//! one audit entry per decision.
//!
//! # Concurrency
//!
//! State changes for one account are serialized by a per-account async mutex
//! kept in a [`DashMap`]; different accounts never contend. The mutex is not
//! held during the identity provider call. After the call returns the account
//! is reloaded and its lock state re-checked before the verdict is applied,
//! so concurrent failures cannot push the counter past the threshold or lock
//! the account twice.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::GuardConfig;
use super::notification::{GuardEvent, GuardNotification, UnlockReason};
use crate::account::{Account, AccountState, AccountStore, FailureTransition};
use crate::audit::{AuditAction, AuditEntry, AuditStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::verifier::{Credential, IdentityVerifier, Verdict};

const DETAIL_EXPIRED: &str = "expired";
const DETAIL_MANUAL: &str = "manual";
const DETAIL_PROVIDER_UNAVAILABLE: &str = "provider_unavailable";
const DETAIL_LOCKED_DURING_VERIFICATION: &str = "locked_during_verification";

/// Result of a login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credential verified, account open
    Accepted,
    /// Attempt refused
    Rejected(Rejection),
    /// No account with that id
    AccountNotFound,
}

impl LoginOutcome {
    /// Whether the login succeeded
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Rejection reason, if the attempt was refused
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected(rejection) => Some(rejection.reason),
            _ => None,
        }
    }
}

/// Why an attempt was refused and when to try again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    /// Reason for refusal
    pub reason: RejectReason,
    /// Time until the lock expires; `None` when not locked or locked indefinitely
    pub retry_after: Option<chrono::Duration>,
}

impl Rejection {
    fn new(reason: RejectReason) -> Self {
        Self {
            reason,
            retry_after: None,
        }
    }

    fn locked(reason: RejectReason, until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        Self {
            reason,
            retry_after: until.map(|until| until - now),
        }
    }
}

/// Reasons an attempt can be refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Account was already locked; the credential was not checked
    Locked,
    /// This attempt reached the threshold and locked the account
    LockedJustNow,
    /// Credential rejected (or provider failure counted as one)
    InvalidCredential,
    /// Provider failed and the policy does not count provider failures
    ProviderUnavailable,
}

impl RejectReason {
    /// Message safe to show the end user
    ///
    /// Credential and provider failures share one generic message so the
    /// response does not reveal counters or provider health.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Locked | Self::LockedJustNow => {
                "Account locked due to multiple failed login attempts."
            }
            Self::InvalidCredential | Self::ProviderUnavailable => "Invalid credentials",
        }
    }
}

/// Snapshot of an account's lock state
///
/// Returned by [`LoginGuard::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct LockoutStatus {
    /// Whether the account is currently locked
    pub locked: bool,
    /// Failed attempts counted (0 once an expired lock will be lifted)
    pub failed_attempts: u32,
    /// Attempts that lock the account
    pub failure_threshold: u32,
    /// Time until the lock expires, `None` if open or locked indefinitely
    pub retry_after: Option<chrono::Duration>,
}

/// Outcome of the pre-verification check
enum Precheck {
    Proceed,
    Blocked(Rejection),
    NotFound,
}

/// Login guard service
///
/// Construct once at startup and share (it is cheap to clone).
///
/// # Example
///
/// ```rust,ignore
/// let guard = LoginGuard::new(config.guard, accounts, audit, verifier)?;
///
/// match guard.attempt_login(&email, &Credential::new(password), Some(ip)).await? {
///     LoginOutcome::Accepted => issue_tokens(&email),
///     LoginOutcome::Rejected(r) => respond_401(r.reason.user_message(), r.retry_after),
///     LoginOutcome::AccountNotFound => respond_401("Invalid credentials", None),
/// }
/// ```
#[derive(Clone)]
pub struct LoginGuard {
    config: GuardConfig,
    accounts: Arc<dyn AccountStore>,
    audit: Arc<dyn AuditStore>,
    verifier: Arc<dyn IdentityVerifier>,
    clock: Arc<dyn Clock>,
    account_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    notifications: Vec<Arc<dyn GuardNotification>>,
}

impl LoginGuard {
    /// Create a guard over the given collaborators
    ///
    /// Fails with [`Error::Validation`] if `config` is invalid.
    pub fn new(
        config: GuardConfig,
        accounts: Arc<dyn AccountStore>,
        audit: Arc<dyn AuditStore>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Result<Self> {
        config.validate().map_err(Error::Validation)?;
        Ok(Self {
            config,
            accounts,
            audit,
            verifier,
            clock: Arc::new(SystemClock),
            account_locks: Arc::new(DashMap::new()),
            notifications: Vec::new(),
        })
    }

    /// Replace the system clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a notification handler for guard events
    ///
    /// Multiple handlers can be registered. Events are dispatched
    /// via `tokio::spawn` (fire-and-forget).
    pub fn with_notification(mut self, handler: Arc<dyn GuardNotification>) -> Self {
        self.notifications.push(handler);
        self
    }

    /// Guard configuration
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Process a login attempt at the clock's current time
    pub async fn attempt_login(
        &self,
        account_id: &str,
        credential: &Credential,
        source_ip: Option<IpAddr>,
    ) -> Result<LoginOutcome> {
        let now = self.clock.now();
        self.attempt_login_at(account_id, credential, source_ip, now)
            .await
    }

    /// Process a login attempt at `now`
    ///
    /// `Err` is returned only when a store fails; every login decision is a
    /// [`LoginOutcome`].
    pub async fn attempt_login_at(
        &self,
        account_id: &str,
        credential: &Credential,
        source_ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome> {
        let lock = self.account_lock(account_id);
        let precheck = {
            let _held = lock.lock().await;
            self.precheck(account_id, source_ip, now).await
        };
        self.release_account_lock(account_id, lock);

        match precheck? {
            Precheck::Proceed => {}
            Precheck::Blocked(rejection) => return Ok(LoginOutcome::Rejected(rejection)),
            Precheck::NotFound => {
                debug!(account_id, "Login attempt for unknown account");
                return Ok(LoginOutcome::AccountNotFound);
            }
        }

        let verdict = self.verify(account_id, credential).await;

        let lock = self.account_lock(account_id);
        let outcome = {
            let _held = lock.lock().await;
            self.apply_verdict(account_id, verdict, source_ip, now).await
        };
        self.release_account_lock(account_id, lock);
        outcome
    }

    /// Administrative unlock: reopen the account and clear the counter
    ///
    /// Calling this on an open account leaves it open and still records
    /// the action.
    pub async fn force_unlock(&self, account_id: &str) -> Result<()> {
        let now = self.clock.now();
        let lock = self.account_lock(account_id);
        let result = {
            let _held = lock.lock().await;
            self.force_unlock_locked(account_id, now).await
        };
        self.release_account_lock(account_id, lock);
        result
    }

    /// Administrative lock with no expiry, cleared only by [`force_unlock`](Self::force_unlock)
    pub async fn lock_account(&self, account_id: &str) -> Result<()> {
        let now = self.clock.now();
        let lock = self.account_lock(account_id);
        let result = {
            let _held = lock.lock().await;
            self.lock_account_locked(account_id, now).await
        };
        self.release_account_lock(account_id, lock);
        result
    }

    /// Lock state of an account at the clock's current time
    pub async fn status(&self, account_id: &str) -> Result<LockoutStatus> {
        self.status_at(account_id, self.clock.now()).await
    }

    /// Lock state of an account at `now`, without changing anything
    pub async fn status_at(&self, account_id: &str, now: DateTime<Utc>) -> Result<LockoutStatus> {
        let account = self.load(account_id).await?;
        let status = match account.state(now) {
            AccountState::Open => LockoutStatus {
                locked: false,
                failed_attempts: account.failed_attempts,
                failure_threshold: self.config.failure_threshold,
                retry_after: None,
            },
            AccountState::Locked { until } => LockoutStatus {
                locked: true,
                failed_attempts: account.failed_attempts,
                failure_threshold: self.config.failure_threshold,
                retry_after: until.map(|until| until - now),
            },
            AccountState::LockExpired => LockoutStatus {
                locked: false,
                failed_attempts: 0,
                failure_threshold: self.config.failure_threshold,
                retry_after: None,
            },
        };
        Ok(status)
    }

    async fn precheck(
        &self,
        account_id: &str,
        source_ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> Result<Precheck> {
        let Some(mut account) = self.accounts.get(account_id).await? else {
            return Ok(Precheck::NotFound);
        };

        match account.state(now) {
            AccountState::Open => Ok(Precheck::Proceed),
            AccountState::Locked { until } => {
                let rejection = self.block(&account, until, source_ip, now, None).await?;
                Ok(Precheck::Blocked(rejection))
            }
            AccountState::LockExpired => {
                self.lift_expired_lock(&mut account, source_ip, now).await?;
                Ok(Precheck::Proceed)
            }
        }
    }

    async fn verify(&self, account_id: &str, credential: &Credential) -> Verdict {
        let timeout = self.config.provider_timeout();
        match tokio::time::timeout(timeout, self.verifier.verify(account_id, credential)).await {
            Ok(verdict) => verdict,
            Err(_) => Verdict::Unavailable(format!(
                "identity provider timed out after {} ms",
                self.config.provider_timeout_ms
            )),
        }
    }

    async fn apply_verdict(
        &self,
        account_id: &str,
        verdict: Verdict,
        source_ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome> {
        // Reload: a concurrent attempt may have changed the account meanwhile
        let Some(mut account) = self.accounts.get(account_id).await? else {
            return Ok(LoginOutcome::AccountNotFound);
        };

        match account.state(now) {
            AccountState::Open => {}
            AccountState::Locked { until } => {
                let rejection = self
                    .block(
                        &account,
                        until,
                        source_ip,
                        now,
                        Some(DETAIL_LOCKED_DURING_VERIFICATION),
                    )
                    .await?;
                return Ok(LoginOutcome::Rejected(rejection));
            }
            AccountState::LockExpired => {
                self.lift_expired_lock(&mut account, source_ip, now).await?;
            }
        }

        match verdict {
            Verdict::Verified => {
                account.record_success();
                self.audit
                    .append(&self.entry(account_id, AuditAction::SuccessfulLogin, source_ip, now))
                    .await?;
                self.accounts.save(&account).await?;

                info!(account_id, "Login succeeded");
                Ok(LoginOutcome::Accepted)
            }
            Verdict::Invalid => self.record_failure(&mut account, source_ip, now, None).await,
            Verdict::Unavailable(error) => {
                let counted = self.config.count_provider_errors_as_failure;
                warn!(
                    account_id,
                    error = %error,
                    counted_as_failure = counted,
                    "Identity provider unavailable"
                );
                self.notify(GuardEvent::ProviderUnavailable {
                    account_id: account_id.to_string(),
                    error,
                    counted_as_failure: counted,
                });

                if counted {
                    self.record_failure(
                        &mut account,
                        source_ip,
                        now,
                        Some(DETAIL_PROVIDER_UNAVAILABLE),
                    )
                    .await
                } else {
                    self.audit
                        .append(
                            &self
                                .entry(account_id, AuditAction::FailedLogin, source_ip, now)
                                .with_detail(DETAIL_PROVIDER_UNAVAILABLE),
                        )
                        .await?;
                    Ok(LoginOutcome::Rejected(Rejection::new(
                        RejectReason::ProviderUnavailable,
                    )))
                }
            }
        }
    }

    async fn record_failure(
        &self,
        account: &mut Account,
        source_ip: Option<IpAddr>,
        now: DateTime<Utc>,
        detail: Option<&str>,
    ) -> Result<LoginOutcome> {
        let threshold = self.config.failure_threshold;
        let transition = account.record_failure(threshold, self.config.lockout_duration(), now);

        let (action, attempt_count) = match transition {
            FailureTransition::Counted { failed_attempts } => {
                (AuditAction::FailedLogin, failed_attempts)
            }
            FailureTransition::Locked {
                failed_attempts, ..
            } => (AuditAction::AccountLocked, failed_attempts),
        };

        let mut entry = self.entry(&account.id, action, source_ip, now);
        if let Some(detail) = detail {
            entry = entry.with_detail(detail);
        }
        self.audit.append(&entry).await?;
        self.accounts.save(account).await?;

        debug!(
            account_id = %account.id,
            attempt_count,
            failure_threshold = threshold,
            "Login failure recorded"
        );

        self.notify(GuardEvent::FailedAttempt {
            account_id: account.id.clone(),
            attempt_count,
            failure_threshold: threshold,
        });

        match transition {
            FailureTransition::Counted { failed_attempts } => {
                let warning = self.config.warning_threshold;
                if warning > 0 && failed_attempts == warning {
                    self.notify(GuardEvent::ApproachingThreshold {
                        account_id: account.id.clone(),
                        attempt_count: failed_attempts,
                        remaining_attempts: threshold - failed_attempts,
                    });
                }
                Ok(LoginOutcome::Rejected(Rejection::new(
                    RejectReason::InvalidCredential,
                )))
            }
            FailureTransition::Locked {
                failed_attempts,
                until,
            } => {
                warn!(
                    account_id = %account.id,
                    attempt_count = failed_attempts,
                    lockout_duration_secs = self.config.lockout_duration_secs,
                    "Account locked due to repeated login failures"
                );
                self.notify(GuardEvent::AccountLocked {
                    account_id: account.id.clone(),
                    attempt_count: failed_attempts,
                    lockout_duration_secs: until.map(|_| self.config.lockout_duration_secs),
                });
                Ok(LoginOutcome::Rejected(Rejection::locked(
                    RejectReason::LockedJustNow,
                    until,
                    now,
                )))
            }
        }
    }

    async fn block(
        &self,
        account: &Account,
        until: Option<DateTime<Utc>>,
        source_ip: Option<IpAddr>,
        now: DateTime<Utc>,
        detail: Option<&str>,
    ) -> Result<Rejection> {
        let mut entry = self.entry(&account.id, AuditAction::LockoutAttemptBlocked, source_ip, now);
        if let Some(detail) = detail {
            entry = entry.with_detail(detail);
        }
        self.audit.append(&entry).await?;

        debug!(account_id = %account.id, locked_until = ?until, "Login attempt blocked by lockout");
        Ok(Rejection::locked(RejectReason::Locked, until, now))
    }

    async fn lift_expired_lock(
        &self,
        account: &mut Account,
        source_ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !account.unlock_if_expired(now) {
            return Ok(());
        }

        self.audit
            .append(
                &self
                    .entry(&account.id, AuditAction::AccountAutoUnlocked, source_ip, now)
                    .with_detail(DETAIL_EXPIRED),
            )
            .await?;
        self.accounts.save(account).await?;

        info!(account_id = %account.id, "Account unlocked after lockout expired");
        self.notify(GuardEvent::AccountUnlocked {
            account_id: account.id.clone(),
            reason: UnlockReason::Expired,
        });
        Ok(())
    }

    async fn force_unlock_locked(&self, account_id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut account = self.load(account_id).await?;
        account.unlock();

        self.audit
            .append(
                &self
                    .entry(account_id, AuditAction::AccountAutoUnlocked, None, now)
                    .with_detail(DETAIL_MANUAL),
            )
            .await?;
        self.accounts.save(&account).await?;

        info!(account_id, "Account manually unlocked (admin)");
        self.notify(GuardEvent::AccountUnlocked {
            account_id: account_id.to_string(),
            reason: UnlockReason::AdminAction,
        });
        Ok(())
    }

    async fn lock_account_locked(&self, account_id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut account = self.load(account_id).await?;
        account.lock_indefinitely();

        self.audit
            .append(
                &self
                    .entry(account_id, AuditAction::AccountLocked, None, now)
                    .with_detail(DETAIL_MANUAL),
            )
            .await?;
        self.accounts.save(&account).await?;

        warn!(account_id, "Account manually locked (admin)");
        self.notify(GuardEvent::AccountLocked {
            account_id: account_id.to_string(),
            attempt_count: account.failed_attempts,
            lockout_duration_secs: None,
        });
        Ok(())
    }

    async fn load(&self, account_id: &str) -> Result<Account> {
        self.accounts
            .get(account_id)
            .await?
            .ok_or_else(|| Error::AccountNotFound(account_id.to_string()))
    }

    fn entry(
        &self,
        account_id: &str,
        action: AuditAction,
        source_ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> AuditEntry {
        AuditEntry::new(account_id, action, now).with_source_ip(source_ip)
    }

    /// Get (or create) the mutex serializing state changes for one account
    fn account_lock(&self, account_id: &str) -> Arc<Mutex<()>> {
        self.account_locks
            .entry(account_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Drop our handle and forget the mutex if nobody else holds it
    fn release_account_lock(&self, account_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.account_locks
            .remove_if(account_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Dispatch a notification event to all registered handlers
    fn notify(&self, event: GuardEvent) {
        for handler in &self.notifications {
            let handler = Arc::clone(handler);
            let event = event.clone();
            tokio::spawn(async move {
                handler.on_event(event).await;
            });
        }
    }
}
