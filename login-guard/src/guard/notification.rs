//! Operator-facing guard events
//!
//! The guard reports what it decided through [`GuardEvent`]s handed to every
//! registered [`GuardNotification`]. Each delivery runs on its own spawned
//! task; the login call does not wait for it.

use async_trait::async_trait;

/// Something operators may want to act on
///
/// Delivery order between events is not guaranteed, and a handler that
/// panics only loses its own event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GuardEvent {
    /// A failure was counted against the account
    FailedAttempt {
        account_id: String,
        /// Counter after this failure
        attempt_count: u32,
        failure_threshold: u32,
    },
    /// The counter hit `warning_threshold`
    ApproachingThreshold {
        account_id: String,
        attempt_count: u32,
        /// Failures left before the account locks
        remaining_attempts: u32,
    },
    /// The account was locked, by the threshold or by an administrator
    AccountLocked {
        account_id: String,
        attempt_count: u32,
        /// `None` for a lock without expiry
        lockout_duration_secs: Option<u64>,
    },
    /// A lock was lifted
    AccountUnlocked {
        account_id: String,
        reason: UnlockReason,
    },
    /// No verdict from the identity provider (error or timeout)
    ///
    /// End users only ever see "Invalid credentials" for this; the event is
    /// how an outage shows up as an outage rather than as a burst of failed
    /// logins.
    ProviderUnavailable {
        account_id: String,
        error: String,
        /// Whether `count_provider_errors_as_failure` applied
        counted_as_failure: bool,
    },
}

/// How a lock was lifted
///
/// Displays as the audit detail string (`expired`, `manual`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum UnlockReason {
    /// First attempt after `locked_until`
    Expired,
    /// [`force_unlock`](super::LoginGuard::force_unlock)
    AdminAction,
}

impl std::fmt::Display for UnlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Expired => "expired",
            Self::AdminAction => "manual",
        })
    }
}

/// Receiver for [`GuardEvent`]s
///
/// Register with [`LoginGuard::with_notification`](super::LoginGuard::with_notification).
/// There is no error channel back to the guard, so failures inside a handler
/// are the handler's to log.
///
/// ```rust,ignore
/// struct OutagePager { client: PagerClient }
///
/// #[async_trait]
/// impl GuardNotification for OutagePager {
///     async fn on_event(&self, event: GuardEvent) {
///         if let GuardEvent::ProviderUnavailable { error, .. } = event {
///             if let Err(e) = self.client.trigger("identity provider down", &error).await {
///                 tracing::error!(error = %e, "page failed");
///             }
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait GuardNotification: Send + Sync + 'static {
    async fn on_event(&self, event: GuardEvent);
}
