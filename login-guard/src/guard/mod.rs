//! Login lockout guard
//!
//! [`LoginGuard`] wraps every authentication attempt. After
//! [`GuardConfig::failure_threshold`] consecutive failures the account is
//! locked for [`GuardConfig::lockout_duration_secs`]; while locked, attempts
//! are rejected without contacting the identity provider. The lock is lifted
//! on the first attempt after it expires, or by an administrator through
//! [`LoginGuard::force_unlock`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use login_guard::prelude::*;
//!
//! let accounts = Arc::new(InMemoryAccountStore::new());
//! accounts.register("alice@example.com")?;
//!
//! let guard = LoginGuard::new(
//!     GuardConfig::default(),
//!     accounts,
//!     Arc::new(InMemoryAuditStore::new()),
//!     Arc::new(KeycloakVerifier::new(keycloak_config)?),
//! )?;
//!
//! let outcome = guard
//!     .attempt_login("alice@example.com", &Credential::new(password), Some(ip))
//!     .await?;
//! ```

pub mod config;
pub mod notification;
pub mod service;

pub use config::GuardConfig;
pub use notification::{GuardEvent, GuardNotification, UnlockReason};
pub use service::{LockoutStatus, LoginGuard, LoginOutcome, RejectReason, Rejection};
