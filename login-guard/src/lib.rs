//! # login-guard
//!
//! Account lockout guard for login flows. Counts consecutive failed
//! authentication attempts per account, locks the account once a threshold is
//! reached, rejects attempts on locked accounts without contacting the
//! identity provider, and records every decision in an append-only audit
//! trail.
//!
//! ## Features
//!
//! - **Lockout state machine**: open/locked per account, lazy auto-unlock after the lockout duration
//! - **Per-account serialization**: concurrent attempts on one account never double-lock; other accounts never wait
//! - **Audit trail**: one entry per decision, in-memory or JSON lines backends
//! - **Pluggable collaborators**: account store, audit store, identity verifier and clock are traits
//! - **Keycloak**: OIDC password-grant verifier (`keycloak` feature, on by default)
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use login_guard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config);
//!
//!     let accounts = Arc::new(InMemoryAccountStore::new());
//!     accounts.register("alice@example.com")?;
//!
//!     let audit = Arc::new(JsonlAuditStore::open("audit.jsonl").await?);
//!     let keycloak = config
//!         .keycloak
//!         .clone()
//!         .ok_or_else(|| Error::Validation("missing [keycloak] section".to_string()))?;
//!     let verifier = Arc::new(KeycloakVerifier::new(keycloak)?);
//!
//!     let guard = LoginGuard::new(config.guard.clone(), accounts, audit, verifier)?;
//!
//!     match guard
//!         .attempt_login("alice@example.com", &Credential::new("hunter2"), None)
//!         .await?
//!     {
//!         LoginOutcome::Accepted => println!("welcome"),
//!         LoginOutcome::Rejected(rejection) => println!("{}", rejection.reason.user_message()),
//!         LoginOutcome::AccountNotFound => println!("Invalid credentials"),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod observability;
pub mod verifier;

/// Commonly used types
pub mod prelude {
    pub use crate::account::{Account, AccountState, AccountStore, InMemoryAccountStore};
    pub use crate::audit::{AuditAction, AuditEntry, AuditStore, InMemoryAuditStore, JsonlAuditStore};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::{Config, ServiceConfig};
    pub use crate::error::{Error, Result};
    pub use crate::guard::{
        GuardConfig, GuardEvent, GuardNotification, LockoutStatus, LoginGuard, LoginOutcome,
        RejectReason, Rejection, UnlockReason,
    };
    pub use crate::observability::init_tracing;
    pub use crate::verifier::{Credential, IdentityVerifier, Verdict};

    #[cfg(feature = "keycloak")]
    pub use crate::verifier::{KeycloakConfig, KeycloakVerifier};

    pub use async_trait::async_trait;
}
