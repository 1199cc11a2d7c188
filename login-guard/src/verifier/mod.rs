//! Identity verifier trait and types
//!
//! The guard never inspects credentials itself; it hands them to an
//! [`IdentityVerifier`] and acts on the returned [`Verdict`]. The guard owns
//! the timeout, so implementations need not enforce one.

use async_trait::async_trait;

#[cfg(feature = "keycloak")]
pub mod keycloak;

#[cfg(feature = "keycloak")]
pub use keycloak::{KeycloakConfig, KeycloakVerifier};

/// Opaque secret presented by the caller
///
/// The value is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Access the secret for forwarding to a provider
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<&str> for Credential {
    fn from(secret: &str) -> Self {
        Self::new(secret)
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

/// Outcome of one verification call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Credential accepted
    Verified,
    /// Credential rejected by the provider
    Invalid,
    /// Provider unreachable, timed out, or returned an unexpected error
    Unavailable(String),
}

/// External credential check
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `credential` for `account_id`
    async fn verify(&self, account_id: &str, credential: &Credential) -> Verdict;
}
