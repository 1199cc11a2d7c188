//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `LOGIN_GUARD_`, nesting separator `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/login-guard/config.toml
//! 4. System directory: /etc/login-guard/config.toml
//! 5. Default values
//!
//! For example `LOGIN_GUARD_GUARD__FAILURE_THRESHOLD=10` overrides
//! `guard.failure_threshold`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::guard::GuardConfig;
#[cfg(feature = "keycloak")]
use crate::verifier::KeycloakConfig;

const ENV_PREFIX: &str = "LOGIN_GUARD_";
const ENV_SEPARATOR: &str = "__";
const XDG_PREFIX: &str = "login-guard";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Lockout policy
    #[serde(default)]
    pub guard: GuardConfig,

    /// Keycloak identity provider (optional)
    #[cfg(feature = "keycloak")]
    #[serde(default)]
    pub keycloak: Option<KeycloakConfig>,
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name, used in log output
    #[serde(default = "default_name")]
    pub name: String,

    /// Log level directive (e.g. `info`, `login_guard=debug`)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_name() -> String {
    "login-guard".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Config files found in the search paths are merged lowest priority
    /// first; environment variables override them all.
    pub fn load() -> Result<Self> {
        let config_paths = Self::find_config_paths();

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR)))
    }

    /// Load configuration from a specific file
    ///
    /// This bypasses the search paths. A missing file leaves the defaults
    /// in place. Environment variables still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR));

        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check all sections for invalid values
    pub fn validate(&self) -> Result<()> {
        self.guard.validate().map_err(Error::Validation)?;

        #[cfg(feature = "keycloak")]
        if let Some(keycloak) = &self.keycloak {
            if keycloak.realm.is_empty() || keycloak.client_id.is_empty() {
                return Err(Error::Validation(
                    "keycloak realm and client_id must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Find all possible config file paths
    ///
    /// Returns paths in priority order (highest first):
    /// 1. Current working directory
    /// 2. XDG config directory
    /// 3. System directory
    fn find_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(XDG_PREFIX);
        if let Some(path) = xdg_dirs.find_config_file("config.toml") {
            paths.push(path);
        }

        paths.push(PathBuf::from("/etc").join(XDG_PREFIX).join("config.toml"));
        paths
    }
}
