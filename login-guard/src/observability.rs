//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Install the JSON tracing subscriber
///
/// The filter is built from `service.log_level`; an unparsable directive
/// falls back to `info`. Calling this twice leaves the first subscriber in
/// place.
pub fn init_tracing(config: &Config) {
    let log_level = &config.service.log_level;

    let installed = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Tracing initialized for service: {}", config.service.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_repeatable() {
        let mut config = Config::default();
        config.service.log_level = "not a [valid directive".to_string();
        init_tracing(&config);
        init_tracing(&Config::default());
    }
}
