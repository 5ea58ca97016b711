//! Centralized facade configuration.
//!
//! All configuration comes from environment variables with sensible
//! defaults and validation. Per-service variables use the
//! `XREGISTRY_<SVC>_*` namespace, where `<SVC>` is the upper-cased
//! ecosystem name.

use std::path::PathBuf;

use crate::ecosystems::EcosystemKind;

/// Complete configuration for one facade process.
#[derive(Debug, Clone)]
pub struct FacadeConfig {
    /// Which upstream dialect this facade speaks.
    pub ecosystem: EcosystemKind,
    /// Listen port.
    pub port: u16,
    /// Bind address.
    pub host: String,
    /// Path segment a fronting router strips before dispatch.
    pub api_path_prefix: String,
    /// Fixed base URL override for composed `self` URLs.
    pub base_url: Option<String>,
    /// When set, requests must carry `Authorization: Bearer <key>`.
    pub api_key: Option<String>,
    /// Suppress trace-level request logging.
    pub quiet: bool,
    /// Disk cache directory (disjoint per facade).
    pub cache_dir: PathBuf,
    /// Advertised resource-count estimate for the group document.
    ///
    /// The upstream corpus is too large to count live; the npm default is
    /// the documented 2,000,000 estimate.
    pub packages_estimate: Option<u64>,
}

impl FacadeConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let ecosystem = match std::env::var("XREGISTRY_ECOSYSTEM") {
            Ok(raw) => raw.parse::<EcosystemKind>().map_err(|_| ConfigError::InvalidValue {
                key: "XREGISTRY_ECOSYSTEM".to_string(),
                value: raw.clone(),
                reason: "must be one of: npm, pypi, maven, oci, mcp".to_string(),
            })?,
            Err(_) => EcosystemKind::Npm,
        };
        Self::load_for(ecosystem)
    }

    /// Load configuration for a specific ecosystem (tests, embedded use).
    pub fn load_for(ecosystem: EcosystemKind) -> Result<Self, ConfigError> {
        let svc = ecosystem.service_name().to_ascii_uppercase();

        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                value: raw.clone(),
                reason: format!("must be a valid port number (0-65535): {e}"),
            })?,
            Err(_) => ecosystem.default_port(),
        };

        let base_url = env_opt(&format!("XREGISTRY_{svc}_BASEURL"));
        if let Some(url) = &base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    key: format!("XREGISTRY_{svc}_BASEURL"),
                    value: url.clone(),
                    reason: "must start with http:// or https://".to_string(),
                });
            }
        }

        let packages_estimate = match env_opt(&format!("XREGISTRY_{svc}_PACKAGES_ESTIMATE")) {
            Some(raw) => Some(raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: format!("XREGISTRY_{svc}_PACKAGES_ESTIMATE"),
                value: raw.clone(),
                reason: format!("must be a non-negative integer: {e}"),
            })?),
            None => ecosystem.default_packages_estimate(),
        };

        let cache_dir = match env_opt("XREGISTRY_CACHE_DIR") {
            Some(dir) => PathBuf::from(dir).join(ecosystem.service_name()),
            None => PathBuf::from("./cache").join(ecosystem.service_name()),
        };

        Ok(Self {
            ecosystem,
            port,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_path_prefix: std::env::var("API_PATH_PREFIX").unwrap_or_default(),
            base_url,
            api_key: env_opt(&format!("XREGISTRY_{svc}_API_KEY")),
            quiet: env_bool(&format!("XREGISTRY_{svc}_QUIET")),
            cache_dir,
            packages_estimate,
        })
    }

    /// Default configuration for an ecosystem (useful for testing).
    pub fn default_for(ecosystem: EcosystemKind) -> Self {
        Self {
            ecosystem,
            port: ecosystem.default_port(),
            host: "0.0.0.0".to_string(),
            api_path_prefix: String::new(),
            base_url: None,
            api_key: None,
            quiet: false,
            cache_dir: PathBuf::from("./cache").join(ecosystem.service_name()),
            packages_estimate: ecosystem.default_packages_estimate(),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str) -> bool {
    matches!(
        std::env::var(key).unwrap_or_default().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// A configuration value is invalid
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    /// A required configuration value is missing
    MissingRequired {
        key: String,
        hint: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value, reason } => {
                write!(f, "Invalid configuration for {}: '{}' ({})", key, value, reason)
            }
            ConfigError::MissingRequired { key, hint } => {
                write!(f, "Missing required configuration: {} ({})", key, hint)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_per_ecosystem() {
        let config = FacadeConfig::default_for(EcosystemKind::Npm);
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.packages_estimate, Some(2_000_000));
        assert_eq!(config.cache_dir, PathBuf::from("./cache/npm"));

        let config = FacadeConfig::default_for(EcosystemKind::Pypi);
        assert_eq!(config.port, 3100);
        assert_eq!(config.packages_estimate, None);
    }

    #[test]
    fn cache_dirs_are_disjoint_across_ecosystems() {
        let npm = FacadeConfig::default_for(EcosystemKind::Npm);
        let maven = FacadeConfig::default_for(EcosystemKind::Maven);
        assert_ne!(npm.cache_dir, maven.cache_dir);
    }

    #[test]
    fn invalid_value_display() {
        let err = ConfigError::InvalidValue {
            key: "PORT".to_string(),
            value: "banana".to_string(),
            reason: "not a number".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid configuration for PORT: 'banana' (not a number)");
    }
}
