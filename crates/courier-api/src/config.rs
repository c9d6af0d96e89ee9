//! Configuration types for the HTTP service
//!
//! Every field carries a serde default, so a partial file (or no file at all)
//! deserializes into a complete [`ServiceConfig`]. Whether the result is
//! usable is decided by [`ServiceConfig::validate`].

use crate::errors::ConfigError;
use courier_core::{
    context::DEFAULT_API_BASE_URL,
    receiver::{DEFAULT_SIGNATURE_HEADER, DEFAULT_TIMESTAMP_HEADER},
    verification::DEFAULT_FRESHNESS_WINDOW_SECONDS,
    TenantId,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt};
use tracing::info;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_FILE_ENV: &str = "COURIER_CONFIG_FILE";

/// Prefix of configuration environment variables (`COURIER__SERVER__PORT`).
pub const ENV_PREFIX: &str = "COURIER";

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Webhook authentication and routing settings
    pub webhooks: WebhookConfig,

    /// Outbound platform API settings
    pub api: ApiConfig,

    /// Statically installed tenants backing the credential store
    pub installations: Vec<InstallationConfig>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check the configuration for values the service cannot run with.
    ///
    /// # Errors
    ///
    /// * `ConfigError::Missing` - no signing secret configured
    /// * `ConfigError::Invalid` - any other unusable value
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.webhooks.validate()?;
        self.api.validate()?;

        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for (index, installation) in self.installations.iter().enumerate() {
            if TenantId::new(installation.tenant_id.as_str()).is_err() {
                return Err(ConfigError::Invalid {
                    message: format!("installations[{}].tenant_id must not be empty", index),
                });
            }
            if installation.token.is_empty() {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "installations[{}] ({}) has an empty token",
                        index, installation.tenant_id
                    ),
                });
            }
            if !seen.insert(installation.tenant_id.as_str()) {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "tenant {} is installed more than once",
                        installation.tenant_id
                    ),
                });
            }
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Time allowed for in-flight work to finish on shutdown
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Webhook authentication and routing configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook endpoint path
    pub endpoint_path: String,

    /// Header carrying the request timestamp
    pub timestamp_header: String,

    /// Header carrying the request signature
    pub signature_header: String,

    /// Shared secret used to verify request signatures
    pub signing_secret: String,

    /// Maximum allowed clock difference for a request timestamp
    pub freshness_window_seconds: u64,
}

impl WebhookConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_secret.is_empty() {
            return Err(ConfigError::Missing {
                key: "webhooks.signing_secret".to_string(),
            });
        }
        if !self.endpoint_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!(
                    "webhooks.endpoint_path must start with '/', got '{}'",
                    self.endpoint_path
                ),
            });
        }
        if self.endpoint_path == "/health" {
            return Err(ConfigError::Invalid {
                message: "webhooks.endpoint_path collides with the health endpoint".to_string(),
            });
        }
        if self.timestamp_header.is_empty() || self.signature_header.is_empty() {
            return Err(ConfigError::Invalid {
                message: "webhook header names must not be empty".to_string(),
            });
        }
        self.freshness_window()?;
        Ok(())
    }

    /// Freshness window as a duration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for a zero or out-of-range window.
    pub fn freshness_window(&self) -> Result<chrono::Duration, ConfigError> {
        let invalid = || ConfigError::Invalid {
            message: format!(
                "webhooks.freshness_window_seconds must be between 1 and {}, got {}",
                i32::MAX,
                self.freshness_window_seconds
            ),
        };

        if self.freshness_window_seconds == 0 {
            return Err(invalid());
        }
        let seconds = i32::try_from(self.freshness_window_seconds).map_err(|_| invalid())?;
        Ok(chrono::Duration::seconds(i64::from(seconds)))
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/events".to_string(),
            timestamp_header: DEFAULT_TIMESTAMP_HEADER.to_string(),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            signing_secret: String::new(),
            freshness_window_seconds: DEFAULT_FRESHNESS_WINDOW_SECONDS as u64,
        }
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("endpoint_path", &self.endpoint_path)
            .field("timestamp_header", &self.timestamp_header)
            .field("signature_header", &self.signature_header)
            .field("signing_secret", &"<REDACTED>")
            .field("freshness_window_seconds", &self.freshness_window_seconds)
            .finish()
    }
}

/// Outbound platform API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL that API method names are resolved against
    pub base_url: String,
}

impl ApiConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_base_url().map(|_| ())
    }

    /// Parse the base URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when the URL does not parse.
    pub fn parsed_base_url(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.base_url).map_err(|e| ConfigError::Invalid {
            message: format!("api.base_url '{}' is not a valid URL: {}", self.base_url, e),
        })
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

/// A tenant installation: the tenant and the bot token issued to it.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallationConfig {
    pub tenant_id: String,
    pub token: String,
}

impl fmt::Debug for InstallationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallationConfig")
            .field("tenant_id", &self.tenant_id)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load the service configuration from files and the environment.
///
/// Sources, later ones overriding earlier ones:
///
/// 1. `/etc/courier/service.yaml`
/// 2. `./config/service.yaml`
/// 3. the file named by `COURIER_CONFIG_FILE` (must exist when set)
/// 4. `COURIER__`-prefixed environment variables, `__` separating sections
///    (`COURIER__SERVER__PORT=9090` sets `server.port`)
///
/// The loaded configuration is validated before it is returned.
///
/// # Errors
///
/// * `ConfigError::Loading` - a source is unreadable or has the wrong shape
/// * `ConfigError::Missing` / `ConfigError::Invalid` - validation failed
pub fn load_config() -> Result<ServiceConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/courier/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Ok(explicit_path) = std::env::var(CONFIG_FILE_ENV) {
        if !explicit_path.is_empty() {
            info!(path = %explicit_path, "Loading configuration from explicit path");
            builder = builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }
    }

    let service_config: ServiceConfig = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;

    service_config.validate()?;
    Ok(service_config)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
