//! # Configuration Settings
//!
//! Defines the configuration structure for the Gateplane gateway core.
//! Values load from `GATEPLANE_*` environment variables (with `__` as the
//! nesting separator, e.g. `GATEPLANE_OBSERVABILITY__LOG_LEVEL=debug`).

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct GatewayConfig {
    /// Tenant this gateway instance serves; endpoints declaring tenant
    /// lists that do not contain it are not deployed
    #[serde(default)]
    pub tenant: Option<String>,

    /// Observability configuration
    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let config: GatewayConfig = config::Config::builder()
            .add_source(config::Environment::with_prefix("GATEPLANE").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    /// Custom validation logic that goes beyond what the validator crate can do
    fn validate_custom(&self) -> Result<()> {
        if let Some(tenant) = &self.tenant {
            if tenant.trim().is_empty() {
                return Err(Error::config("Tenant cannot be blank when set"));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.observability.log_level.as_str()) {
            return Err(Error::config(format!(
                "Log level must be one of {:?}, got '{}'",
                valid_levels, self.observability.log_level
            )));
        }

        Ok(())
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Base log level when `RUST_LOG` is unset
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable text
    pub json_logs: bool,

    /// Enable metrics recording
    pub enable_metrics: bool,

    /// Service name attached to telemetry
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            enable_metrics: true,
            service_name: "gateplane".to_string(),
        }
    }
}
