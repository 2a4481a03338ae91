//! Service configuration
//!
//! Loaded from an optional YAML file; every section has defaults so an
//! empty file (or none at all) gives a working service. Command-line flags
//! are applied on top by the binary.

use crate::api::ApiServerConfig;
use crate::error::{Error, Result};
use crate::inventory::{AmbiguityPolicy, ExecutorConfig};
use crate::layout::DatastorePlan;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Commands one lookup may run: three queries plus a login and one retry
pub const COMMANDS_PER_LOOKUP: u64 = 5;

/// Inventory access settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InventoryConfig {
    pub executor: ExecutorConfig,
    pub ambiguity: AmbiguityPolicy,
    /// Skip TLS verification against the endpoint
    pub insecure_tls: bool,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            ambiguity: AmbiguityPolicy::BestEffort,
            insecure_tls: true,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    pub api: ApiServerConfig,
    pub inventory: InventoryConfig,
    /// Datastores used when a layout request names none
    pub layout: DatastorePlan,
}

impl ServiceConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml_str(&yaml)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let executor = &self.inventory.executor;
        if executor.cli_path.trim().is_empty() {
            return Err(Error::Configuration("inventory.executor.cliPath is empty".into()));
        }
        if executor.timeout_ms == 0 {
            return Err(Error::Configuration("inventory.executor.timeoutMs must be positive".into()));
        }
        if executor.max_output_bytes == 0 {
            return Err(Error::Configuration(
                "inventory.executor.maxOutputBytes must be positive".into(),
            ));
        }
        let worst_case_ms = executor.timeout_ms.saturating_mul(COMMANDS_PER_LOOKUP);
        if self.api.request_timeout_secs.saturating_mul(1000) < worst_case_ms {
            return Err(Error::Configuration(format!(
                "api.requestTimeoutSecs ({}) is shorter than a worst-case lookup ({} commands of {} ms)",
                self.api.request_timeout_secs, COMMANDS_PER_LOOKUP, executor.timeout_ms
            )));
        }
        self.layout.validate()
    }
}
