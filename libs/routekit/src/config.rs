//! Layered configuration: defaults, then an optional YAML file, then
//! `ROUTEKIT__*` environment variables (`__` separates nested keys).

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::AxumRouterOptions;

pub const ENV_PREFIX: &str = "ROUTEKIT__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutekitConfig {
    /// Router options for controllers that registered none.
    pub default_router_options: Option<AxumRouterOptions>,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for RoutekitConfig {
    fn default() -> Self {
        Self {
            default_router_options: None,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file '{0}' does not exist")]
    MissingFile(String),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

impl RoutekitConfig {
    /// Load the layered configuration. A `path` that is given must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::MissingFile(path.display().to_string()));
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment.extract().map_err(Box::new)?;
        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }
}
