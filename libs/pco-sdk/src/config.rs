//! SDK configuration.
//!
//! Layering, lowest to highest priority:
//! 1. built-in defaults
//! 2. optional YAML file
//! 3. `PCO__`-prefixed environment variables (`PCO__PAGINATION__PAGE_SIZE=50`)

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use pco_query::PaginationOptions;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.planningcenteronline.com";

/// Largest page size the API accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

const ENV_PREFIX: &str = "PCO__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub base_url: String,
    /// Page size applied by `get_paged` when neither the call nor the query
    /// sets one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_page_size: Option<u32>,
    pub pagination: PaginationOptions,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            default_page_size: None,
            pagination: PaginationOptions::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("configuration file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("invalid configuration value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl SdkConfig {
    /// Load defaults, then `path` (when given), then the environment.
    ///
    /// # Errors
    /// `MissingFile` if an explicit path does not exist, `Load` on parse
    /// failures, `Invalid` when a value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(SdkConfig::default()));

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::MissingFile {
                    path: path.to_path_buf(),
                });
            }
            tracing::debug!(path = %path.display(), "merging configuration file");
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(&figment)
    }

    /// # Errors
    /// `Load` when extraction fails, `Invalid` when validation fails.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: SdkConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// `Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(ConfigError::Invalid {
                field: "base_url",
                reason: format!("expected an http(s) URL, got '{}'", self.base_url),
            });
        }
        check_page_size("pagination.page_size", self.pagination.page_size)?;
        if let Some(size) = self.default_page_size {
            check_page_size("default_page_size", size)?;
        }
        Ok(())
    }

    /// `base_url` joined with a resource path.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn check_page_size(field: &'static str, size: u32) -> Result<(), ConfigError> {
    if (1..=MAX_PAGE_SIZE).contains(&size) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be between 1 and {MAX_PAGE_SIZE}, got {size}"),
        })
    }
}
