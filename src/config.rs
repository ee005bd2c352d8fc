use serde::Deserialize;

use crate::geo::DEFAULT_DIRECTIONS_BASE;
use crate::ParkError;

pub const ENV_BACKEND_URL: &str = "PARK_BACKEND_URL";
pub const ENV_BACKEND_KEY: &str = "PARK_BACKEND_KEY";
pub const ENV_PLOTS_TABLE: &str = "PARK_PLOTS_TABLE";
pub const ENV_DIRECTIONS_BASE: &str = "PARK_DIRECTIONS_BASE";

pub const DEFAULT_PLOTS_TABLE: &str = "plots";

fn default_plots_table() -> String {
    DEFAULT_PLOTS_TABLE.to_string()
}

fn default_directions_base() -> String {
    DEFAULT_DIRECTIONS_BASE.to_string()
}

/// Connection settings for the backend and link formatting.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ParkConfig {
    /// Base URL of the backend project, e.g. `https://xyz.backend.example`.
    pub backend_url: String,
    /// Public (anon) API key sent with every request.
    pub api_key: String,
    #[serde(default = "default_plots_table")]
    pub plots_table: String,
    #[serde(default = "default_directions_base")]
    pub directions_base: String,
}

impl ParkConfig {
    pub fn new(backend_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        ParkConfig {
            backend_url: backend_url.into(),
            api_key: api_key.into(),
            plots_table: default_plots_table(),
            directions_base: default_directions_base(),
        }
    }

    /// Reads the configuration from `PARK_*` environment variables.
    ///
    /// `PARK_BACKEND_URL` and `PARK_BACKEND_KEY` are required; `PARK_PLOTS_TABLE`
    /// and `PARK_DIRECTIONS_BASE` fall back to their defaults.
    pub fn from_env() -> Result<Self, ParkError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ParkConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ParkError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ParkError::Config(format!("{} is not set", key)))
        };
        let optional = |key: &str, default: fn() -> String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default)
        };

        let config = ParkConfig {
            backend_url: required(ENV_BACKEND_URL)?,
            api_key: required(ENV_BACKEND_KEY)?,
            plots_table: optional(ENV_PLOTS_TABLE, default_plots_table),
            directions_base: optional(ENV_DIRECTIONS_BASE, default_directions_base),
        };
        log::debug!(
            "Loaded config: backend_url={}, plots_table={}",
            config.backend_url,
            config.plots_table
        );
        Ok(config)
    }

    /// Parses a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, ParkError> {
        let config: ParkConfig = serde_json::from_str(json)?;
        if config.backend_url.trim().is_empty() || config.api_key.trim().is_empty() {
            return Err(ParkError::Config(
                "backend_url and api_key must not be empty".to_string(),
            ));
        }
        Ok(config)
    }
}
