//! Simulator configuration
//!
//! Loaded from an optional scenario file (format by extension) overlaid with
//! `RAMP_SIM__*` environment variables, e.g. `RAMP_SIM__RAMP__SLIPPAGE_BPS=50`
//! or `RAMP_SIM__LOG__FORMAT=json`. A `.env` file is read first.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use ramp_core::RampConfig;
use serde::{Deserialize, Serialize};

use crate::scenario::Scenario;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "RAMP_SIM";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub log: LogSettings,
    pub ramp: RampConfig,
    pub scenario: Scenario,
}

impl SimConfig {
    /// Load from `path` (if any) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        Self::finish(builder)
            .with_context(|| format!("loading simulator config from {:?}", path))
    }

    /// Parse a TOML document without environment overrides
    pub fn from_toml(text: &str) -> Result<Self> {
        Self::finish(Config::builder().add_source(File::from_str(text, FileFormat::Toml)))
    }

    fn finish(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config: SimConfig = builder.build()?.try_deserialize()?;
        config.ramp.validate()?;
        config.scenario.validate()?;
        Ok(config)
    }
}
