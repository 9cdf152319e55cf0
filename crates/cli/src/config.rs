//! Configuration management for the CLI
//!
//! Settings are layered: built-in defaults, then an optional config file,
//! then `ATLAS_SIZER_*` environment variables, then command-line flags.

use anyhow::{Context, Result};
use serde::Deserialize;
use sizer_lib::{ClientConfig, SampleSpan};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables read into `AppConfig`
pub const ENV_PREFIX: &str = "ATLAS_SIZER";

/// Non-credential settings of a run
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// v1 management API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// v2 management API base URL
    #[serde(default = "default_api_v2_base_url")]
    pub api_v2_base_url: String,

    /// Accept media type sent to the v2 API
    #[serde(default = "default_v2_media_type")]
    pub v2_media_type: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Tier capacity table (CSV)
    #[serde(default)]
    pub tiers_file: Option<PathBuf>,

    /// Usage thresholds table (CSV)
    #[serde(default)]
    pub thresholds_file: Option<PathBuf>,

    /// Measurement granularity (ISO-8601 duration)
    #[serde(default = "default_granularity")]
    pub granularity: String,

    /// Measurement lookback period (ISO-8601 duration)
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_api_base_url() -> String {
    ClientConfig::default().base_url
}

fn default_api_v2_base_url() -> String {
    ClientConfig::default().v2_base_url
}

fn default_v2_media_type() -> String {
    ClientConfig::default().v2_media_type
}

fn default_request_timeout() -> u64 {
    ClientConfig::default().request_timeout.as_secs()
}

fn default_granularity() -> String {
    SampleSpan::default().granularity
}

fn default_period() -> String {
    SampleSpan::default().period
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_v2_base_url: default_api_v2_base_url(),
            v2_media_type: default_v2_media_type(),
            request_timeout_secs: default_request_timeout(),
            tiers_file: None,
            thresholds_file: None,
            granularity: default_granularity(),
            period: default_period(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_base_url.clone(),
            v2_base_url: self.api_v2_base_url.clone(),
            v2_media_type: self.v2_media_type.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn sample_span(&self) -> SampleSpan {
        SampleSpan {
            granularity: self.granularity.clone(),
            period: self.period.clone(),
        }
    }
}
