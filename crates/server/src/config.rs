//! Server configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "DIAGNOSIS_CONFIG";

/// Config file picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "diagnosis.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port for prediction, health and metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding the predictor and scaler artifacts
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Upper bound on a single inference, including queueing
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Attach diagnostic traces when a request does not say
    #[serde(default)]
    pub trace_by_default: bool,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_request_timeout_ms() -> u64 {
    2000
}

fn default_service_name() -> String {
    "diagnosis-server".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_port: default_api_port(),
            model_dir: default_model_dir(),
            request_timeout_ms: default_request_timeout_ms(),
            trace_by_default: false,
            service_name: default_service_name(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the config file (if any) and `DIAGNOSIS_*` env vars
    pub fn load() -> Result<Self> {
        let file = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let required = file.is_some();
        let file = file.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&file, required)
    }

    /// Environment variables take precedence over the file
    pub fn load_from(file: &Path, required: bool) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(file).required(required))
            .add_source(config::Environment::with_prefix("DIAGNOSIS").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.api_port)
    }
}
