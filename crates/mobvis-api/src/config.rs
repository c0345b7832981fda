use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use axum::http::HeaderValue;
use mobvis_core::{PipelineVariant, ProcessEngineConfig, Sentinel, ShapingOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::form::parse_bool;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {var}: {message}")]
    InvalidEnv { var: &'static str, message: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One extraction route and how its results are shaped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub path: String,
    #[serde(default)]
    pub sentinel: Sentinel,
    #[serde(default)]
    pub include_total_duration: bool,
    #[serde(default)]
    pub include_public_flag: bool,
}

impl EndpointConfig {
    pub fn shaping_options(&self) -> ShapingOptions {
        ShapingOptions {
            sentinel: self.sentinel,
            include_total_duration: self.include_total_duration,
        }
    }

    /// The route the web frontend calls.
    pub fn primary() -> Self {
        Self {
            path: "/api/py/dmo_extraction".to_string(),
            sentinel: Sentinel::Zero,
            include_total_duration: true,
            include_public_flag: false,
        }
    }

    /// Older route kept for existing clients.
    pub fn legacy() -> Self {
        Self {
            path: "/dmo_extraction".to_string(),
            sentinel: Sentinel::MinusOne,
            include_total_duration: false,
            include_public_flag: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
            allow_credentials: true,
        }
    }
}

impl CorsConfig {
    pub fn origin_values(&self) -> Result<Vec<HeaderValue>, ConfigError> {
        self.allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|_| ConfigError::Invalid(format!("invalid CORS origin '{origin}'")))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub max_upload_mb: usize,
    pub cors: CorsConfig,
    pub engine: ProcessEngineConfig,
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            cors: CorsConfig::default(),
            engine: ProcessEngineConfig::default(),
            endpoints: vec![EndpointConfig::primary(), EndpointConfig::legacy()],
        }
    }
}

impl ApiConfig {
    /// Defaults, then the TOML file if given, then `MOBVIS_*` environment
    /// variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("MOBVIS_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(origins) = lookup("MOBVIS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(flag) = lookup("MOBVIS_ALLOW_CREDENTIALS") {
            self.cors.allow_credentials =
                parse_bool(&flag).ok_or_else(|| ConfigError::InvalidEnv {
                    var: "MOBVIS_ALLOW_CREDENTIALS",
                    message: format!("'{flag}' is not a boolean"),
                })?;
        }
        if let Some(limit) = lookup("MOBVIS_MAX_UPLOAD_MB") {
            self.max_upload_mb =
                limit
                    .trim()
                    .parse()
                    .map_err(|err| ConfigError::InvalidEnv {
                        var: "MOBVIS_MAX_UPLOAD_MB",
                        message: format!("{err}"),
                    })?;
        }
        if let Some(command) = lookup("MOBVIS_ENGINE_COMMAND") {
            let mut parts = command.split_whitespace().map(str::to_string);
            let program = parts.next().ok_or(ConfigError::InvalidEnv {
                var: "MOBVIS_ENGINE_COMMAND",
                message: "command is empty".to_string(),
            })?;
            self.engine.program = program;
            self.engine.args = parts.collect();
        }
        if let Some(pipeline) = lookup("MOBVIS_PIPELINE") {
            self.engine.pipeline =
                pipeline
                    .parse::<PipelineVariant>()
                    .map_err(|err| ConfigError::InvalidEnv {
                        var: "MOBVIS_PIPELINE",
                        message: err.to_string(),
                    })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_mb == 0 {
            return Err(ConfigError::Invalid(
                "max_upload_mb must be greater than zero".to_string(),
            ));
        }
        if self.endpoints.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one endpoint must be configured".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if !endpoint.path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "endpoint path '{}' must start with '/'",
                    endpoint.path
                )));
            }
            if endpoint.path == "/health" || !seen.insert(endpoint.path.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "endpoint path '{}' is already in use",
                    endpoint.path
                )));
            }
        }
        if self.cors.allow_credentials && self.cors.allowed_origins.iter().any(|o| o == "*") {
            return Err(ConfigError::Invalid(
                "a wildcard origin cannot be combined with credentials".to_string(),
            ));
        }
        self.cors.origin_values()?;
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
