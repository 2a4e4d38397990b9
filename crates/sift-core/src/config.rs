//! Client configuration
//!
//! Config is resolved in layers:
//! 1. Embedded defaults (compiled into binary from `config/client.toml`)
//! 2. Override file: explicit path, else `~/.local/share/sift/config/client.toml`
//! 3. Environment: `SIFT_API_URL`, `SIFT_SUBMIT_TIMEOUT_SECS`
//!
//! Every endpoint path is configurable so the same controllers can drive
//! deployments that expose the processing service under different routes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::ReceiptId;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/client.toml");

/// Paths for each call of the processing service. `{id}` is substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub submit: String,
    pub duplicate_pair: String,
    pub receipt: String,
    pub list: String,
    pub approve: String,
    pub reject: String,
    pub insights: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            submit: "/process".to_string(),
            duplicate_pair: "/duplicate-pair/{id}".to_string(),
            receipt: "/receipt/{id}".to_string(),
            list: "/receipts".to_string(),
            approve: "/approve/{id}".to_string(),
            reject: "/reject/{id}".to_string(),
            insights: "/analytics/spending".to_string(),
        }
    }
}

impl EndpointConfig {
    /// Expand a path template for a specific receipt
    ///
    /// The id is percent-encoded as a single path segment, so `/`, `?` and
    /// `#` cannot redirect the call to another route. Dot segments are
    /// refused since URL parsing would resolve them away.
    pub fn with_id(template: &str, id: &ReceiptId) -> Result<String> {
        let raw = id.as_str();
        if matches!(raw, "" | "." | "..") {
            return Err(Error::validation(format!("Invalid receipt id '{}'", raw)));
        }

        let mut url = reqwest::Url::parse("http://localhost/")
            .map_err(|e| Error::Config(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config("Cannot build receipt path".into()))?
            .clear()
            .push(raw);
        let segment = url.path().trim_start_matches('/');
        Ok(template.replace("{id}", segment))
    }
}

/// Resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Upper bound on the whole submit request (upload + server processing)
    pub submit_timeout: Duration,
    /// Upper bound on every other request
    pub request_timeout: Duration,
    pub upload_chunk_size: usize,
    pub endpoints: EndpointConfig,
    /// Override file the config was read from, if any
    pub source: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            submit_timeout: Duration::from_secs(120),
            request_timeout: Duration::from_secs(30),
            upload_chunk_size: 64 * 1024,
            endpoints: EndpointConfig::default(),
            source: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration (override file first, then embedded defaults),
    /// then apply environment overrides
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let mut config = load_file(override_path)?;
        config.apply_env();
        Ok(config)
    }

    /// Build a config pointing at a specific server, all else default
    pub fn for_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Full URL for an endpoint path
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("SIFT_API_URL") {
            if !url.trim().is_empty() {
                debug!(url = %url, "Using SIFT_API_URL");
                self.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Some(secs) = std::env::var("SIFT_SUBMIT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.submit_timeout = Duration::from_secs(secs);
        }
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("sift").join("config").join("client.toml"))
}

fn load_file(override_path: Option<&Path>) -> Result<ClientConfig> {
    let path = match override_path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            Some(path.to_path_buf())
        }
        None => default_config_path().filter(|p| p.exists()),
    };

    let mut config = parse_config(DEFAULT_CONFIG)?;

    if let Some(path) = path {
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
        merge_config(&mut config, &content)?;
        config.source = Some(path);
    }

    Ok(config)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    server: Option<RawServer>,
    endpoints: Option<RawEndpoints>,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    base_url: Option<String>,
    submit_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    upload_chunk_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawEndpoints {
    submit: Option<String>,
    duplicate_pair: Option<String>,
    receipt: Option<String>,
    list: Option<String>,
    approve: Option<String>,
    reject: Option<String>,
    insights: Option<String>,
}

/// Parse config from TOML content on top of built-in defaults
fn parse_config(content: &str) -> Result<ClientConfig> {
    let mut config = ClientConfig::default();
    merge_config(&mut config, content)?;
    Ok(config)
}

fn merge_config(config: &mut ClientConfig, content: &str) -> Result<()> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    if let Some(server) = raw.server {
        if let Some(url) = server.base_url {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = server.submit_timeout_secs {
            config.submit_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = server.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = server.upload_chunk_bytes {
            if bytes == 0 {
                return Err(Error::Config("upload_chunk_bytes must be positive".into()));
            }
            config.upload_chunk_size = bytes;
        }
    }

    if let Some(endpoints) = raw.endpoints {
        let target = &mut config.endpoints;
        let pairs = [
            (endpoints.submit, &mut target.submit),
            (endpoints.duplicate_pair, &mut target.duplicate_pair),
            (endpoints.receipt, &mut target.receipt),
            (endpoints.list, &mut target.list),
            (endpoints.approve, &mut target.approve),
            (endpoints.reject, &mut target.reject),
            (endpoints.insights, &mut target.insights),
        ];
        for (value, slot) in pairs {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }

    Ok(())
}
