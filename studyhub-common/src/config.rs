//! Gateway configuration loading
//!
//! Resolution priority, highest first:
//! 1. Command-line flags (applied by the binary)
//! 2. Environment variables
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! The upstream base URL list is resolved once here; handlers never read the
//! environment.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Primary upstream base URL variable
pub const EXTERNAL_API_URL_ENV: &str = "EXTERNAL_API_URL";
/// Secondary upstream base URL variable
pub const PUBLIC_EXTERNAL_API_URL_ENV: &str = "NEXT_PUBLIC_EXTERNAL_API_URL";
/// Listen address override
pub const BIND_ADDR_ENV: &str = "STUDYHUB_BIND_ADDR";

/// Hard-coded last resort in the upstream fallback chain
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://study-platform.zeabur.app";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5780";

/// Top-level gateway configuration (`gateway.toml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// External processing service location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// `EXTERNAL_API_URL`; the only base document upload accepts
    #[serde(default)]
    pub external_api_url: Option<String>,
    /// `NEXT_PUBLIC_EXTERNAL_API_URL`
    #[serde(default)]
    pub public_external_api_url: Option<String>,
    #[serde(default = "default_base_url")]
    pub default_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Session lifecycle timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Pending sessions older than this are failed by the sweeper
    #[serde(default = "default_pending_timeout_secs")]
    pub pending_timeout_secs: u64,
    /// Terminal sessions idle longer than this are removed
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Caller-side retry policy for task generation (disabled by default)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_base_url() -> String {
    DEFAULT_UPSTREAM_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_pending_timeout_secs() -> u64 {
    3 * 60
}

fn default_retention_secs() -> u64 {
    30 * 60
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            upstream: UpstreamConfig::default(),
            sessions: SessionConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            external_api_url: None,
            public_external_api_url: None,
            default_base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pending_timeout_secs: default_pending_timeout_secs(),
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

/// Trim a configured base URL; blank values count as unset
fn normalize_base(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().trim_end_matches('/'))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl UpstreamConfig {
    /// Base for endpoints that must not fall back (document upload)
    pub fn strict_base(&self) -> Option<String> {
        normalize_base(self.external_api_url.as_deref())
    }

    /// First non-empty base of `EXTERNAL_API_URL` → `NEXT_PUBLIC_EXTERNAL_API_URL`
    /// → compiled default
    ///
    /// `None` only if every entry, including the default, is blank.
    pub fn resolved_base(&self) -> Option<String> {
        [
            self.external_api_url.as_deref(),
            self.public_external_api_url.as_deref(),
            Some(self.default_base_url.as_str()),
        ]
        .into_iter()
        .find_map(normalize_base)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SessionConfig {
    pub fn pending_timeout(&self) -> Duration {
        Duration::from_secs(self.pending_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl GatewayConfig {
    /// Load configuration: TOML file, then environment overrides
    ///
    /// An explicitly given path must exist. Without one, the platform config
    /// file is used when present; otherwise compiled defaults apply.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::from_toml_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_toml_file(&path)?,
                None => {
                    info!("No gateway config file found, using compiled defaults");
                    Self::default()
                }
            },
        };

        config.apply_env();
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read config {} failed: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{} ({})", e, path.display())))?;
        info!("Loaded gateway config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// Blank values are ignored so an empty variable never masks a value
    /// from the config file.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_blank(EXTERNAL_API_URL_ENV) {
            self.upstream.external_api_url = Some(url);
        }
        if let Some(url) = non_blank(PUBLIC_EXTERNAL_API_URL_ENV) {
            self.upstream.public_external_api_url = Some(url);
        }
        if let Some(addr) = non_blank(BIND_ADDR_ENV) {
            self.bind_addr = addr;
        }
    }

    /// Log the effective upstream configuration
    pub fn log_summary(&self) {
        match self.upstream.strict_base() {
            Some(base) => info!("Document upload upstream: {}", base),
            None => warn!(
                "{} not set: document upload will answer 500",
                EXTERNAL_API_URL_ENV
            ),
        }
        match self.upstream.resolved_base() {
            Some(base) => info!("Upstream base (fallback chain): {}", base),
            None => warn!("No upstream base configured"),
        }
    }
}

/// Platform config file location (`~/.config/studyhub/gateway.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("studyhub").join("gateway.toml"))
}
