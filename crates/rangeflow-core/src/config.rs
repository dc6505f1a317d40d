//! Global configuration: `config.toml` under the XDG config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::client::{CurlClient, CurlOptions};
use crate::downloader::{
    DownloaderConfig, DEFAULT_CONCURRENCY, DEFAULT_PART_BODY_MAX_RETRIES, DEFAULT_PART_SIZE,
};
use crate::limiter::{ConcurrencyLimit, DEFAULT_MAX_TOTAL_WORKERS};

/// First-chunk backoff parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

/// libcurl transfer settings (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Bytes per second below which a transfer counts as stalled.
    pub low_speed_limit: u32,
    pub low_speed_time_secs: u64,
    /// Optional per-request receive cap in bytes per second.
    #[serde(default)]
    pub max_recv_speed: Option<u64>,
    /// Optional libcurl receive buffer size in bytes.
    #[serde(default)]
    pub buffer_size: Option<usize>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let opts = CurlOptions::default();
        Self {
            connect_timeout_secs: opts.connect_timeout.as_secs(),
            low_speed_limit: opts.low_speed_limit,
            low_speed_time_secs: opts.low_speed_time.as_secs(),
            max_recv_speed: None,
            buffer_size: None,
        }
    }
}

impl HttpConfig {
    pub fn curl_options(&self) -> CurlOptions {
        CurlOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            low_speed_limit: self.low_speed_limit,
            low_speed_time: Duration::from_secs(self.low_speed_time_secs),
            timeout: None,
            max_recv_speed: self.max_recv_speed,
            buffer_size: self.buffer_size,
        }
    }
}

/// Global configuration loaded from `~/.config/rangeflow/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeflowConfig {
    /// Target chunk size in bytes.
    pub part_size: u64,
    /// Workers per download.
    pub concurrency: usize,
    /// Retries of a failing first chunk.
    pub part_body_max_retries: u32,
    /// Process-wide cap on workers across all downloads.
    pub max_total_workers: usize,
    /// Pause before a later chunk is retried, in milliseconds.
    pub overload_retry_delay_ms: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional transfer settings; if missing, built-in defaults are used.
    #[serde(default)]
    pub http: Option<HttpConfig>,
}

impl Default for RangeflowConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            part_body_max_retries: DEFAULT_PART_BODY_MAX_RETRIES,
            max_total_workers: DEFAULT_MAX_TOTAL_WORKERS,
            overload_retry_delay_ms: 200,
            retry: None,
            http: None,
        }
    }
}

impl RangeflowConfig {
    /// Build a `DownloaderConfig` backed by a `CurlClient`.
    ///
    /// `limit` is the shared worker limit; `None` creates one sized by
    /// `max_total_workers`.
    pub fn downloader_config(&self, limit: Option<Arc<ConcurrencyLimit>>) -> DownloaderConfig {
        let retry = self.retry.clone().unwrap_or_default();
        let http = self.http.clone().unwrap_or_default();
        DownloaderConfig {
            part_size: self.part_size,
            concurrency: self.concurrency,
            part_body_max_retries: self.part_body_max_retries,
            retry_base_delay: Duration::from_millis(retry.base_delay_ms),
            retry_max_delay: Duration::from_millis(retry.max_delay_ms),
            overload_retry_delay: Duration::from_millis(self.overload_retry_delay_ms),
            client: Arc::new(CurlClient::new(http.curl_options())),
            concurrency_limit: limit
                .unwrap_or_else(|| Arc::new(ConcurrencyLimit::new(self.max_total_workers))),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rangeflow")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from the XDG config dir, creating a default file if none exists.
pub fn load_or_init() -> Result<RangeflowConfig> {
    load_or_init_at(&config_path()?)
}

/// Load configuration from `path`, writing defaults there first if it is missing.
pub fn load_or_init_at(path: &Path) -> Result<RangeflowConfig> {
    if !path.exists() {
        let default_cfg = RangeflowConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: RangeflowConfig = toml::from_str(&data)
        .with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
