use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

const DEFAULT_API_BASE_URL: &str = "https://pub.orcid.org/v3.0";
const DEFAULT_CACHE_DIR_NAME: &str = "ORCID_JSON";

/// Root application configuration, loaded from `~/.config/vitae/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub output: OutputConfig,
    pub enrich: EnrichConfig,
}

/// ORCID public API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub work_detail_timeout_secs: u64,
    pub max_retries: u32,
    pub rate_limit_delay_ms: u64,
    pub backoff_ms: u64,
    /// Max work-detail fetches in flight at once.
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub dir_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Authors shown in typeset lists before "et al.".
    pub author_limit: usize,
    pub json_indent: usize,
}

/// DOI content-negotiation settings for the opt-in enrichment pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub rate_limit_delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailto: Option<String>,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: 60,
            work_detail_timeout_secs: 30,
            max_retries: 3,
            rate_limit_delay_ms: 300,
            backoff_ms: 500,
            max_concurrent_requests: 5,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 7 * 24 * 60 * 60,
            dir_name: DEFAULT_CACHE_DIR_NAME.to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            author_limit: 5,
            json_indent: 2,
        }
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            base_url: "https://doi.org".to_string(),
            timeout_secs: 10,
            max_retries: 2,
            backoff_ms: 500,
            rate_limit_delay_ms: 300,
            mailto: None,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/vitae/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("VITAE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("vitae")
            .join("config.toml")
    }

    /// Load config from the standard path with environment overrides applied.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a specific path, falling back to defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate();
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Apply `ORCID_API_BASE_URL`, `ORCID_CACHE_TTL` and `ORCID_API_TIMEOUT`.
    /// Numeric overrides that don't parse are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("ORCID_API_BASE_URL") {
            self.api.base_url = base_url;
        }
        if let Some(ttl) = lookup("ORCID_CACHE_TTL").and_then(|v| v.trim().parse().ok()) {
            self.cache.ttl_seconds = ttl;
        }
        if let Some(timeout) = lookup("ORCID_API_TIMEOUT").and_then(|v| v.trim().parse().ok()) {
            self.api.timeout_secs = timeout;
        }
    }

    /// Reset values that could redirect traffic or escape the cache directory.
    pub fn validate(&mut self) {
        if !self.api.base_url.starts_with("https://") {
            warn!(base_url = %self.api.base_url, "rejecting non-HTTPS api.base_url");
            self.api.base_url = DEFAULT_API_BASE_URL.to_string();
        }

        let dir_name = &self.cache.dir_name;
        if dir_name.is_empty()
            || dir_name.contains('/')
            || dir_name.contains('\\')
            || dir_name.contains("..")
        {
            warn!(dir_name = %dir_name, "rejecting unsafe cache.dir_name");
            self.cache.dir_name = DEFAULT_CACHE_DIR_NAME.to_string();
        }
    }

    // ─── Derived paths ─────────────────────────────────────

    /// Directory holding cached ORCID records under `data_dir`.
    pub fn cache_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.cache.dir_name)
    }
}
