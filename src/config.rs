//! Configuration for the retrieval benchmark.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{BenchError, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection settings for the retrieval backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendConfig {
    /// Base URL of the service (e.g., "https://api.colivara.com")
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,
}

/// Named retry presets for different deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryProfile {
    /// 5 attempts, 2 seconds apart.
    #[default]
    Standard,
    /// 8 attempts, 3 seconds apart. For slow or overloaded deployments.
    Resilient,
}

impl RetryProfile {
    pub fn policy(&self) -> RetryPolicy {
        match self {
            RetryProfile::Standard => RetryPolicy::new(5, Duration::from_secs(2)),
            RetryProfile::Resilient => RetryPolicy::new(8, Duration::from_secs(3)),
        }
    }

    /// Parse a profile name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Some(RetryProfile::Standard),
            "resilient" => Some(RetryProfile::Resilient),
            _ => None,
        }
    }
}

/// Retry settings for the write and read paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Policy applied to each document upsert.
    pub upsert: RetryPolicy,
    /// Policy applied to each search call.
    pub search: RetryPolicy,
}

impl RetryConfig {
    pub fn from_profile(profile: RetryProfile) -> Self {
        Self {
            upsert: profile.policy(),
            search: profile.policy(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_profile(RetryProfile::default())
    }
}

fn default_top_k() -> usize {
    5
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend settings
    pub backend: BackendConfig,

    /// Retry settings
    pub retry: RetryConfig,

    /// Rank cutoff for NDCG@k
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            retry: RetryConfig::default(),
            top_k: default_top_k(),
        }
    }
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    backend: Option<BackendFileSection>,
    retry: Option<RetryFileSection>,
    top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct BackendFileSection {
    api_base: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetryFileSection {
    profile: Option<RetryProfile>,
    upsert_attempts: Option<u32>,
    search_attempts: Option<u32>,
    delay_secs: Option<f64>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (COLIVARA_BASE_URL, COLIVARA_API_KEY, BENCH_*)
    /// 2. Config file (~/.config/retrieval-bench/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from an environment lookup.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(api_base) = lookup("COLIVARA_BASE_URL") {
            self.backend.api_base = api_base;
        }

        if let Some(api_key) = lookup("COLIVARA_API_KEY") {
            self.backend.api_key = api_key;
        }

        if let Some(top_k) = lookup("BENCH_TOP_K") {
            if let Ok(k) = top_k.parse() {
                self.top_k = k;
            }
        }

        if let Some(profile) = lookup("BENCH_RETRY_PROFILE") {
            let profile = RetryProfile::parse(&profile).ok_or_else(|| {
                BenchError::Config(format!(
                    "Unknown retry profile '{}'. Expected 'standard' or 'resilient'.",
                    profile
                ))
            })?;
            self.retry = RetryConfig::from_profile(profile);
        }

        if let Some(attempts) = lookup("BENCH_UPSERT_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.retry.upsert = RetryPolicy::new(n, self.retry.upsert.delay);
            }
        }

        if let Some(attempts) = lookup("BENCH_SEARCH_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.retry.search = RetryPolicy::new(n, self.retry.search.delay);
            }
        }

        Ok(())
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;

        let file_config: ConfigFile = serde_yaml::from_str(&content)
            .map_err(|e| BenchError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(backend) = file_config.backend {
            if let Some(api_base) = backend.api_base {
                config.backend.api_base = api_base;
            }
            if let Some(api_key) = backend.api_key {
                config.backend.api_key = api_key;
            }
        }

        if let Some(retry) = file_config.retry {
            if let Some(profile) = retry.profile {
                config.retry = RetryConfig::from_profile(profile);
            }
            if let Some(secs) = retry.delay_secs {
                let delay = Duration::try_from_secs_f64(secs).map_err(|e| {
                    BenchError::Config(format!("Invalid retry delay {}: {}", secs, e))
                })?;
                config.retry.upsert.delay = delay;
                config.retry.search.delay = delay;
            }
            if let Some(n) = retry.upsert_attempts {
                config.retry.upsert = RetryPolicy::new(n, config.retry.upsert.delay);
            }
            if let Some(n) = retry.search_attempts {
                config.retry.search = RetryPolicy::new(n, config.retry.search.delay);
            }
        }

        if let Some(top_k) = file_config.top_k {
            config.top_k = top_k;
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "retrieval-bench")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present.
    pub fn validate(&self) -> Result<()> {
        if self.backend.api_base.is_empty() {
            return Err(BenchError::Config(
                "Backend base URL is required. Set COLIVARA_BASE_URL environment variable or add to config file.".to_string()
            ));
        }

        if self.backend.api_key.is_empty() {
            return Err(BenchError::Config(
                "Backend API key is required. Set COLIVARA_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.top_k == 0 {
            return Err(BenchError::Config("top_k must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_backend(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
            },
            ..Default::default()
        }
    }
}
