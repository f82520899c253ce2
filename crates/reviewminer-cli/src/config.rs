//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reviewminer_github::Target;
use serde::Deserialize;

/// Global configuration for reviewminer
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub workers: WorkersConfig,
    pub output: OutputConfig,
    pub rate: RateConfig,
    pub retry: RetryConfig,
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub token: Option<String>,
    #[serde(deserialize_with = "deserialize_env_string")]
    pub api_url: String,
    #[serde(deserialize_with = "deserialize_env_string")]
    pub user_agent: String,
    pub timeout_secs: u64,
    pub per_page: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        let defaults = reviewminer_github::Config::default();
        Self {
            token: None,
            api_url: defaults.api_url,
            user_agent: defaults.user_agent,
            timeout_secs: defaults.timeout.as_secs(),
            per_page: defaults.per_page,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub max: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self { max: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub write_empty_shards: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            write_empty_shards: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub enforce: bool,
    pub poll_interval_secs: u64,
    pub margin_secs: u64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            enforce: true,
            poll_interval_secs: 1,
            margin_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { backoff_secs: 5 }
    }
}

/// Legacy JSON config: `{"github_token", "repos": [{"owner", "repo"}]}`
#[derive(Debug, Deserialize)]
struct LegacyConfig {
    #[serde(default, deserialize_with = "deserialize_env_var")]
    github_token: Option<String>,
    #[serde(default)]
    repos: Vec<Target>,
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Like [`deserialize_env_var`], but the variable must be set
fn deserialize_env_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    expand_env_var(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("environment variable in {s} is not set")))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./reviewminer.toml (current directory)
    /// 2. ~/.config/reviewminer/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("reviewminer.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "reviewminer") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// `.json` files are read in the legacy `{github_token, repos}` shape.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = if path.extension().is_some_and(|ext| ext == "json") {
            let legacy: LegacyConfig = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Self::from_legacy(legacy)
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        };

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn from_legacy(legacy: LegacyConfig) -> Self {
        Self {
            github: GitHubConfig {
                token: legacy.github_token,
                ..GitHubConfig::default()
            },
            targets: legacy.repos,
            ..Self::default()
        }
    }

    /// Configured token, else `GITHUB_TOKEN`; empty counts as unset
    pub fn token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.is_empty())
    }

    /// Runtime configuration for the harvester, before CLI overrides
    pub fn harvest_config(&self) -> reviewminer_github::Config {
        reviewminer_github::Config {
            api_url: self.github.api_url.clone(),
            token: self.token(),
            user_agent: self.github.user_agent.clone(),
            timeout: Duration::from_secs(self.github.timeout_secs),
            per_page: self.github.per_page,
            workers: self.workers.max,
            output_dir: self.output.dir.clone(),
            write_empty_shards: self.output.write_empty_shards,
            enforce_rate_limit: self.rate.enforce,
            poll_interval: Duration::from_secs(self.rate.poll_interval_secs),
            rate_margin: Duration::from_secs(self.rate.margin_secs),
            backoff: Duration::from_secs(self.retry.backoff_secs),
            targets: self.targets.clone(),
        }
    }
}
