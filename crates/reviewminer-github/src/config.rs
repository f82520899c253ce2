//! Harvester runtime configuration

use std::path::PathBuf;
use std::time::Duration;

use reviewminer_core::HttpConfig;

use crate::api::DEFAULT_API_URL;
use crate::fetch::DEFAULT_BACKOFF;
use crate::target::Target;

/// Runtime configuration for one harvest run
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub token: Option<String>,
    pub user_agent: String,
    /// Whole-request timeout
    pub timeout: Duration,
    pub per_page: u32,
    /// Upper bound on concurrent workers
    pub workers: usize,
    pub output_dir: PathBuf,
    /// Write `[]` shards for targets with no comments
    pub write_empty_shards: bool,
    /// Hold requests while the last rate snapshot shows a spent budget
    pub enforce_rate_limit: bool,
    pub poll_interval: Duration,
    /// Added to every wait for a rate reset
    pub rate_margin: Duration,
    /// Pause before retrying a failed page
    pub backoff: Duration,
    pub targets: Vec<Target>,
}

impl Default for Config {
    fn default() -> Self {
        let http = HttpConfig::default();
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            user_agent: http.user_agent,
            timeout: http.timeout,
            per_page: 30,
            workers: 5,
            output_dir: PathBuf::from("output"),
            write_empty_shards: true,
            enforce_rate_limit: true,
            poll_interval: Duration::from_secs(1),
            rate_margin: Duration::from_secs(1),
            backoff: DEFAULT_BACKOFF,
            targets: Vec::new(),
        }
    }
}

impl Config {
    pub fn http(&self) -> HttpConfig {
        HttpConfig {
            token: self.token.clone(),
            user_agent: self.user_agent.clone(),
            timeout: self.timeout,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.workers > 0, "workers must be at least 1");
        anyhow::ensure!(
            (1..=100).contains(&self.per_page),
            "per_page must be between 1 and 100, got {}",
            self.per_page
        );
        anyhow::ensure!(!self.timeout.is_zero(), "timeout must be positive");
        anyhow::ensure!(
            !self.poll_interval.is_zero(),
            "rate poll interval must be positive"
        );
        anyhow::ensure!(
            self.api_url.starts_with("http://") || self.api_url.starts_with("https://"),
            "api_url must be an http(s) URL, got {:?}",
            self.api_url
        );
        for target in &self.targets {
            target
                .validate()
                .map_err(|e| anyhow::anyhow!("target {target}: {e}"))?;
        }
        Ok(())
    }
}
