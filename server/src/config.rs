//! Server configuration.

use std::time::Duration;

use fxscrape_common::constants;
use fxscrape_fx::{FxEngineConfig, SchedulerConfig, Selectors, DEFAULT_USER_AGENT};

/// Upstream fetch configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Root URL of the upstream site.
    pub base_url: String,
    /// User agent sent with every fetch.
    pub user_agent: String,
    /// Per-unit fetch timeout.
    pub fetch_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: fxscrape_fx::extractor::DEFAULT_UPSTREAM.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout: constants::fetch_timeout()
                .to_std()
                .unwrap_or(Duration::from_secs(60)),
        }
    }
}

/// Batch execution configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum fetches in flight per batch.
    pub max_concurrency: usize,
    /// Extra attempts for fetch and timeout failures.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_backoff: Duration,
    /// Longest accepted time series, in days.
    pub max_timeseries_days: usize,
    /// Most symbols fetched one by one in a single request.
    pub max_symbols: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            max_retries: 0,
            retry_backoff: Duration::from_millis(250),
            max_timeseries_days: constants::MAX_TIMESERIES_DAYS,
            max_symbols: constants::MAX_SYMBOLS,
        }
    }
}

/// Main server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Upstream configuration.
    pub upstream: UpstreamConfig,
    /// Batch configuration.
    pub batch: BatchConfig,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 1323,
            upstream: UpstreamConfig::default(),
            batch: BatchConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("FXSCRAPE_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Some(port) = lookup("FXSCRAPE_LISTEN_PORT").and_then(|v| v.parse().ok()) {
            config.listen_port = port;
        }

        if let Some(url) = lookup("FXSCRAPE_UPSTREAM_URL") {
            config.upstream.base_url = url;
        }

        if let Some(agent) = lookup("FXSCRAPE_USER_AGENT") {
            config.upstream.user_agent = agent;
        }

        if let Some(secs) = lookup("FXSCRAPE_FETCH_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.upstream.fetch_timeout = Duration::from_secs(secs);
        }

        if let Some(max) = lookup("FXSCRAPE_MAX_CONCURRENCY").and_then(|v| v.parse().ok()) {
            config.batch.max_concurrency = max;
        }

        if let Some(retries) = lookup("FXSCRAPE_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            config.batch.max_retries = retries;
        }

        if let Some(ms) = lookup("FXSCRAPE_RETRY_BACKOFF_MS").and_then(|v| v.parse().ok()) {
            config.batch.retry_backoff = Duration::from_millis(ms);
        }

        if let Some(days) = lookup("FXSCRAPE_MAX_TIMESERIES_DAYS").and_then(|v| v.parse().ok()) {
            config.batch.max_timeseries_days = days;
        }

        if let Some(max) = lookup("FXSCRAPE_MAX_SYMBOLS").and_then(|v| v.parse().ok()) {
            config.batch.max_symbols = max;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            return Err("Upstream URL must be http or https".to_string());
        }

        if self.upstream.fetch_timeout.is_zero() {
            return Err("Fetch timeout cannot be zero".to_string());
        }

        if self.batch.max_concurrency == 0 {
            return Err("Max concurrency cannot be 0".to_string());
        }

        if self.batch.max_timeseries_days == 0 {
            return Err("Max time series days cannot be 0".to_string());
        }

        if self.batch.max_symbols == 0 {
            return Err("Max symbols cannot be 0".to_string());
        }

        Ok(())
    }

    /// Engine configuration derived from this server configuration.
    pub fn engine_config(&self) -> FxEngineConfig {
        FxEngineConfig {
            scheduler: SchedulerConfig {
                max_concurrency: self.batch.max_concurrency,
                unit_timeout: self.upstream.fetch_timeout,
                max_retries: self.batch.max_retries,
                retry_backoff: self.batch.retry_backoff,
            },
            selectors: Selectors::default(),
            upstream_url: self.upstream.base_url.clone(),
            max_timeseries_days: self.batch.max_timeseries_days,
            max_symbols: self.batch.max_symbols,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_ok!(config.validate());
        assert_eq!(config.listen_port, 1323);
        assert_eq!(config.upstream.fetch_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = ServerConfig::default();
        config.listen_port = 0;
        assert_err!(config.validate());

        let mut config = ServerConfig::default();
        config.batch.max_concurrency = 0;
        assert_err!(config.validate());

        let mut config = ServerConfig::default();
        config.batch.max_symbols = 0;
        assert_err!(config.validate());

        let mut config = ServerConfig::default();
        config.upstream.base_url = "ftp://upstream".to_string();
        assert_err!(config.validate());
    }

    #[test]
    fn test_from_lookup_overrides_and_ignores_garbage() {
        let vars: HashMap<&str, &str> = [
            ("FXSCRAPE_LISTEN_PORT", "8081"),
            ("FXSCRAPE_MAX_CONCURRENCY", "16"),
            ("FXSCRAPE_FETCH_TIMEOUT_SECS", "not-a-number"),
            ("FXSCRAPE_UPSTREAM_URL", "http://localhost:9000"),
            ("FXSCRAPE_MAX_SYMBOLS", "10"),
        ]
        .into();
        let config = ServerConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.listen_port, 8081);
        assert_eq!(config.batch.max_concurrency, 16);
        assert_eq!(config.upstream.fetch_timeout, Duration::from_secs(60));

        let engine = config.engine_config();
        assert_eq!(engine.scheduler.max_concurrency, 16);
        assert_eq!(engine.upstream_url, "http://localhost:9000");
        assert_eq!(engine.max_symbols, 10);
    }
}
