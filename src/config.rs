use crate::error::{Result, ScrapeError};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.firecrawl.dev";

/// Runtime configuration loaded from environment variables.
///
/// The API key stays on this side of the process: it is only ever placed in
/// the `Authorization` header and is redacted from `Debug` output.
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub request_timeout: Duration,
    pub min_delay: Duration,
    pub batch_size: u32,
    pub batch_pause: Duration,
    pub crawl_limit: u32,
    pub wait_for_ms: u64,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl Config {
    /// Build a config with defaults around the given key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            min_delay: Duration::from_secs(1),
            batch_size: 10,
            batch_pause: Duration::from_secs(5),
            crawl_limit: 10,
            wait_for_ms: 2000,
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(300),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load a `.env`-style file into the environment, then read it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        dotenvy::from_path(path).map_err(|e| {
            ScrapeError::Configuration(format!("failed to load {}: {}", path.display(), e))
        })?;
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("FIRECRAWL_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ScrapeError::Configuration("FIRECRAWL_API_KEY must be set".to_string())
            })?;

        let mut config = Self::new(api_key);

        if let Some(url) = lookup("FIRECRAWL_API_URL").filter(|u| !u.trim().is_empty()) {
            config.api_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "SCOUT_MIN_DELAY_MS")? {
            config.min_delay = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var::<u32, _>(&lookup, "SCOUT_BATCH_SIZE")? {
            config.batch_size = n;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "SCOUT_BATCH_PAUSE_MS")? {
            config.batch_pause = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "SCOUT_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var::<u32, _>(&lookup, "SCOUT_CRAWL_LIMIT")? {
            config.crawl_limit = n;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "SCOUT_WAIT_FOR_MS")? {
            config.wait_for_ms = ms;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "SCOUT_POLL_INTERVAL_SECS")? {
            config.poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "SCOUT_POLL_TIMEOUT_SECS")? {
            config.poll_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ScrapeError::Configuration(format!("{} must be a valid number", key))),
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("request_timeout", &self.request_timeout)
            .field("min_delay", &self.min_delay)
            .field("batch_size", &self.batch_size)
            .field("batch_pause", &self.batch_pause)
            .field("crawl_limit", &self.crawl_limit)
            .field("wait_for_ms", &self.wait_for_ms)
            .field("poll_interval", &self.poll_interval)
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ScrapeError::Configuration(_)));

        let err = Config::from_lookup(lookup_from(&[("FIRECRAWL_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ScrapeError::Configuration(_)));
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = Config::from_lookup(lookup_from(&[("FIRECRAWL_API_KEY", "fc-test")])).unwrap();
        assert_eq!(config.api_key, "fc-test");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.min_delay, Duration::from_secs(1));
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("FIRECRAWL_API_KEY", "fc-test"),
            ("FIRECRAWL_API_URL", "http://localhost:3002/"),
            ("SCOUT_MIN_DELAY_MS", "250"),
            ("SCOUT_BATCH_SIZE", "4"),
            ("SCOUT_CRAWL_LIMIT", "3"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:3002");
        assert_eq!(config.min_delay, Duration::from_millis(250));
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.crawl_limit, 3);
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("FIRECRAWL_API_KEY", "fc-test"),
            ("SCOUT_BATCH_SIZE", "ten"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SCOUT_BATCH_SIZE"));
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = Config::new("fc-secret-value");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("fc-secret-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
