use std::env;
use std::time::Duration;

use assess_core::model::default_stale_after;
use url::Url;

use crate::error::ConfigError;

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5 * 60;

/// Timing knobs for the stats synchronizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    stale_after: chrono::Duration,
    refresh_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stale_after: default_stale_after(),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn with_stale_after(mut self, stale_after: chrono::Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    #[must_use]
    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    #[must_use]
    pub fn stale_after(&self) -> chrono::Duration {
        self.stale_after
    }

    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }
}

/// Where the remote stats service lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    base_url: Url,
    timeout: Duration,
}

impl GatewayConfig {
    /// Validate a base URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if the URL does not parse or is not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(base_url.trim())
            .map_err(|_| ConfigError::InvalidBaseUrl(base_url.to_owned()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl(base_url.to_owned()));
        }
        Ok(Self {
            base_url: parsed,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `ASSESS_API_BASE_URL` and `ASSESS_API_TIMEOUT_SECS`.
    ///
    /// Returns `Ok(None)` when no base URL is configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a configured value is invalid.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`GatewayConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a configured value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let Some(base_url) = lookup("ASSESS_API_BASE_URL").filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };
        let mut config = Self::new(&base_url)?;
        if let Some(raw) = lookup("ASSESS_API_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
            if secs == 0 {
                return Err(ConfigError::InvalidTimeout(raw));
            }
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(Some(config))
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `host:port` of the service, used for connectivity probing.
    #[must_use]
    pub fn socket_addr(&self) -> Option<String> {
        let host = self.base_url.host_str()?;
        let port = self.base_url.port_or_known_default()?;
        Some(format!("{host}:{port}"))
    }
}
