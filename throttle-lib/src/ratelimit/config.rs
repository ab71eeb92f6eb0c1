use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::ratelimit::ServiceName;
use crate::retry::{MarkerSet, RetryConfig};
use crate::{ConfigError, Result};

/// Default number of concurrent requests per service
const DEFAULT_CONCURRENCY: usize = 2;

/// Default interval between dispatches to the same service
const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of dispatches allowed back-to-back inside one interval
const DEFAULT_BURST: usize = 1;

/// Rate limiting configuration for one service, also used as the default
/// for services without overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Maximum number of tasks in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Minimum interval between dispatches
    #[serde(default = "default_request_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Dispatches allowed before `interval` spacing applies.
    /// With the default of 1, every pair of consecutive dispatches is at
    /// least `interval` apart.
    #[serde(default = "default_burst")]
    pub burst: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            interval: default_request_interval(),
            burst: default_burst(),
        }
    }
}

/// Default number of concurrent requests per service
const fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// Default interval between dispatches to the same service
const fn default_request_interval() -> Duration {
    DEFAULT_REQUEST_INTERVAL
}

const fn default_burst() -> usize {
    DEFAULT_BURST
}

impl RateLimitConfig {
    /// Create a `RateLimitConfig` with the given concurrency and interval
    /// and a burst of 1
    #[must_use]
    pub const fn new(concurrency: usize, interval: Duration) -> Self {
        Self {
            concurrency,
            interval,
            burst: DEFAULT_BURST,
        }
    }

    /// Set the number of back-to-back dispatches
    #[must_use]
    pub const fn with_burst(mut self, burst: usize) -> Self {
        self.burst = burst;
        self
    }

    /// Check the values a limiter for `service` would be built from
    ///
    /// # Errors
    ///
    /// Returns an error if `concurrency` or `burst` is zero
    pub fn validate(&self, service: &ServiceName) -> Result<()> {
        if self.concurrency < 1 {
            return Err(ConfigError::InvalidConcurrency {
                service: service.clone(),
                value: self.concurrency,
            });
        }
        if self.burst < 1 {
            return Err(ConfigError::InvalidBurst {
                service: service.clone(),
                value: self.burst,
            });
        }
        Ok(())
    }
}

/// Per-service configuration overrides
pub type ServiceConfigs = HashMap<ServiceName, ServiceConfig>;

/// Overrides for a specific service's rate limiting behavior.
/// Unset fields fall back to the registry defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Maximum concurrent tasks allowed for this service
    pub concurrency: Option<usize>,

    /// Minimum interval between dispatches to this service
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,

    /// Dispatches allowed back-to-back for this service
    pub burst: Option<usize>,
}

impl ServiceConfig {
    /// Get the effective maximum concurrency, falling back to the defaults
    #[must_use]
    pub fn effective_concurrency(&self, defaults: &RateLimitConfig) -> usize {
        self.concurrency.unwrap_or(defaults.concurrency)
    }

    /// Get the effective dispatch interval, falling back to the defaults
    #[must_use]
    pub fn effective_interval(&self, defaults: &RateLimitConfig) -> Duration {
        self.interval.unwrap_or(defaults.interval)
    }

    /// Get the effective burst, falling back to the defaults
    #[must_use]
    pub fn effective_burst(&self, defaults: &RateLimitConfig) -> usize {
        self.burst.unwrap_or(defaults.burst)
    }

    /// Combine these overrides with `defaults` into a complete configuration
    #[must_use]
    pub fn resolve(&self, defaults: &RateLimitConfig) -> RateLimitConfig {
        RateLimitConfig {
            concurrency: self.effective_concurrency(defaults),
            interval: self.effective_interval(defaults),
            burst: self.effective_burst(defaults),
        }
    }
}

/// Everything a [`crate::ratelimit::ServiceRegistry`] is built from.
///
/// In TOML form:
///
/// ```toml
/// [defaults]
/// concurrency = 2
/// interval = "1s"
///
/// [services.gemini]
/// concurrency = 2
/// interval = "3s"
///
/// [retry]
/// max_retries = 3
/// retryable_statuses = [429, 500, 503]
/// ```
///
/// Every section and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Used for services without an entry in `services`, and for unset
    /// fields of those with one
    pub defaults: RateLimitConfig,

    /// Per-service overrides
    pub services: ServiceConfigs,

    /// Retry settings shared by all services
    pub retry: RetryConfig,
}

impl RegistryConfig {
    /// Limits for the AI providers this crate was first written for:
    /// `gemini` with 2 concurrent requests spaced 3s apart, and `claude`
    /// with 1 concurrent request spaced 5s apart
    #[must_use]
    pub fn ai_providers() -> Self {
        let services = [
            ("gemini", 2, Duration::from_secs(3)),
            ("claude", 1, Duration::from_secs(5)),
        ]
        .into_iter()
        .map(|(name, concurrency, interval)| {
            let config = ServiceConfig {
                concurrency: Some(concurrency),
                interval: Some(interval),
                burst: None,
            };
            (ServiceName::from(name), config)
        })
        .collect();

        Self {
            services,
            ..Self::default()
        }
    }

    /// Load a configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// contains invalid values
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    /// The complete configuration for `service`
    #[must_use]
    pub fn resolve(&self, service: &ServiceName) -> RateLimitConfig {
        self.services
            .get(service)
            .map_or(self.defaults, |overrides| overrides.resolve(&self.defaults))
    }

    /// Check the defaults, every service override and the retry markers
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found
    pub fn validate(&self) -> Result<()> {
        self.defaults.validate(&ServiceName::from("defaults"))?;

        let mut services: Vec<_> = self.services.keys().collect();
        services.sort();
        for service in services {
            self.resolve(service).validate(service)?;
        }

        MarkerSet::new(&self.retry.transient_markers)?;
        Ok(())
    }
}

impl FromStr for RegistryConfig {
    type Err = ConfigError;

    /// Parse and validate a TOML configuration
    fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
