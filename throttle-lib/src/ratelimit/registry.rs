use dashmap::DashMap;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use crate::Result;
use crate::ratelimit::{
    LimiterStats, LimiterStatus, RateLimitConfig, RegistryConfig, RequestLimiter, ServiceName,
    StatusMap,
};
use crate::retry::{RetryPolicy, Retryable};

/// Hands out one [`RequestLimiter`] per external service.
///
/// Limiters are created lazily on first use, from the service's entry in
/// the [`RegistryConfig`] or from its defaults. Every caller naming the
/// same service shares the same queue.
///
/// The registry is cheap to clone; clones share their limiters. Build it
/// once at startup and pass it to whatever talks to the services.
///
/// # Examples
///
/// ```
/// use throttle_lib::ratelimit::{RegistryConfig, ServiceRegistry};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = ServiceRegistry::new(RegistryConfig::ai_providers())?;
///
/// let answer = registry.enqueue("claude", || async { 42 }).await;
/// assert_eq!(answer, 42);
/// assert_eq!(registry.active_service_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    /// Limiters created so far
    limiters: Arc<DashMap<ServiceName, RequestLimiter>>,

    /// Validated defaults and overrides
    config: Arc<RegistryConfig>,

    /// Policy used by [`ServiceRegistry::execute_with_retry`]
    retry: Arc<RetryPolicy>,
}

impl ServiceRegistry {
    /// Create a registry from a configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the defaults, a service override or a retry
    /// marker is invalid. Nothing is validated later on.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let retry = RetryPolicy::from_config(&config.retry)?;

        Ok(Self {
            limiters: Arc::new(DashMap::new()),
            config: Arc::new(config),
            retry: Arc::new(retry),
        })
    }

    /// The limiter for `service`, created on first use
    #[must_use]
    pub fn limiter(&self, service: impl Into<ServiceName>) -> RequestLimiter {
        let service: ServiceName = service.into();
        if let Some(limiter) = self.limiters.get(&service) {
            return limiter.clone();
        }

        let config = self.config.resolve(&service);
        // The registry configuration was validated in `new`
        let limiter = RequestLimiter::build(service.clone(), &config);

        match self.limiters.entry(service) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                // Another caller created it first
                entry.get().clone()
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                log::debug!(
                    "{}: created limiter (concurrency {}, interval {}ms, burst {})",
                    entry.key(),
                    config.concurrency,
                    config.interval.as_millis(),
                    config.burst
                );
                entry.insert(limiter).clone()
            }
        }
    }

    /// Schedule `task` on the limiter for `service`.
    /// See [`RequestLimiter::enqueue`].
    pub fn enqueue<S, F, Fut, T>(
        &self,
        service: S,
        task: F,
    ) -> impl Future<Output = T> + Send + use<S, F, Fut, T>
    where
        S: Into<ServiceName>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.limiter(service).enqueue(task)
    }

    /// Run `op` on the limiter for `service`, retrying transient failures
    /// with the registry's [`RetryPolicy`].
    ///
    /// Every attempt is enqueued separately and waits its turn behind
    /// tasks enqueued in the meantime. No slot is held while backing off.
    ///
    /// # Errors
    ///
    /// Returns the fatal error, or the last transient error once the
    /// policy gives up
    pub async fn execute_with_retry<F, Fut, T, E>(
        &self,
        service: impl Into<ServiceName>,
        mut op: F,
    ) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Retryable + Send + 'static,
    {
        let limiter = self.limiter(service);
        self.retry
            .execute(|| {
                let attempt = op();
                limiter.enqueue(move || attempt)
            })
            .await
    }

    /// The policy used by [`ServiceRegistry::execute_with_retry`]
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Status of the limiter for `service`, if it was created
    #[must_use]
    pub fn status(&self, service: impl Into<ServiceName>) -> Option<LimiterStatus> {
        let service: ServiceName = service.into();
        self.limiters
            .get(&service)
            .map(|limiter| limiter.status())
    }

    /// Status of every limiter created so far, by service name
    #[must_use]
    pub fn status_all(&self) -> StatusMap {
        self.limiters
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().status()))
            .collect()
    }

    /// Statistics of every limiter created so far, by service name
    #[must_use]
    pub fn all_stats(&self) -> BTreeMap<String, LimiterStats> {
        self.limiters
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().stats()))
            .collect()
    }

    /// Number of limiters created so far
    #[must_use]
    pub fn active_service_count(&self) -> usize {
        self.limiters.len()
    }

    /// Services with explicit overrides and their complete configuration,
    /// sorted by name
    #[must_use]
    pub fn configured_services(&self) -> Vec<(ServiceName, RateLimitConfig)> {
        let mut services: Vec<_> = self
            .config
            .services
            .keys()
            .map(|service| (service.clone(), self.config.resolve(service)))
            .collect();
        services.sort_by(|(a, _), (b, _)| a.cmp(b));
        services
    }

    /// Configuration applied to services without overrides
    #[must_use]
    pub fn defaults(&self) -> RateLimitConfig {
        self.config.defaults
    }

    /// Remove the limiter for `service`.
    ///
    /// The next call for that service creates a fresh limiter. Work already
    /// queued on the old one still completes.
    ///
    /// Returns true if a limiter was removed.
    #[must_use]
    pub fn remove(&self, service: impl Into<ServiceName>) -> bool {
        let service: ServiceName = service.into();
        self.limiters.remove(&service).is_some()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self {
            limiters: Arc::new(DashMap::new()),
            config: Arc::new(RegistryConfig::default()),
            retry: Arc::new(RetryPolicy::default()),
        }
    }
}
