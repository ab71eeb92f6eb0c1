use throttle_lib::ratelimit::{RateLimitConfig, RegistryConfig, ServiceName, ServiceRegistry};
use throttle_lib::retry::RetryConfig;

/// Effective limits of every configured service
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceListing {
    /// Limits of services without an entry
    pub(crate) defaults: RateLimitConfig,
    /// Configured services, sorted by name
    pub(crate) services: Vec<(ServiceName, RateLimitConfig)>,
    pub(crate) retry: RetryConfig,
}

/// List the services a registry knows about
pub(crate) fn services(registry: &ServiceRegistry, config: &RegistryConfig) -> ServiceListing {
    ServiceListing {
        defaults: registry.defaults(),
        services: registry.configured_services(),
        retry: config.retry.clone(),
    }
}
