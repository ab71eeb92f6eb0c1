//! `throttle` keeps calls to rate-limited external services, such as AI
//! providers, within their capacity.
//!
//! A [`ratelimit::RequestLimiter`] runs tasks in arrival order with a bound
//! on how many run at once and a minimum spacing between their starts. A
//! [`retry::RetryPolicy`] retries transient failures with exponential
//! backoff and jitter. A [`ratelimit::ServiceRegistry`] hands out one
//! limiter per named service.
//!
//! ```
//! use throttle_lib::ratelimit::{RegistryConfig, ServiceRegistry};
//! use throttle_lib::retry::ProviderError;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ServiceRegistry::new(RegistryConfig::ai_providers())?;
//!
//!     let summary = registry
//!         .execute_with_retry("gemini", || async {
//!             // Call the provider here
//!             Ok::<_, ProviderError>("a short summary")
//!         })
//!         .await?;
//!
//!     assert_eq!(summary, "a short summary");
//!     Ok(())
//! }
//! ```
#![deny(missing_docs)]

mod error;

pub mod ratelimit;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{ConfigError, Result};
