use std::path::PathBuf;
use thiserror::Error;

use crate::ratelimit::ServiceName;

/// Errors raised while building limiters, retry policies, or registries.
///
/// These are configuration problems: they are reported once, at
/// construction time, and never while tasks are in flight.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// A limiter must allow at least one task in flight
    #[error("Invalid concurrency for service {service}: {value} (must be at least 1)")]
    InvalidConcurrency {
        /// The service with the invalid configuration
        service: ServiceName,
        /// The rejected value
        value: usize,
    },

    /// A limiter must allow at least one dispatch per spacing window
    #[error("Invalid burst for service {service}: {value} (must be at least 1)")]
    InvalidBurst {
        /// The service with the invalid configuration
        service: ServiceName,
        /// The rejected value
        value: usize,
    },

    /// A transient-failure marker is not a valid regular expression
    #[error("Invalid transient failure marker `{pattern}`: {source}")]
    InvalidMarker {
        /// The offending pattern
        pattern: String,
        /// Underlying regex error
        #[source]
        source: Box<regex::Error>,
    },

    /// The configuration file could not be read
    #[error("Failed to read configuration from `{}`: {source}", path.display())]
    Read {
        /// The path that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has unknown keys
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The `throttle_lib` configuration `Result` type
pub type Result<T> = std::result::Result<T, ConfigError>;
