use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use super::markers::DEFAULT_TRANSIENT_MARKERS;

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Default cap for the pre-jitter delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default upper bound of the random jitter added to each delay
pub const DEFAULT_JITTER: Duration = Duration::from_secs(1);

/// Status codes treated as transient by default
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 3] = [429, 500, 503];

macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            #[allow(clippy::missing_const_for_fn)]
            fn $name() -> $T {
                $e
            }
        )*
    };
}

// Generate the functions for serde defaults
default_function! {
    max_retries: u32 = DEFAULT_MAX_RETRIES;
    base_delay: Duration = DEFAULT_BASE_DELAY;
    max_delay: Duration = DEFAULT_MAX_DELAY;
    jitter: Duration = DEFAULT_JITTER;
    retryable_statuses: BTreeSet<u16> = DEFAULT_RETRYABLE_STATUSES.into();
    transient_markers: Vec<String> = DEFAULT_TRANSIENT_MARKERS.map(String::from).to_vec();
}

/// Serializable retry settings, turned into a
/// [`crate::retry::RetryPolicy`] with [`crate::retry::RetryPolicy::from_config`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt; `N` allows up to `N + 1` calls
    #[serde(default = "max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, doubled on every further retry
    #[serde(default = "base_delay", with = "humantime_serde")]
    pub base_delay: Duration,

    /// Cap for the delay before jitter is added
    #[serde(default = "max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    /// Upper bound of the uniform random jitter added to each delay
    #[serde(default = "jitter", with = "humantime_serde")]
    pub jitter: Duration,

    /// Status codes that mark an error as transient
    #[serde(default = "retryable_statuses")]
    pub retryable_statuses: BTreeSet<u16>,

    /// Case-insensitive patterns that mark an error message as transient
    #[serde(default = "transient_markers")]
    pub transient_markers: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: max_retries(),
            base_delay: base_delay(),
            max_delay: max_delay(),
            jitter: jitter(),
            retryable_statuses: retryable_statuses(),
            transient_markers: transient_markers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay, Duration::from_secs(2));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.jitter, Duration::from_secs(1));
        assert_eq!(config.retryable_statuses, BTreeSet::from([429, 500, 503]));
        assert_eq!(config.transient_markers, vec!["overload", "rate[ _-]?limit"]);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RetryConfig = toml::from_str(
            r#"
            max_retries = 5
            base_delay = "500ms"
            retryable_statuses = [429]
            "#,
        )
        .unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.retryable_statuses, BTreeSet::from([429]));
        assert_eq!(config.transient_markers.len(), 2);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        assert!(toml::from_str::<RetryConfig>("retries = 3").is_err());
    }
}
