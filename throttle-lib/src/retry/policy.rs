use rand::Rng;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use typed_builder::TypedBuilder;

use super::config::{
    DEFAULT_BASE_DELAY, DEFAULT_JITTER, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRYABLE_STATUSES, RetryConfig,
};
use super::markers::MarkerSet;
use super::retryable::Retryable;
use crate::Result;

fn default_retryable_statuses() -> HashSet<u16> {
    DEFAULT_RETRYABLE_STATUSES.into()
}

/// Retries a fallible asynchronous operation with exponential backoff and
/// jitter.
///
/// An error is transient if its status code is one of
/// `retryable_statuses`, or if its message matches one of the
/// `transient_markers`. Any other error is fatal and returned at once.
/// Transient errors are retried up to `max_retries` times; attempt `i`
/// (starting at 0) is followed by a wait of
/// `min(base_delay * 2^i, max_delay) + uniform(0..=jitter)`.
///
/// When retries run out, the error of the *last* attempt is returned.
/// Errors are never wrapped.
///
/// The policy holds no per-call state and can be shared freely.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use throttle_lib::retry::{ProviderError, RetryPolicy};
///
/// # #[tokio::main]
/// # async fn main() {
/// let policy = RetryPolicy::builder()
///     .max_retries(2u32)
///     .base_delay(Duration::from_millis(10))
///     .jitter(Duration::ZERO)
///     .retryable_statuses([429])
///     .build();
///
/// let result: Result<(), ProviderError> = policy
///     .execute(|| async { Err(ProviderError::status(404, "no such model")) })
///     .await;
/// assert_eq!(result.unwrap_err().to_string(), "no such model (status 404)");
/// # }
/// ```
#[derive(TypedBuilder, Debug, Clone, PartialEq)]
#[builder(field_defaults(setter(into)))]
pub struct RetryPolicy {
    /// Retries after the first attempt
    #[builder(default = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Delay before the first retry
    #[builder(default = DEFAULT_BASE_DELAY)]
    base_delay: Duration,

    /// Cap for the delay before jitter
    #[builder(default = DEFAULT_MAX_DELAY)]
    max_delay: Duration,

    /// Upper bound of the random jitter, independent of `base_delay`
    #[builder(default = DEFAULT_JITTER)]
    jitter: Duration,

    /// Status codes that mark an error as transient
    #[builder(default = default_retryable_statuses())]
    retryable_statuses: HashSet<u16>,

    /// Message patterns that mark an error as transient
    #[builder(default)]
    transient_markers: MarkerSet,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// How a retried operation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// An attempt succeeded
    Succeeded(T),
    /// An attempt failed with an error that is not transient
    Fatal(E),
    /// Every allowed attempt failed with a transient error; holds the last one
    Exhausted(E),
}

/// One retry that was scheduled after a transient failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryRecord {
    /// Index of the failed attempt, starting at 0
    pub attempt: u32,
    /// Wait before the next attempt, jitter included
    pub delay: Duration,
    /// Status code of the triggering error
    pub status: Option<u16>,
    /// Display form of the triggering error
    pub error: String,
}

/// Full account of a retried operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryReport<T, E> {
    /// Number of times the operation was called
    pub attempts: u32,
    /// Every retry that was scheduled, in order
    pub retries: Vec<RetryRecord>,
    /// How the operation ended
    pub outcome: RetryOutcome<T, E>,
}

impl<T, E> RetryReport<T, E> {
    /// Discard the bookkeeping and keep the operation's result
    pub fn into_result(self) -> std::result::Result<T, E> {
        match self.outcome {
            RetryOutcome::Succeeded(value) => Ok(value),
            RetryOutcome::Fatal(err) | RetryOutcome::Exhausted(err) => Err(err),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from serialized settings
    ///
    /// # Errors
    ///
    /// Returns an error if a transient failure marker is not a valid regex
    pub fn from_config(config: &RetryConfig) -> Result<Self> {
        Ok(Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            jitter: config.jitter,
            retryable_statuses: config.retryable_statuses.iter().copied().collect(),
            transient_markers: MarkerSet::new(&config.transient_markers)?,
        })
    }

    /// Retries after the first attempt
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Upper bound of the random jitter
    #[must_use]
    pub const fn jitter(&self) -> Duration {
        self.jitter
    }

    /// Whether `error` is transient and worth retrying
    pub fn is_retryable<E: Retryable + ?Sized>(&self, error: &E) -> bool {
        error
            .status_code()
            .is_some_and(|status| self.retryable_statuses.contains(&status))
            || self.transient_markers.is_match(&error.message())
    }

    /// Delay after failed attempt `attempt`, before jitter is added:
    /// `min(base_delay * 2^attempt, max_delay)`
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .map_or(self.max_delay, |factor| {
                self.base_delay.saturating_mul(factor)
            })
            .min(self.max_delay)
    }

    /// Backoff for `attempt` plus a random jitter
    fn delay(&self, attempt: u32) -> Duration {
        let ceiling = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = Duration::from_millis(rand::rng().random_range(0..=ceiling));
        self.backoff(attempt).saturating_add(jitter)
    }

    /// Run `op` until it succeeds, fails fatally, or runs out of retries
    ///
    /// `op` is called once per attempt and must produce a fresh future each
    /// time.
    ///
    /// # Errors
    ///
    /// Returns the fatal error, or the last transient error once
    /// `max_retries` retries are used up
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Retryable,
    {
        self.execute_with_report(op).await.into_result()
    }

    /// Like [`RetryPolicy::execute`], but also report every scheduled retry
    /// and how the operation ended
    pub async fn execute_with_report<F, Fut, T, E>(&self, mut op: F) -> RetryReport<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Retryable,
    {
        let mut retries = Vec::new();
        let mut attempt: u32 = 0;

        loop {
            let error = match op().await {
                Ok(value) => {
                    return RetryReport {
                        attempts: attempt + 1,
                        retries,
                        outcome: RetryOutcome::Succeeded(value),
                    };
                }
                Err(error) => error,
            };

            if !self.is_retryable(&error) {
                log::debug!("Attempt {attempt} failed with a fatal error: {error}");
                return RetryReport {
                    attempts: attempt + 1,
                    retries,
                    outcome: RetryOutcome::Fatal(error),
                };
            }

            if attempt >= self.max_retries {
                log::warn!(
                    "Giving up after {} attempts, last error: {error}",
                    attempt + 1
                );
                return RetryReport {
                    attempts: attempt + 1,
                    retries,
                    outcome: RetryOutcome::Exhausted(error),
                };
            }

            let delay = self.delay(attempt);
            log::warn!(
                "Attempt {attempt} failed with a transient error, retrying in {}ms: {error}",
                delay.as_millis()
            );
            retries.push(RetryRecord {
                attempt,
                delay,
                status: error.status_code(),
                error: error.to_string(),
            });

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
