//! Retrying transient provider failures.
//!
//! A [`RetryPolicy`] calls an operation again after failures that look
//! temporary: a status code such as `429` or `503`, or a message saying the
//! provider is overloaded or rate limiting. Waits grow exponentially up to a
//! cap, and each one gets a random jitter so that many callers failing at
//! the same moment do not retry in lockstep.
//!
//! Errors are classified through the [`Retryable`] trait. [`ProviderError`]
//! is a ready-made implementation carrying a status code and a message.

mod config;
mod markers;
mod policy;
mod retryable;

pub use config::{
    DEFAULT_BASE_DELAY, DEFAULT_JITTER, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRYABLE_STATUSES, RetryConfig,
};
pub use markers::{DEFAULT_TRANSIENT_MARKERS, MarkerSet};
pub use policy::{RetryOutcome, RetryPolicy, RetryRecord, RetryReport};
pub use retryable::{ProviderError, Retryable};
