//! Per-service admission control.
//!
//! This module bounds the number of concurrent calls to each external
//! service and spaces out dispatches, while serving queued work strictly in
//! arrival order.
//!
//! # Architecture
//!
//! - [`ServiceName`]: Normalized name of an external service
//! - [`RequestLimiter`]: FIFO queue with bounded concurrency and minimum
//!   spacing for one service
//! - [`ServiceRegistry`]: Lazily creates and hands out one limiter per service
//! - [`RegistryConfig`]: Defaults, per-service overrides and retry settings
//! - [`LimiterStatus`] / [`LimiterStats`]: Snapshots and counters per limiter

mod config;
mod limiter;
mod registry;

pub use config::{RateLimitConfig, RegistryConfig, ServiceConfig, ServiceConfigs};
pub use limiter::{LimiterStats, LimiterStatus, RequestLimiter, ServiceName, StatusMap};
pub use registry::ServiceRegistry;
