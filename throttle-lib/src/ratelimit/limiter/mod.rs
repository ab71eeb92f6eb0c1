#![allow(clippy::module_inception)]

mod key;
mod limiter;
mod stats;
mod window;

pub use key::ServiceName;
pub use limiter::RequestLimiter;
pub use stats::{LimiterStats, LimiterStatus, StatusMap};
