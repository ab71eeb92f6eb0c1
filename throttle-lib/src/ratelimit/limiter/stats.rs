use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde::ser::SerializeStruct;

/// A [`BTreeMap`] mapping service names to their [`LimiterStatus`]
pub type StatusMap = BTreeMap<String, LimiterStatus>;

/// Point-in-time snapshot of a [`crate::ratelimit::RequestLimiter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterStatus {
    /// Tasks dispatched and not yet settled
    pub active_requests: usize,
    /// Tasks waiting in the queue
    pub queued_requests: usize,
    /// Maximum number of tasks in flight
    pub max_concurrent: usize,
    /// Minimum spacing between dispatches
    #[serde(with = "humantime_serde")]
    pub min_delay: Duration,
}

/// Record and report statistics for a [`crate::ratelimit::RequestLimiter`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimiterStats {
    /// Tasks handed to the limiter
    pub enqueued: u64,
    /// Tasks that left the queue and started running
    pub dispatched: u64,
    /// Tasks that ran to completion, whatever their result
    pub completed: u64,
    /// Tasks whose body panicked
    pub panicked: u64,
    /// Tasks dropped from the queue because the caller stopped waiting
    pub abandoned: u64,
    /// Sum of time spent queued by dispatched tasks
    pub total_wait: Duration,
    /// Longest time a dispatched task spent queued
    pub max_wait: Duration,
}

impl LimiterStats {
    pub(crate) const fn record_enqueue(&mut self) {
        self.enqueued += 1;
    }

    pub(crate) fn record_dispatch(&mut self, waited: Duration) {
        self.dispatched += 1;
        self.total_wait += waited;
        self.max_wait = self.max_wait.max(waited);
    }

    pub(crate) const fn record_completion(&mut self, panicked: bool) {
        self.completed += 1;
        if panicked {
            self.panicked += 1;
        }
    }

    pub(crate) const fn record_abandoned(&mut self) {
        self.abandoned += 1;
    }

    /// Average time dispatched tasks spent in the queue
    #[must_use]
    pub fn average_wait(&self) -> Option<Duration> {
        if self.dispatched == 0 {
            return None;
        }
        let nanos = self.total_wait.as_nanos() / u128::from(self.dispatched);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }

    /// Get human-readable summary of the stats
    #[must_use]
    pub fn summary(&self) -> String {
        let avg_wait = self
            .average_wait()
            .map_or_else(|| "N/A".to_string(), |d| format!("{}ms", d.as_millis()));

        format!(
            "{} dispatched, {} completed ({} panicked, {} abandoned), avg wait: {}",
            self.dispatched, self.completed, self.panicked, self.abandoned, avg_wait
        )
    }
}

impl Serialize for LimiterStats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let average_wait_ms = self.average_wait().map(|d| d.as_millis());

        let mut s = serializer.serialize_struct("LimiterStats", 7)?;
        s.serialize_field("enqueued", &self.enqueued)?;
        s.serialize_field("dispatched", &self.dispatched)?;
        s.serialize_field("completed", &self.completed)?;
        s.serialize_field("panicked", &self.panicked)?;
        s.serialize_field("abandoned", &self.abandoned)?;
        s.serialize_field("average_wait_ms", &average_wait_ms)?;
        s.serialize_field("max_wait_ms", &self.max_wait.as_millis())?;
        s.end()
    }
}
