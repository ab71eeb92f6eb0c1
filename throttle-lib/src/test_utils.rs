use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// Shared log of task start instants, keyed by task index.
///
/// Clones share the same log, so one can be moved into every task.
#[derive(Debug, Clone)]
pub(crate) struct DispatchLog {
    origin: Instant,
    starts: Arc<Mutex<Vec<(usize, Duration)>>>,
}

impl DispatchLog {
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
            starts: Arc::default(),
        }
    }

    /// Record that task `index` started now
    pub(crate) fn record(&self, index: usize) {
        let offset = self.origin.elapsed();
        self.starts.lock().unwrap().push((index, offset));
    }

    /// Task indices in the order they started
    pub(crate) fn order(&self) -> Vec<usize> {
        self.starts.lock().unwrap().iter().map(|(i, _)| *i).collect()
    }

    /// Start offset of task `index`, relative to the log's creation
    pub(crate) fn offset(&self, index: usize) -> Duration {
        self.starts
            .lock()
            .unwrap()
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, offset)| *offset)
            .unwrap_or_else(|| panic!("task {index} never started"))
    }

    /// Start offsets in start order
    pub(crate) fn offsets(&self) -> Vec<Duration> {
        self.starts.lock().unwrap().iter().map(|(_, o)| *o).collect()
    }

    /// Assert that tasks started at the given offsets (in milliseconds),
    /// never earlier and at most a few milliseconds later
    pub(crate) fn assert_offsets(&self, expected_ms: &[u64]) {
        let offsets = self.offsets();
        assert_eq!(offsets.len(), expected_ms.len(), "started: {offsets:?}");
        for (actual, expected) in offsets.iter().zip(expected_ms) {
            assert!(
                approx(*actual, ms(*expected)),
                "expected starts at {expected_ms:?}ms, got {offsets:?}"
            );
        }
    }
}

/// `actual` is `expected` or slightly later, allowing for timer granularity
pub(crate) fn approx(actual: Duration, expected: Duration) -> bool {
    actual >= expected && actual - expected < ms(5)
}

/// Shorthand for a duration in milliseconds
pub(crate) const fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
