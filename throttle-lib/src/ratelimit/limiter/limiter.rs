use futures::FutureExt;
use futures::future::BoxFuture;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::key::ServiceName;
use super::stats::{LimiterStats, LimiterStatus};
use super::window::Window;
use crate::Result;
use crate::ratelimit::RateLimitConfig;

type PanicPayload = Box<dyn Any + Send + 'static>;

/// Callback run by a job once its task body has finished.
/// The flag tells whether the body panicked.
type Release = Box<dyn FnOnce(bool) + Send + 'static>;

/// A queued task with its result channel, with the output type erased
trait Job: Send {
    /// The caller dropped the pending future before dispatch
    fn is_abandoned(&self) -> bool;

    fn run(self: Box<Self>, release: Release) -> BoxFuture<'static, ()>;
}

struct QueuedTask<F, T> {
    task: F,
    result: oneshot::Sender<std::result::Result<T, PanicPayload>>,
}

impl<F, Fut, T> Job for QueuedTask<F, T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    fn is_abandoned(&self) -> bool {
        self.result.is_closed()
    }

    fn run(self: Box<Self>, release: Release) -> BoxFuture<'static, ()> {
        let QueuedTask { task, result } = *self;
        async move {
            // Calling `task` inside the guarded future also catches panics
            // raised before it returns its future.
            let outcome = AssertUnwindSafe(async move { task().await })
                .catch_unwind()
                .await;
            release(outcome.is_err());
            // Nobody may be listening anymore; the task still ran to completion.
            let _ = result.send(outcome);
        }
        .boxed()
    }
}

struct QueueEntry {
    job: Box<dyn Job>,
    enqueued_at: Instant,
}

struct LimiterState {
    /// Tasks dispatched and not yet settled
    active: usize,
    queue: VecDeque<QueueEntry>,
    /// Instants of the last `burst` dispatches
    dispatches: Window<Instant>,
    /// A deferred drain is already scheduled
    wake_pending: bool,
    stats: LimiterStats,
}

struct Inner {
    name: ServiceName,
    max_concurrent: usize,
    min_delay: Duration,
    burst: usize,
    state: Mutex<LimiterState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        // Task bodies never run under the lock, so a poisoned state is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dispatch as many queued tasks as the concurrency and spacing
    /// constraints allow. Must be called with the state lock held; this is
    /// the only place where tasks leave the queue.
    fn drain(self: &Arc<Self>, state: &mut LimiterState) {
        while state.active < self.max_concurrent {
            while state
                .queue
                .front()
                .is_some_and(|entry| entry.job.is_abandoned())
            {
                state.queue.pop_front();
                state.stats.record_abandoned();
                log::trace!("{}: dropped abandoned task from queue", self.name);
            }

            if state.queue.is_empty() {
                return;
            }

            let now = Instant::now();
            if let Some(wait) = self.remaining_spacing(state, now) {
                self.schedule_wake(state, wait);
                return;
            }

            let Some(entry) = state.queue.pop_front() else {
                return;
            };
            state.active += 1;
            state.dispatches.push(now);
            state
                .stats
                .record_dispatch(now.saturating_duration_since(entry.enqueued_at));
            log::debug!(
                "{}: dispatching task ({} active, {} queued)",
                self.name,
                state.active,
                state.queue.len()
            );
            self.spawn(entry.job);
        }
    }

    /// Time left before the spacing constraint allows another dispatch
    fn remaining_spacing(&self, state: &LimiterState, now: Instant) -> Option<Duration> {
        if !state.dispatches.is_full() {
            return None;
        }
        let oldest = *state.dispatches.oldest()?;
        let elapsed = now.saturating_duration_since(oldest);
        (elapsed < self.min_delay).then(|| self.min_delay - elapsed)
    }

    /// Re-run the drain step after `wait`, unless a re-check is already scheduled
    fn schedule_wake(self: &Arc<Self>, state: &mut LimiterState, wait: Duration) {
        if state.wake_pending {
            return;
        }
        state.wake_pending = true;
        log::debug!(
            "{}: deferring dispatch by {}ms to respect spacing",
            self.name,
            wait.as_millis()
        );

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let mut state = inner.lock();
            state.wake_pending = false;
            inner.drain(&mut state);
        });
    }

    fn spawn(self: &Arc<Self>, job: Box<dyn Job>) {
        let inner = Arc::clone(self);
        let release: Release = Box::new(move |panicked| {
            let mut state = inner.lock();
            state.active -= 1;
            state.stats.record_completion(panicked);
            log::trace!(
                "{}: task settled ({} active, {} queued)",
                inner.name,
                state.active,
                state.queue.len()
            );
            inner.drain(&mut state);
        });
        tokio::spawn(job.run(release));
    }
}

/// A bounded-concurrency FIFO queue for calls to one external service.
///
/// Each limiter maintains:
/// - A FIFO queue of pending tasks
/// - A count of tasks in flight, never above `max_concurrent`
/// - The instants of recent dispatches, so that dispatches are spaced at
///   least `min_delay` apart
///
/// The limiter never inspects, retries or wraps a task's result: the
/// future returned by [`RequestLimiter::enqueue`] settles with exactly what
/// the task produced. Retrying is the job of [`crate::retry::RetryPolicy`].
///
/// Cloning a limiter is cheap and yields a handle to the same queue.
#[derive(Clone)]
pub struct RequestLimiter {
    inner: Arc<Inner>,
}

impl RequestLimiter {
    /// Create a limiter allowing `max_concurrent` tasks in flight, with
    /// consecutive dispatches at least `min_delay` apart
    ///
    /// Spacing is strict: even with free slots, the second task waits
    /// `min_delay` after the first. Use [`RequestLimiter::from_config`] with
    /// [`RateLimitConfig::with_burst`] to let several dispatches share one
    /// `min_delay` window.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_concurrent` is zero
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use throttle_lib::ratelimit::RequestLimiter;
    ///
    /// let limiter = RequestLimiter::new("gemini", 2, Duration::from_secs(3)).unwrap();
    /// assert_eq!(limiter.status().max_concurrent, 2);
    ///
    /// assert!(RequestLimiter::new("gemini", 0, Duration::ZERO).is_err());
    /// ```
    pub fn new(
        name: impl Into<ServiceName>,
        max_concurrent: usize,
        min_delay: Duration,
    ) -> Result<Self> {
        Self::from_config(name, &RateLimitConfig::new(max_concurrent, min_delay))
    }

    /// Create a limiter from a complete [`RateLimitConfig`]
    ///
    /// # Errors
    ///
    /// Returns an error if the concurrency or burst is zero
    pub fn from_config(name: impl Into<ServiceName>, config: &RateLimitConfig) -> Result<Self> {
        let name = name.into();
        config.validate(&name)?;
        Ok(Self::build(name, config))
    }

    /// Create a limiter from a configuration that was already validated
    pub(crate) fn build(name: ServiceName, config: &RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                max_concurrent: config.concurrency,
                min_delay: config.interval,
                burst: config.burst,
                state: Mutex::new(LimiterState {
                    active: 0,
                    queue: VecDeque::new(),
                    dispatches: Window::new(config.burst),
                    wake_pending: false,
                    stats: LimiterStats::default(),
                }),
            }),
        }
    }

    /// Schedule `task` and return a future that settles with its output.
    ///
    /// The task is queued immediately, in call order, even if the returned
    /// future is not polled yet. It runs on the tokio runtime once a slot
    /// is free and the spacing constraint allows it.
    ///
    /// Dropping the returned future before dispatch removes the task from
    /// the queue without running it. Once dispatched, the task runs to
    /// completion and keeps its slot until it settles.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime. If the task panics, the
    /// panic is resumed when the returned future is polled.
    pub fn enqueue<F, Fut, T>(&self, task: F) -> impl Future<Output = T> + Send + use<F, Fut, T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.inner.lock();
            state.queue.push_back(QueueEntry {
                job: Box::new(QueuedTask { task, result: tx }),
                enqueued_at: Instant::now(),
            });
            state.stats.record_enqueue();
            self.inner.drain(&mut state);
        }

        let name = self.inner.name.clone();
        async move {
            match rx.await {
                Ok(Ok(output)) => output,
                Ok(Err(payload)) => panic::resume_unwind(payload),
                // Jobs always send before being dropped, unless the runtime
                // shuts down while they are in flight
                Err(_) => panic!("{name}: task was dropped before it settled"),
            }
        }
    }

    /// Snapshot of the current queue and concurrency state.
    ///
    /// Queued tasks whose callers already dropped their futures are not
    /// counted, even before they reach the head of the queue.
    #[must_use]
    pub fn status(&self) -> LimiterStatus {
        let state = self.inner.lock();
        LimiterStatus {
            active_requests: state.active,
            queued_requests: state
                .queue
                .iter()
                .filter(|entry| !entry.job.is_abandoned())
                .count(),
            max_concurrent: self.inner.max_concurrent,
            min_delay: self.inner.min_delay,
        }
    }

    /// Get limiter statistics
    #[must_use]
    pub fn stats(&self) -> LimiterStats {
        self.inner.lock().stats.clone()
    }

    /// Instant of the most recent dispatch, if any
    #[must_use]
    pub fn last_dispatch(&self) -> Option<Instant> {
        self.inner.lock().dispatches.newest().copied()
    }

    /// The service this limiter guards
    #[must_use]
    pub fn name(&self) -> &ServiceName {
        &self.inner.name
    }

    /// Maximum number of tasks in flight
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Minimum spacing between dispatches
    #[must_use]
    pub fn min_delay(&self) -> Duration {
        self.inner.min_delay
    }

    /// Dispatches allowed back-to-back before spacing applies
    #[must_use]
    pub fn burst(&self) -> usize {
        self.inner.burst
    }
}

impl fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLimiter")
            .field("name", &self.inner.name)
            .field("max_concurrent", &self.inner.max_concurrent)
            .field("min_delay", &self.inner.min_delay)
            .field("burst", &self.inner.burst)
            .field("status", &self.status())
            .finish()
    }
}
