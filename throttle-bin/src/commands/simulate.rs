use futures::future::join_all;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use throttle_lib::ratelimit::{LimiterStats, LimiterStatus, ServiceName, ServiceRegistry};
use throttle_lib::retry::ProviderError;
use tokio::time::Instant;

use crate::options::SimulateArgs;

/// How a synthetic task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TaskOutcome {
    Succeeded,
    Failed(ProviderError),
}

/// What happened to one synthetic task
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TaskReport {
    /// Position in the submission order, starting at 1
    pub(crate) index: usize,
    /// Start of every attempt, relative to the start of the run
    pub(crate) dispatches: Vec<Duration>,
    pub(crate) outcome: TaskOutcome,
}

impl TaskReport {
    pub(crate) fn attempts(&self) -> usize {
        self.dispatches.len()
    }

    pub(crate) const fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Succeeded)
    }
}

/// Result of a simulation run on one service
#[derive(Debug, Clone)]
pub(crate) struct SimulationReport {
    pub(crate) service: ServiceName,
    pub(crate) burst: usize,
    pub(crate) retry: bool,
    pub(crate) tasks: Vec<TaskReport>,
    /// Limiter state once every task settled
    pub(crate) status: LimiterStatus,
    pub(crate) stats: LimiterStats,
    pub(crate) elapsed: Duration,
}

impl SimulationReport {
    pub(crate) fn failed(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_success()).count()
    }
}

/// A task that sleeps for a while and may fail its first attempt
struct SyntheticTask {
    index: usize,
    origin: Instant,
    duration: Duration,
    /// Status code of the first attempt's failure
    fail_with: Option<u16>,
    dispatches: Arc<Mutex<Vec<Duration>>>,
}

impl SyntheticTask {
    fn attempt(&self) -> impl Future<Output = Result<(), ProviderError>> + Send + 'static + use<> {
        let index = self.index;
        let origin = self.origin;
        let duration = self.duration;
        let fail_with = self.fail_with;
        let dispatches = Arc::clone(&self.dispatches);

        async move {
            let attempt = {
                let mut dispatches = dispatches.lock().unwrap_or_else(PoisonError::into_inner);
                dispatches.push(origin.elapsed());
                dispatches.len()
            };
            log::info!("task {index}: attempt {attempt} started");
            tokio::time::sleep(duration).await;

            match fail_with {
                Some(status) if attempt == 1 => Err(ProviderError::status(
                    status,
                    format!("simulated failure of task {index}"),
                )),
                _ => Ok(()),
            }
        }
    }

    fn dispatches(&self) -> Vec<Duration> {
        self.dispatches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Enqueue `args.tasks` synthetic tasks at once on the service's limiter
/// and wait for all of them
pub(crate) async fn simulate(registry: &ServiceRegistry, args: &SimulateArgs) -> SimulationReport {
    let service = ServiceName::from(args.service.as_str());
    let limiter = registry.limiter(service.clone());
    let origin = Instant::now();

    let tasks: Vec<_> = (1..=args.tasks)
        .map(|index| SyntheticTask {
            index,
            origin,
            duration: args.duration,
            fail_with: args
                .fail_every
                .filter(|every| index % (*every as usize) == 0)
                .map(|_| args.status),
            dispatches: Arc::default(),
        })
        .collect();

    // Futures are polled in order the first time, so tasks enter the
    // queue in submission order
    let results = join_all(tasks.iter().map(|task| {
        let service = service.clone();
        let limiter = &limiter;
        async move {
            if args.retry {
                registry
                    .execute_with_retry(service, || task.attempt())
                    .await
            } else {
                let attempt = task.attempt();
                limiter.enqueue(move || attempt).await
            }
        }
    }))
    .await;

    let tasks = tasks
        .iter()
        .zip(results)
        .map(|(task, result)| TaskReport {
            index: task.index,
            dispatches: task.dispatches(),
            outcome: match result {
                Ok(()) => TaskOutcome::Succeeded,
                Err(err) => TaskOutcome::Failed(err),
            },
        })
        .collect();

    SimulationReport {
        service,
        burst: limiter.burst(),
        retry: args.retry,
        tasks,
        status: limiter.status(),
        stats: limiter.stats(),
        elapsed: origin.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use throttle_lib::ratelimit::RegistryConfig;
    use throttle_lib::retry::RetryConfig;

    fn args(service: &str) -> SimulateArgs {
        SimulateArgs {
            service: service.to_string(),
            tasks: 3,
            duration: Duration::from_millis(50),
            fail_every: None,
            status: 429,
            retry: false,
            concurrency: None,
            interval: None,
            burst: None,
        }
    }

    fn registry() -> ServiceRegistry {
        let config = RegistryConfig {
            retry: RetryConfig {
                base_delay: Duration::from_millis(500),
                jitter: Duration::ZERO,
                ..RetryConfig::default()
            },
            ..RegistryConfig::ai_providers()
        };
        ServiceRegistry::new(config).unwrap()
    }

    /// Assert that first attempts started at the given offsets, allowing
    /// for timer granularity
    fn assert_first_dispatches(report: &SimulationReport, expected_ms: &[u64]) {
        let actual: Vec<_> = report.tasks.iter().map(|task| task.dispatches[0]).collect();
        assert_eq!(actual.len(), expected_ms.len());
        for (actual, expected) in actual.iter().zip(expected_ms) {
            let expected = Duration::from_millis(*expected);
            assert!(
                *actual >= expected && *actual - expected < Duration::from_millis(5),
                "expected {expected_ms:?}ms, got {actual:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_are_spaced_per_service() {
        let report = simulate(&registry(), &args("claude")).await;

        assert_eq!(report.failed(), 0);
        assert_first_dispatches(&report, &[0, 5000, 10000]);
        assert_eq!(report.status.active_requests, 0);
        assert_eq!(report.status.queued_requests, 0);
        assert_eq!(report.stats.completed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_without_retry() {
        let args = SimulateArgs {
            fail_every: Some(2),
            status: 503,
            ..args("mistral")
        };
        let report = simulate(&registry(), &args).await;

        assert_eq!(report.failed(), 1);
        let failed = &report.tasks[1];
        assert_eq!(failed.attempts(), 1);
        assert_eq!(
            failed.outcome,
            TaskOutcome::Failed(ProviderError::status(503, "simulated failure of task 2"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_recover_with_retry() {
        let args = SimulateArgs {
            fail_every: Some(3),
            retry: true,
            ..args("mistral")
        };
        let report = simulate(&registry(), &args).await;

        assert_eq!(report.failed(), 0);
        assert_eq!(report.tasks[2].attempts(), 2);
        assert_eq!(report.stats.dispatched, 4);
    }
}
