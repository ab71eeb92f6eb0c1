use anyhow::{Context, Result};
use serde_json::json;

use super::{ReportFormatter, millis};
use crate::commands::{ServiceListing, SimulationReport, TaskOutcome};
use throttle_lib::ratelimit::RateLimitConfig;
use throttle_lib::retry::Retryable;

pub(crate) struct Json;

fn limits(config: &RateLimitConfig) -> serde_json::Value {
    json!({
        "concurrency": config.concurrency,
        "interval_ms": millis(config.interval),
        "burst": config.burst,
    })
}

impl ReportFormatter for Json {
    fn format_services(&self, listing: &ServiceListing) -> Result<String> {
        let services: serde_json::Map<String, serde_json::Value> = listing
            .services
            .iter()
            .map(|(name, config)| (name.to_string(), limits(config)))
            .collect();

        let retry = &listing.retry;
        let output = json!({
            "defaults": limits(&listing.defaults),
            "services": services,
            "retry": {
                "max_retries": retry.max_retries,
                "base_delay_ms": millis(retry.base_delay),
                "max_delay_ms": millis(retry.max_delay),
                "jitter_ms": millis(retry.jitter),
                "retryable_statuses": retry.retryable_statuses,
                "transient_markers": retry.transient_markers,
            },
        });

        serde_json::to_string_pretty(&output).context("Cannot format services as JSON")
    }

    fn format_simulation(&self, report: &SimulationReport) -> Result<String> {
        let tasks: Vec<_> = report
            .tasks
            .iter()
            .map(|task| {
                let dispatches: Vec<_> = task.dispatches.iter().map(|d| millis(*d)).collect();
                let (error, status) = match &task.outcome {
                    TaskOutcome::Succeeded => (None, None),
                    TaskOutcome::Failed(err) => (Some(err.to_string()), err.status_code()),
                };
                json!({
                    "index": task.index,
                    "dispatched_ms": dispatches,
                    "attempts": task.attempts(),
                    "success": task.is_success(),
                    "error": error,
                    "status": status,
                })
            })
            .collect();

        let output = json!({
            "service": report.service.as_str(),
            "burst": report.burst,
            "retry": report.retry,
            "succeeded": report.tasks.len() - report.failed(),
            "failed": report.failed(),
            "elapsed_ms": millis(report.elapsed),
            "tasks": tasks,
            "status": report.status,
            "stats": report.stats,
        });

        serde_json::to_string_pretty(&output).context("Cannot format simulation as JSON")
    }
}
