use anyhow::Result;
use humantime::format_duration;
use std::fmt::{self, Display};

use super::{ReportFormatter, millis};
use crate::commands::{ServiceListing, SimulationReport, TaskOutcome};
use crate::formatters::color::{DIM, GREEN, NORMAL, PINK, YELLOW, color};
use throttle_lib::ratelimit::RateLimitConfig;

pub(crate) struct Text;

struct Limits<'a>(&'a RateLimitConfig);

impl Display for Limits<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>3} concurrent │ every {:>6} │ burst {}",
            self.0.concurrency,
            format_duration(self.0.interval).to_string(),
            self.0.burst
        )
    }
}

struct TextServices<'a>(&'a ServiceListing);

impl Display for TextServices<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listing = self.0;
        let width = listing
            .services
            .iter()
            .map(|(name, _)| name.as_str().len())
            .max()
            .unwrap_or(0)
            .max("defaults".len())
            + 2;

        for (name, config) in &listing.services {
            color!(f, NORMAL, "{:<width$}{}", name.as_str(), Limits(config))?;
            writeln!(f)?;
        }
        color!(f, DIM, "{:<width$}{}", "defaults", Limits(&listing.defaults))?;
        writeln!(f)?;
        writeln!(f)?;

        let retry = &listing.retry;
        writeln!(
            f,
            "Retry: up to {} retries, {} doubling up to {}, jitter up to {}",
            retry.max_retries,
            format_duration(retry.base_delay),
            format_duration(retry.max_delay),
            format_duration(retry.jitter)
        )?;
        let statuses: Vec<_> = retry.retryable_statuses.iter().map(u16::to_string).collect();
        writeln!(f, "Retryable statuses: {}", statuses.join(", "))?;
        write!(f, "Transient markers: {}", retry.transient_markers.join(", "))
    }
}

struct TextSimulation<'a>(&'a SimulationReport);

impl Display for TextSimulation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(
            f,
            "Simulating {} tasks on {} ({} concurrent, every {}, burst {}, retries {})",
            report.tasks.len(),
            report.service,
            report.status.max_concurrent,
            format_duration(report.status.min_delay),
            report.burst,
            if report.retry { "on" } else { "off" }
        )?;

        let index_width = report.tasks.len().to_string().len();
        for task in &report.tasks {
            let dispatches: Vec<_> = task
                .dispatches
                .iter()
                .map(|d| format!("+{}ms", millis(*d)))
                .collect();
            write!(
                f,
                "task {:>index_width$}  {:<24}",
                task.index,
                dispatches.join(", ")
            )?;

            match &task.outcome {
                TaskOutcome::Succeeded if task.attempts() > 1 => {
                    color!(f, YELLOW, "ok after {} attempts", task.attempts())?;
                }
                TaskOutcome::Succeeded => color!(f, GREEN, "{}", "ok")?,
                TaskOutcome::Failed(err) => color!(f, PINK, "failed: {}", err)?,
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "{} succeeded, {} failed in {}ms",
            report.tasks.len() - report.failed(),
            report.failed(),
            millis(report.elapsed)
        )?;
        writeln!(
            f,
            "Status: {} active, {} queued",
            report.status.active_requests, report.status.queued_requests
        )?;
        write!(f, "Stats: {}", report.stats.summary())
    }
}

impl ReportFormatter for Text {
    fn format_services(&self, listing: &ServiceListing) -> Result<String> {
        Ok(TextServices(listing).to_string())
    }

    fn format_simulation(&self, report: &SimulationReport) -> Result<String> {
        Ok(TextSimulation(report).to_string())
    }
}
