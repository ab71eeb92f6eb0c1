mod json;
mod text;

pub(crate) use json::Json;
pub(crate) use text::Text;

use anyhow::Result;
use std::time::Duration;

use crate::commands::{ServiceListing, SimulationReport};

/// Trait for rendering command results in different output formats
pub(crate) trait ReportFormatter {
    /// Format the list of configured services
    fn format_services(&self, listing: &ServiceListing) -> Result<String>;

    /// Format the outcome of a simulation run
    fn format_simulation(&self, report: &SimulationReport) -> Result<String>;
}

#[allow(clippy::cast_possible_truncation)]
const fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
