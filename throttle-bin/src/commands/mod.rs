pub(crate) mod services;
pub(crate) mod simulate;

pub(crate) use services::{ServiceListing, services};
pub(crate) use simulate::{SimulationReport, TaskOutcome, TaskReport, simulate};
