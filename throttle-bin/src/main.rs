//! `throttle` inspects and exercises the per-service rate limits used for
//! calls to AI providers.
//!
//! It reads the same configuration as the library: a TOML file with
//! defaults, per-service overrides and retry settings.
//!
//! ```toml
//! [defaults]
//! concurrency = 2
//! interval = "1s"
//!
//! [services.claude]
//! concurrency = 1
//! interval = "5s"
//!
//! [retry]
//! max_retries = 3
//! base_delay = "2s"
//! ```
//!
//! Run `throttle services` to list the effective limits, or
//! `throttle simulate claude --tasks 5 --fail-every 2 --retry` to watch the
//! limiter space out dispatches and retry failures.
#![deny(missing_docs)]

use anyhow::Result;
use clap::Parser;
use log::error;
use throttle_lib::ratelimit::{RegistryConfig, ServiceRegistry};

mod commands;
mod formatters;
mod options;
mod verbosity;

use crate::formatters::{get_report_formatter, log::init_logging};
use crate::options::{Command, ThrottleOptions};

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator.
    #[allow(unused)]
    UnexpectedFailure = 1,
    TaskFailure = 2,
    ConfigFile = 3,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Parse the command line and load the configuration it points to
fn load_config() -> (ThrottleOptions, Result<RegistryConfig>) {
    let opts = ThrottleOptions::parse();
    init_logging(&opts.verbose);

    let config = opts.registry_config();
    (opts, config)
}

/// Set up runtime and call the command
fn run_main() -> Result<i32> {
    let (opts, config) = load_config();
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Error while loading config: {e:#}");
            return Ok(ExitCode::ConfigFile as i32);
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(&opts, config))
}

/// Run the selected command
async fn run(opts: &ThrottleOptions, config: RegistryConfig) -> Result<i32> {
    let registry = ServiceRegistry::new(config.clone())?;
    let formatter = get_report_formatter(opts.format);

    match &opts.command {
        Command::Services => {
            let listing = commands::services(&registry, &config);
            println!("{}", formatter.format_services(&listing)?);
            Ok(ExitCode::Success as i32)
        }
        Command::Simulate(args) => {
            let report = commands::simulate(&registry, args).await;
            println!("{}", formatter.format_simulation(&report)?);

            if report.failed() > 0 {
                Ok(ExitCode::TaskFailure as i32)
            } else {
                Ok(ExitCode::Success as i32)
            }
        }
    }
}
