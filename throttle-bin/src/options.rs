use crate::verbosity::Verbosity;
use anyhow::{Context, Result, bail};
use clap::builder::PossibleValuesParser;
use clap::{Args, Parser, Subcommand, builder::TypedValueParser};
use const_format::formatcp;
use std::path::{Path, PathBuf};
use std::time::Duration;
use strum::{Display, EnumString, VariantNames};
use throttle_lib::ratelimit::{RegistryConfig, ServiceConfig, ServiceName};

pub(crate) const THROTTLE_CONFIG_FILE: &str = "throttle.toml";

// The default is shown in the help text only, so that a missing default
// file can fall back to the built-in profile instead of failing
const HELP_MSG_CONFIG_FILE: &str = formatcp!(
    "Configuration file to use\n\n[default: {}, or the built-in AI provider profile if it does not exist]",
    THROTTLE_CONFIG_FILE,
);

/// The format of reports written to stdout
#[derive(Debug, Default, Clone, Copy, Display, EnumString, VariantNames, PartialEq, Eq)]
#[non_exhaustive]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub(crate) enum ReportFormat {
    /// One line per service or task
    #[default]
    Text,
    /// A single JSON document
    Json,
}

/// Admission control and retry for calls to rate-limited services
#[derive(Parser, Debug)]
#[command(version, about)]
pub(crate) struct ThrottleOptions {
    /// Configuration file to use
    #[arg(short, long = "config", global = true)]
    #[arg(help = HELP_MSG_CONFIG_FILE)]
    pub(crate) config_file: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) verbose: Verbosity,

    /// Output format of the report
    #[arg(
        short,
        long,
        global = true,
        ignore_case = true,
        default_value = "text",
        value_parser = PossibleValuesParser::new(ReportFormat::VARIANTS)
            .map(|s| s.parse::<ReportFormat>().unwrap_or_default())
    )]
    pub(crate) format: ReportFormat,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// List configured services with their limits and the retry settings
    Services,

    /// Run synthetic tasks through a service's limiter and report when each
    /// one was dispatched
    Simulate(SimulateArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub(crate) struct SimulateArgs {
    /// Service whose limiter runs the tasks
    pub(crate) service: String,

    /// Number of tasks to enqueue at once
    #[arg(short = 'n', long, default_value_t = 4)]
    pub(crate) tasks: usize,

    /// How long each task runs, e.g. `200ms` or `2s`
    #[arg(short, long, default_value = "100ms", value_parser = humantime::parse_duration)]
    pub(crate) duration: Duration,

    /// Fail the first attempt of every Nth task
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) fail_every: Option<u32>,

    /// Status code reported by failing attempts
    #[arg(long, default_value_t = 429)]
    pub(crate) status: u16,

    /// Retry failed attempts with the configured retry policy
    #[arg(long)]
    pub(crate) retry: bool,

    /// Override the service's concurrency for this run
    #[arg(long)]
    pub(crate) concurrency: Option<usize>,

    /// Override the service's dispatch interval for this run
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) interval: Option<Duration>,

    /// Override the service's burst for this run
    #[arg(long)]
    pub(crate) burst: Option<usize>,
}

impl SimulateArgs {
    /// Apply the command line overrides to the service's configuration
    pub(crate) fn merge_into(&self, config: &mut RegistryConfig) {
        let overrides = config
            .services
            .entry(ServiceName::from(self.service.as_str()))
            .or_default();

        // Only override what was passed on the command line
        overrides.concurrency = self.concurrency.or(overrides.concurrency);
        overrides.interval = self.interval.or(overrides.interval);
        overrides.burst = self.burst.or(overrides.burst);

        // A run without overrides leaves unknown services unconfigured
        if *overrides == ServiceConfig::default() {
            config
                .services
                .remove(&ServiceName::from(self.service.as_str()));
        }
    }
}

impl ThrottleOptions {
    /// Load the registry configuration.
    ///
    /// An explicit `--config` file must exist. Without one, `throttle.toml`
    /// in the current directory is used if present, and the built-in AI
    /// provider profile otherwise.
    pub(crate) fn registry_config(&self) -> Result<RegistryConfig> {
        let mut config = match &self.config_file {
            Some(path) => load_from_file(path)?,
            None => {
                let default_config = PathBuf::from(THROTTLE_CONFIG_FILE);
                if default_config.is_file() {
                    load_from_file(&default_config)?
                } else {
                    log::debug!("No {THROTTLE_CONFIG_FILE} found, using the AI provider profile");
                    RegistryConfig::ai_providers()
                }
            }
        };

        if let Command::Simulate(args) = &self.command {
            args.merge_into(&mut config);
        }
        config
            .validate()
            .context("Invalid command line override")?;
        Ok(config)
    }
}

fn load_from_file(path: &Path) -> Result<RegistryConfig> {
    if !path.is_file() {
        bail!("Configuration file `{}` does not exist", path.display());
    }
    RegistryConfig::load_from_file(path)
        .with_context(|| format!("Cannot load configuration file `{}`", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use throttle_lib::ratelimit::RateLimitConfig;

    fn parse(args: &[&str]) -> ThrottleOptions {
        ThrottleOptions::parse_from(std::iter::once("throttle").chain(args.iter().copied()))
    }

    #[test]
    fn verify_app() {
        use clap::CommandFactory;
        ThrottleOptions::command().debug_assert();
    }

    #[test]
    fn test_simulate_defaults() {
        let opts = parse(&["simulate", "gemini"]);
        assert_eq!(opts.format, ReportFormat::Text);

        let Command::Simulate(args) = opts.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.tasks, 4);
        assert_eq!(args.duration, Duration::from_millis(100));
        assert_eq!(args.status, 429);
        assert_eq!(args.fail_every, None);
        assert!(!args.retry);
    }

    #[test]
    fn test_format_is_global_and_case_insensitive() {
        let opts = parse(&["services", "--format", "JSON"]);
        assert_eq!(opts.format, ReportFormat::Json);

        let result =
            ThrottleOptions::try_parse_from(["throttle", "services", "--format", "yaml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_fail_every_must_be_positive() {
        let result = ThrottleOptions::try_parse_from([
            "throttle",
            "simulate",
            "claude",
            "--fail-every",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_are_folded_in() {
        let opts = parse(&["simulate", "Claude", "--interval", "10ms", "--burst", "2"]);
        let Command::Simulate(args) = &opts.command else {
            panic!("expected simulate");
        };

        let mut config = RegistryConfig::ai_providers();
        args.merge_into(&mut config);

        assert_eq!(
            config.resolve(&ServiceName::from("claude")),
            RateLimitConfig::new(1, Duration::from_millis(10)).with_burst(2)
        );
    }

    #[test]
    fn test_no_overrides_leave_config_untouched() {
        let opts = parse(&["simulate", "mistral"]);
        let Command::Simulate(args) = &opts.command else {
            panic!("expected simulate");
        };

        let mut config = RegistryConfig::ai_providers();
        args.merge_into(&mut config);
        assert_eq!(config, RegistryConfig::ai_providers());
    }

    #[test]
    fn test_zero_concurrency_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();

        let config = path.to_string_lossy().to_string();
        let opts = parse(&["--config", &config, "simulate", "gemini", "--concurrency", "0"]);
        assert!(opts.registry_config().is_err());
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let opts = parse(&["--config", "/nonexistent/throttle.toml", "services"]);
        let err = opts.registry_config().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
