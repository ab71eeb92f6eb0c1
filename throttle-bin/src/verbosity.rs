//! `-v` and `-q` flags controlling how much the library logs.
//!
//! Warnings are shown by default, which includes every scheduled retry.
//! - `-q` only shows errors, `-qq` silences logging
//! - `-v` adds info, `-vv` debug (dispatch decisions), `-vvv` trace

use log::LevelFilter;

#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Verbosity {
    /// Pass many times for more log output
    ///
    /// By default, only warnings and errors are shown. Passing `-v` once also
    /// prints info messages, `-vv` shows every dispatch decision, and `-vvv`
    /// enables trace logging.
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "quiet"
    )]
    verbose: u8,

    /// Pass once to only show errors, twice to disable logging
    #[arg(
        long,
        short = 'q',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "verbose"
    )]
    quiet: u8,
}

impl Verbosity {
    /// Get the log level filter
    pub(crate) fn log_level_filter(&self) -> LevelFilter {
        filter_for(self.verbosity())
    }

    const fn verbosity(&self) -> i16 {
        level_value(LevelFilter::Warn) - (self.quiet as i16) + (self.verbose as i16)
    }
}

const fn level_value(filter: LevelFilter) -> i16 {
    match filter {
        LevelFilter::Off => 0,
        LevelFilter::Error => 1,
        LevelFilter::Warn => 2,
        LevelFilter::Info => 3,
        LevelFilter::Debug => 4,
        LevelFilter::Trace => 5,
    }
}

const fn filter_for(verbosity: i16) -> LevelFilter {
    match verbosity {
        i16::MIN..=0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        verbose: Verbosity,
    }

    fn filter(args: &[&str]) -> LevelFilter {
        let args = std::iter::once("throttle").chain(args.iter().copied());
        Cli::parse_from(args).verbose.log_level_filter()
    }

    #[test]
    fn verify_app() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_shows_warnings() {
        assert_eq!(Verbosity::default().log_level_filter(), LevelFilter::Warn);
    }

    #[test]
    fn test_flags_shift_level() {
        assert_eq!(filter(&["-v"]), LevelFilter::Info);
        assert_eq!(filter(&["-vv"]), LevelFilter::Debug);
        assert_eq!(filter(&["-vvvvvv"]), LevelFilter::Trace);
        assert_eq!(filter(&["-q"]), LevelFilter::Error);
        assert_eq!(filter(&["-qqq"]), LevelFilter::Off);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["throttle", "-v", "-q"]).is_err());
    }
}
