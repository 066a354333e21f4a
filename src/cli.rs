//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgMatches, Args, CommandFactory, FromArgMatches, Parser, Subcommand, parser::ValueSource};

use harvester_core::DEFAULT_MAX_RETRIES;
use harvester_core::plan::{PlanOptions, QueueSource};

/// Default lower bound of the delay between requests, in seconds.
pub const DEFAULT_DELAY_MIN_SECS: f64 = 1.5;

/// Default upper bound of the delay between requests, in seconds.
pub const DEFAULT_DELAY_MAX_SECS: f64 = 3.5;

/// Resumable extraction and quality audit of coding-problem records.
///
/// Harvester fetches problem statements through a warmed-up session, stores
/// one JSON record per problem, and reports how complete the corpus is.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding one JSON record per problem
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch problems and store one record per problem
    Scrape(ScrapeArgs),

    /// Audit stored records and write the quality report
    Report,
}

/// Arguments of `harvester scrape`.
#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Directory of CSV listings with a URL column
    #[arg(long, value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Fetch a single problem by slug
    #[arg(long, value_name = "SLUG", group = "mode")]
    pub slug: Option<String>,

    /// Fetch only the problems left in the failure set
    #[arg(long, group = "mode")]
    pub retry_failed: bool,

    /// Re-fetch stored problems with missing content or empty fields
    #[arg(long, group = "mode")]
    pub fix_empty: bool,

    /// Skip problems that already have a record
    #[arg(long)]
    pub resume: bool,

    /// Maximum number of problems to fetch
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,

    /// Minimum delay between requests in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_DELAY_MIN_SECS)]
    pub delay_min: f64,

    /// Maximum delay between requests in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_DELAY_MAX_SECS)]
    pub delay_max: f64,

    /// Retry passes over failed problems after the first pass (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// Site root of the question endpoint
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Also retry problems that returned no data
    #[arg(long)]
    pub retry_no_data: bool,
}

impl ScrapeArgs {
    /// Returns the queue source selected by the mode flags.
    #[must_use]
    pub fn queue_source(&self, input_dir: PathBuf) -> QueueSource {
        if let Some(slug) = &self.slug {
            QueueSource::Single(slug.clone())
        } else if self.retry_failed {
            QueueSource::RetryFailed
        } else if self.fix_empty {
            QueueSource::RepairIncomplete
        } else {
            QueueSource::All { input_dir }
        }
    }

    /// Returns the resume and limit filters.
    #[must_use]
    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            resume: self.resume,
            limit: self
                .limit
                .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX)),
        }
    }
}

impl Cli {
    /// Default tracing filter derived from -q / -v.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

/// Which defaulted options were given explicitly on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliValueSources {
    pub delay_min: bool,
    pub delay_max: bool,
    pub max_retries: bool,
}

/// Parses the process arguments and records which values came from the command line.
pub fn parse_cli_with_sources() -> (Cli, CliValueSources) {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = sources_from_matches(&matches);
    (cli, sources)
}

fn sources_from_matches(matches: &ArgMatches) -> CliValueSources {
    let Some(scrape) = matches.subcommand_matches("scrape") else {
        return CliValueSources::default();
    };
    CliValueSources {
        delay_min: is_commandline_value(scrape, "delay_min"),
        delay_max: is_commandline_value(scrape, "delay_max"),
        max_retries: is_commandline_value(scrape, "max_retries"),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn scrape(args: &[&str]) -> ScrapeArgs {
        let mut argv = vec!["harvester", "scrape"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Scrape(args) => args,
            Command::Report => panic!("expected scrape"),
        }
    }

    #[test]
    fn test_cli_scrape_defaults() {
        let args = scrape(&[]);
        assert!(args.slug.is_none());
        assert!(!args.resume);
        assert!(args.limit.is_none());
        assert!((args.delay_min - 1.5).abs() < f64::EPSILON);
        assert!((args.delay_max - 3.5).abs() < f64::EPSILON);
        assert_eq!(args.max_retries, 3);
        assert!(!args.retry_no_data);
    }

    #[test]
    fn test_cli_report_subcommand() {
        let cli = Cli::try_parse_from(["harvester", "report"]).unwrap();
        assert!(matches!(cli.command, Command::Report));
    }

    #[test]
    fn test_cli_subcommand_required() {
        assert!(Cli::try_parse_from(["harvester"]).is_err());
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["harvester", "report", "-vv", "--data-dir", "out"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.data_dir, Some(PathBuf::from("out")));
        assert_eq!(cli.log_level(), "trace");
    }

    #[test]
    fn test_cli_log_levels() {
        let cli = Cli::try_parse_from(["harvester", "-q", "report"]).unwrap();
        assert_eq!(cli.log_level(), "error");
        let cli = Cli::try_parse_from(["harvester", "-v", "report"]).unwrap();
        assert_eq!(cli.log_level(), "debug");
        let cli = Cli::try_parse_from(["harvester", "report"]).unwrap();
        assert_eq!(cli.log_level(), "info");
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Cli::try_parse_from(["harvester", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Cli::try_parse_from(["harvester", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Cli::try_parse_from(["harvester", "scrape", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_modes_are_mutually_exclusive() {
        for pair in [
            ["--slug", "two-sum", "--retry-failed"].as_slice(),
            ["--retry-failed", "--fix-empty"].as_slice(),
            ["--slug", "two-sum", "--fix-empty"].as_slice(),
        ] {
            let mut argv = vec!["harvester", "scrape"];
            argv.extend_from_slice(pair);
            let err = Cli::try_parse_from(argv).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ArgumentConflict, "{pair:?}");
        }
    }

    #[test]
    fn test_cli_mode_combines_with_filters() {
        let args = scrape(&["--retry-failed", "--resume", "--limit", "5"]);
        assert!(args.retry_failed);
        assert_eq!(
            args.plan_options(),
            PlanOptions {
                resume: true,
                limit: Some(5)
            }
        );
    }

    #[test]
    fn test_cli_limit_zero_rejected() {
        let err = Cli::try_parse_from(["harvester", "scrape", "--limit", "0"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_max_retries_range() {
        assert_eq!(scrape(&["-r", "0"]).max_retries, 0);
        assert_eq!(scrape(&["--max-retries", "10"]).max_retries, 10);
        let err = Cli::try_parse_from(["harvester", "scrape", "-r", "11"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_delays_parse_floats() {
        let args = scrape(&["--delay-min", "0.25", "--delay-max", "2"]);
        assert!((args.delay_min - 0.25).abs() < f64::EPSILON);
        assert!((args.delay_max - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_queue_source_follows_mode() {
        let input = PathBuf::from("data");
        assert_eq!(
            scrape(&["--slug", "two-sum"]).queue_source(input.clone()),
            QueueSource::Single("two-sum".to_string())
        );
        assert_eq!(
            scrape(&["--retry-failed"]).queue_source(input.clone()),
            QueueSource::RetryFailed
        );
        assert_eq!(
            scrape(&["--fix-empty"]).queue_source(input.clone()),
            QueueSource::RepairIncomplete
        );
        assert_eq!(
            scrape(&[]).queue_source(input.clone()),
            QueueSource::All { input_dir: input }
        );
    }

    #[test]
    fn test_value_sources_track_command_line() {
        let matches = Cli::command()
            .try_get_matches_from(["harvester", "scrape", "--delay-min", "2"])
            .unwrap();
        let sources = sources_from_matches(&matches);
        assert!(sources.delay_min);
        assert!(!sources.delay_max);
        assert!(!sources.max_retries);

        let matches = Cli::command()
            .try_get_matches_from(["harvester", "report"])
            .unwrap();
        assert!(!sources_from_matches(&matches).delay_min);
    }
}
