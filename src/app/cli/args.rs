//! Command-line arguments
//!
//! Global options apply to every subcommand and override the configuration
//! file; subcommand options only exist where they make sense.

use crate::core::validation::validate_positive_int;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "websecscan")]
#[command(about = "Supervised web vulnerability scans against an OWASP ZAP engine")]
#[command(version)]
#[command(after_help = " * can be specified multiple times")]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Scan engine API base URL
    #[arg(short = 'e', long = "engine-url", value_name = "URL", global = true)]
    pub engine_url: Option<String>,

    /// Scan engine API key
    #[arg(short = 'k', long = "api-key", value_name = "KEY", global = true)]
    pub api_key: Option<String>,

    /// Engine request timeout in seconds
    #[arg(long = "request-timeout", value_name = "SECONDS", value_parser = validate_positive_int, global = true)]
    pub request_timeout: Option<u64>,

    /// User-Agent sent to the engine
    #[arg(long = "user-agent", value_name = "AGENT", global = true)]
    pub user_agent: Option<String>,

    /// Force coloured output
    #[arg(short = 'g', long = "color", conflicts_with = "no_color", global = true)]
    pub color: bool,

    /// Disable coloured output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"], global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"], global = true)]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// More output (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Less output (repeatable)
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List the available scan profiles
    Profiles,
    /// Run a scan session against a target URL
    Scan(ScanArgs),
    /// Show version and build information
    Version,
}

#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct ScanArgs {
    /// Target URL (http or https)
    #[arg(value_name = "URL")]
    pub target: String,

    /// Scan profile id
    #[arg(short = 'p', long = "profile", value_name = "ID", default_value = "passive")]
    pub profile: String,

    /// Confirm you are authorized to run intrusive scans against the target
    #[arg(short = 'a', long = "authorized")]
    pub authorized: bool,

    /// URL regex to exclude from scanning*
    #[arg(short = 'x', long = "exclude", value_name = "REGEX", action = ArgAction::Append)]
    pub exclude: Vec<String>,

    /// Do not apply the built-in logout/delete exclusions
    #[arg(long = "no-default-exclusions")]
    pub no_default_exclusions: bool,

    /// Poll interval in milliseconds
    #[arg(long = "poll-interval", value_name = "MS", value_parser = validate_positive_int)]
    pub poll_interval: Option<u64>,

    /// Consecutive transient engine faults tolerated while polling
    #[arg(long = "max-transient-failures", value_name = "COUNT")]
    pub max_transient_failures: Option<usize>,
}

impl Args {
    /// Net verbosity: `-v` count minus `-q` count
    pub fn verbosity(&self) -> i8 {
        let net = i16::from(self.verbose) - i16::from(self.quiet);
        net.clamp(i16::from(i8::MIN), i16::from(i8::MAX)) as i8
    }

    /// Explicit colour choice, `None` when left to terminal detection
    pub fn color_choice(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_scan_arguments() {
        let args = Args::try_parse_from([
            "websecscan",
            "scan",
            "https://example.org",
            "--profile",
            "active",
            "--authorized",
            "-x",
            ".*/static/.*",
            "--exclude",
            ".*/cdn/.*",
            "--poll-interval",
            "250",
        ])
        .unwrap();

        let Command::Scan(scan) = args.command else {
            panic!("expected scan command");
        };
        assert_eq!(scan.target, "https://example.org");
        assert_eq!(scan.profile, "active");
        assert!(scan.authorized);
        assert_eq!(scan.exclude, vec![".*/static/.*", ".*/cdn/.*"]);
        assert_eq!(scan.poll_interval, Some(250));
        assert!(!scan.no_default_exclusions);
    }

    #[test]
    fn test_scan_defaults_to_passive_without_consent() {
        let args = Args::try_parse_from(["websecscan", "scan", "https://example.org"]).unwrap();
        let Command::Scan(scan) = args.command else {
            panic!("expected scan command");
        };
        assert_eq!(scan.profile, "passive");
        assert!(!scan.authorized);
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let args = Args::try_parse_from([
            "websecscan",
            "profiles",
            "--engine-url",
            "http://zap:8090",
            "-vv",
            "-q",
        ])
        .unwrap();
        assert_eq!(args.command, Command::Profiles);
        assert_eq!(args.engine_url.as_deref(), Some("http://zap:8090"));
        assert_eq!(args.verbosity(), 1);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result = Args::try_parse_from([
            "websecscan",
            "scan",
            "https://example.org",
            "--poll-interval",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_color_choice() {
        let args = Args::try_parse_from(["websecscan", "--no-color", "version"]).unwrap();
        assert_eq!(args.color_choice(), Some(false));
        let args = Args::try_parse_from(["websecscan", "version"]).unwrap();
        assert_eq!(args.color_choice(), None);
    }
}
