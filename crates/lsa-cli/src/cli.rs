//! CLI argument definitions for the longitudinal survey analysis tool.

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{ColorChoice, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use lsa_cli::logging::{LogConfig, LogFormat};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(
    name = "lsa",
    version,
    about = "Longitudinal survey analysis - baseline-adjusted two-arm comparisons",
    long_about = "Harmonize per-instrument survey tables into one panel and run the\n\
                  analysis battery: time course within each arm, arm differences at\n\
                  each timepoint, and subgroup moderation."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Colored output: auto, always or never.
    #[command(flatten)]
    pub color: Color,

    /// Log level; takes precedence over -v/-q.
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LevelChoice>,

    /// Log line format.
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatChoice,

    /// Append log lines to this file rather than stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Logging settings; `--log-level` beats `-v/-q`, and either beats
    /// `RUST_LOG`.
    pub fn log_config(&self) -> LogConfig {
        let explicit = self.log_level.map(LevelFilter::from);
        let with_ansi = match self.color.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => self.log_file.is_none() && io::stderr().is_terminal(),
        };
        LogConfig {
            level_filter: explicit.unwrap_or_else(|| self.verbosity.tracing_level_filter()),
            use_env_filter: explicit.is_none() && !self.verbosity.is_present(),
            with_ansi,
            format: self.log_format.into(),
            log_file: self.log_file.clone(),
            ..LogConfig::default()
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Harmonize the study inputs and run the full analysis battery.
    Run(RunArgs),

    /// Harmonize the study inputs and report panel counts and issues.
    Harmonize(HarmonizeArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Path to the study configuration (TOML).
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Write the result tables to this file.
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Result file format.
    #[arg(long = "format", value_enum, default_value = "json")]
    pub format: ResultFormat,

    /// Worker threads for model fitting (overrides the configuration).
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Exit with status 1 when any comparison was omitted.
    #[arg(long = "fail-on-omitted")]
    pub fail_on_omitted: bool,
}

#[derive(Parser)]
pub struct HarmonizeArgs {
    /// Path to the study configuration (TOML).
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ResultFormat {
    Json,
    Csv,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LevelChoice {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatChoice {
    Pretty,
    Compact,
    Json,
}

impl From<LevelChoice> for LevelFilter {
    fn from(level: LevelChoice) -> Self {
        match level {
            LevelChoice::Error => LevelFilter::ERROR,
            LevelChoice::Warn => LevelFilter::WARN,
            LevelChoice::Info => LevelFilter::INFO,
            LevelChoice::Debug => LevelFilter::DEBUG,
            LevelChoice::Trace => LevelFilter::TRACE,
        }
    }
}

impl From<LogFormatChoice> for LogFormat {
    fn from(format: LogFormatChoice) -> Self {
        match format {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Compact => LogFormat::Compact,
            LogFormatChoice::Json => LogFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_flag_disables_env_filter() {
        let cli = Cli::parse_from(["lsa", "--log-level", "debug", "harmonize", "study.toml"]);
        let config = cli.log_config();
        assert_eq!(config.level_filter, LevelFilter::DEBUG);
        assert!(!config.use_env_filter);
    }

    #[test]
    fn test_defaults_leave_env_filter_on() {
        let cli = Cli::parse_from([
            "lsa", "--color", "never", "run", "study.toml", "-o", "out.csv", "--format", "csv",
        ]);
        let config = cli.log_config();
        assert_eq!(config.level_filter, LevelFilter::WARN);
        assert!(config.use_env_filter);
        assert!(!config.with_ansi);
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(matches!(args.format, ResultFormat::Csv));
        assert_eq!(args.output, Some(PathBuf::from("out.csv")));
    }
}
