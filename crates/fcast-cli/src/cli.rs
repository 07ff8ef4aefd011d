//! CLI argument definitions for forecast-studio.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "forecast-studio",
    version,
    about = "Forecast Studio - demand forecasting from arbitrary CSV uploads",
    long_about = "Map messy CSV columns onto a canonical time-series schema, normalize\n\
                  the data, route it to suitable models and produce an ensemble\n\
                  forecast with prediction intervals."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Pipeline configuration (TOML). Defaults are used when omitted.
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Map the columns of a CSV file onto canonical roles.
    Analyze(InputArgs),

    /// Normalize a CSV file into the canonical long-form table.
    Normalize(NormalizeArgs),

    /// Show which models would be used for a CSV file.
    Route(InputArgs),

    /// Run the full pipeline and print the forecast.
    Forecast(ForecastArgs),

    /// Score a saved forecast against actuals and update model weights.
    Monitor(MonitorArgs),

    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Args)]
pub struct InputArgs {
    /// CSV file to read.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Print JSON instead of tables.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Args)]
pub struct NormalizeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Write the normalized table to this CSV file.
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Steps to forecast (default from config).
    #[arg(long = "horizon", value_name = "STEPS")]
    pub horizon: Option<usize>,

    /// Prediction interval level in (0, 1) (default from config).
    #[arg(long = "level", value_name = "LEVEL")]
    pub level: Option<f64>,

    /// Weight store (JSON) to read historical ensemble weights from.
    #[arg(long = "weights", value_name = "PATH")]
    pub weights: Option<PathBuf>,

    /// Save the forecast (JSON) for a later `monitor` run.
    #[arg(long = "save", value_name = "PATH")]
    pub save: Option<PathBuf>,

    /// Write the combined forecast to this CSV file.
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Hide the per-model progress bar.
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

#[derive(Args)]
pub struct MonitorArgs {
    /// Forecast saved by `forecast --save`.
    #[arg(long = "forecast", value_name = "PATH")]
    pub forecast: PathBuf,

    /// Observed values, one per forecast step.
    #[arg(long = "actuals", value_name = "VALUES", value_delimiter = ',', required = true)]
    pub actuals: Vec<f64>,

    /// Monitor state (JSON); created when missing.
    #[arg(long = "state", value_name = "PATH")]
    pub state: PathBuf,

    /// Weight store (JSON) that receives the updated weights.
    #[arg(long = "weights", value_name = "PATH")]
    pub weights: PathBuf,

    /// Print JSON instead of tables.
    #[arg(long = "json")]
    pub json: bool,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn actuals_split_on_commas() {
        let cli = Cli::parse_from([
            "forecast-studio",
            "monitor",
            "--forecast",
            "f.json",
            "--actuals",
            "1.5,2,3",
            "--state",
            "m.json",
            "--weights",
            "w.json",
        ]);
        let Command::Monitor(args) = cli.command else {
            panic!("expected monitor");
        };
        assert_eq!(args.actuals, vec![1.5, 2.0, 3.0]);
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::parse_from([
            "forecast-studio",
            "forecast",
            "sales.csv",
            "--horizon",
            "7",
            "--config",
            "forecast.toml",
            "--log-format",
            "json",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("forecast.toml")));
        assert!(matches!(cli.log_format, LogFormatArg::Json));
        let Command::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        assert_eq!(args.horizon, Some(7));
        assert_eq!(args.input.input, PathBuf::from("sales.csv"));
    }
}
