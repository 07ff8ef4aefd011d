//! forecast-studio CLI.

use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use fcast_cli::commands::{
    ForecastJob, MonitorJob, analyze_file, forecast_file, load_pipeline, monitor_outcome,
    normalize_file, route_file,
};
use fcast_cli::logging::{LogConfig, LogFormat, init_logging};
use fcast_core::{ForecastPipeline, ForecastRequest};
use fcast_ensemble::ProgressEvent;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::level_filters::LevelFilter;

mod cli;
mod summary;

use crate::cli::{Cli, Command, ForecastArgs, LogFormatArg, LogLevelArg};
use crate::summary::{
    print_forecast, print_monitor, print_plan, print_profile, print_schema, print_transform,
};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match run(&cli) {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<()> {
    let pipeline = load_pipeline(cli.config.as_deref())?;
    match &cli.command {
        Command::Analyze(args) => {
            let analysis = analyze_file(&pipeline, &args.input)?;
            if args.json {
                print_json(&analysis)?;
            } else {
                print_schema(&analysis.schema);
                print_profile(&analysis.columns);
            }
        }
        Command::Normalize(args) => {
            let normalized = normalize_file(&pipeline, &args.input.input, args.output.as_deref())?;
            if args.input.json {
                print_json(&serde_json::json!({
                    "schema": normalized.schema,
                    "transform": normalized.transform,
                }))?;
            } else {
                print_schema(&normalized.schema);
                print_transform(&normalized.transform);
                if args.output.is_none() {
                    println!("{}", normalized.frame.data());
                }
            }
        }
        Command::Route(args) => {
            let routed = route_file(&pipeline, &args.input)?;
            if args.json {
                print_json(&routed)?;
            } else {
                print_plan(&routed.plan);
            }
        }
        Command::Forecast(args) => run_forecast(&pipeline, args)?,
        Command::Monitor(args) => {
            let job = MonitorJob {
                forecast: args.forecast.clone(),
                actuals: args.actuals.clone(),
                state: args.state.clone(),
                weights: args.weights.clone(),
            };
            let report = monitor_outcome(&pipeline, &job)?;
            if args.json {
                print_json(&report)?;
            } else {
                print_monitor(&report);
            }
        }
        Command::Config => {
            print!("{}", pipeline.config().to_toml_string()?);
        }
    }
    Ok(())
}

fn run_forecast(pipeline: &ForecastPipeline, args: &ForecastArgs) -> Result<()> {
    let defaults = pipeline.default_request();
    let job = ForecastJob {
        input: args.input.input.clone(),
        request: ForecastRequest::new(
            args.horizon.unwrap_or(defaults.horizon),
            args.level.unwrap_or(defaults.confidence_level),
        ),
        weights: args.weights.clone(),
        save: args.save.clone(),
        output: args.output.clone(),
    };

    let show_progress = !args.no_progress && !args.input.json && io::stderr().is_terminal();
    let bar = show_progress.then(model_progress_bar);
    let on_event = |event: &ProgressEvent| {
        if let Some(bar) = &bar {
            track_progress(bar, event);
        }
    };
    let result = forecast_file(pipeline, &job, Some(&on_event));
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }
    let output = result?;

    if args.input.json {
        print_json(&output)?;
    } else {
        print_forecast(&output);
    }
    Ok(())
}

fn model_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

fn track_progress(bar: &ProgressBar, event: &ProgressEvent) {
    match event {
        ProgressEvent::Queued { .. } => bar.inc_length(1),
        ProgressEvent::Training { model } => bar.set_message(format!("training {model}")),
        ProgressEvent::Completed { model, elapsed_ms } => {
            bar.inc(1);
            bar.set_message(format!("{model} done in {elapsed_ms} ms"));
        }
        ProgressEvent::Failed { model, .. } => {
            bar.inc(1);
            bar.set_message(format!("{model} failed"));
        }
        ProgressEvent::Cancelled { model } => {
            bar.inc(1);
            bar.set_message(format!("{model} cancelled"));
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{text}");
    Ok(())
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig::default().with_level(cli.verbosity.tracing_level_filter());
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config = config.with_level(match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        });
    }
    config = config
        .with_format(match cli.log_format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        })
        .with_log_file(cli.log_file.clone());
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
