use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use zoneprof::capture::Capture;
use zoneprof::config::{DurationUnit, OutputConfig};
use zoneprof::model::TraceView;
use zoneprof::output;

/// Summarize a captured zone trace and export it to other formats.
#[derive(Parser, Debug)]
#[command(name = "zoneprof", version, about)]
struct Cli {
    /// Capture dump (JSON) to read
    input: PathBuf,

    /// TOML file with output settings; flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a Chrome tracing timeline (JSON) to this path
    #[arg(long, value_name = "FILE")]
    output_timeline: Option<PathBuf>,

    /// Write a flat XPlane protobuf to this path
    #[arg(long, value_name = "FILE")]
    output_flat: Option<PathBuf>,

    /// Don't print the zone summary
    #[arg(long)]
    no_stdout: bool,

    /// Only summarize zones whose name contains this (repeatable)
    #[arg(long = "zone", value_name = "SUBSTR")]
    zones: Vec<String>,

    /// Only summarize threads whose name contains this (repeatable)
    #[arg(long = "thread", value_name = "SUBSTR")]
    threads: Vec<String>,

    /// Unit for durations in the summary
    #[arg(long, value_enum)]
    unit: Option<DurationUnit>,

    /// Log more (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn output_config(&self) -> anyhow::Result<OutputConfig> {
        let mut config = match &self.config {
            Some(path) => OutputConfig::load(path)?,
            None => OutputConfig::default(),
        };
        if let Some(path) = &self.output_timeline {
            config.timeline_file = Some(path.clone());
        }
        if let Some(path) = &self.output_flat {
            config.flat_file = Some(path.clone());
        }
        if self.no_stdout {
            config.stdout = false;
        }
        if !self.zones.is_empty() {
            config.zone_filters = self.zones.clone();
        }
        if !self.threads.is_empty() {
            config.thread_filters = self.threads.clone();
        }
        if let Some(unit) = self.unit {
            config.unit = unit;
        }
        Ok(config)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.output_config()?;
    let capture = Capture::load(&cli.input)
        .with_context(|| format!("Could not load capture {}", cli.input.display()))?;

    let report = output::dispatch(&TraceView::new(&capture), &config);
    for failure in report.failures() {
        log::warn!("{} output was not written", failure.name);
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
