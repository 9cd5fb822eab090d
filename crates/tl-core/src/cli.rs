//! Command-line interface.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::PathBuf;
use tl_common::{CollectionId, ProbeId};
use tl_config::{resolve_config, ConfigOverrides, NegativeDeltaPolicy, TraceConfig};
use tl_report::{render_text, ReconstructionCache};
use tl_store::HistogramStore;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::TraceError;
use crate::exit_codes::ExitCode;
use crate::logging::LogFormat;
use crate::sampler::{LoopSettings, StopReason};
use crate::source::{MapDumpSource, TargetSpec};
use crate::trace::{run_trace, TraceRequest};

/// Default collection database used by the read-side commands.
pub const DEFAULT_DB: &str = "probes.db";

#[derive(Parser, Debug)]
#[command(
    name = "txlat",
    version,
    about = "Sample transaction latency counters into a collection database and report on them"
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Attach to a target and record one collection
    Trace(TraceArgs),
    /// Print reconstructed statistics of a collection
    Report(ReportArgs),
    /// List the collections in a database
    Collections(CollectionsArgs),
    /// Inspect the trace configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Args, Debug)]
pub struct TraceArgs {
    /// Build identifier (git commit) of the traced program
    #[arg(short, long)]
    pub commit: String,

    /// Collection database; created with the probe table if absent
    #[arg(long)]
    pub db: PathBuf,

    /// Trace this process only
    #[arg(short, long)]
    pub pid: Option<u32>,

    /// Executable to trace
    #[arg(short, long)]
    pub exe: Option<PathBuf>,

    /// Timeslice length in seconds [default: 600]
    #[arg(short = 's', long)]
    pub timeslice: Option<u64>,

    /// Total trace duration in seconds [default: unbounded]
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Comma separated tags, e.g. version numbers
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Directory the eBPF loader dumps its maps into
    #[arg(long, env = "TXLAT_SNAPSHOT_DIR")]
    pub snapshot_dir: Option<PathBuf>,

    /// Trace configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// What to do when a cumulative counter decreases
    #[arg(long)]
    pub negative_delta: Option<NegativeDeltaPolicy>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    #[arg(long, default_value = DEFAULT_DB)]
    pub db: PathBuf,

    /// Collection id; the latest collection when omitted
    #[arg(long)]
    pub collection: Option<i64>,

    /// Restrict output to one probe
    #[arg(long)]
    pub probe: Option<i64>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Trace configuration file (result-code range)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CollectionsArgs {
    #[arg(long, default_value = DEFAULT_DB)]
    pub db: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the resolved configuration
    Show {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the JSON Schema of the configuration file
    Schema,
}

/// Run a parsed command line, printing errors to stderr.
pub fn run(cli: Cli) -> ExitCode {
    match dispatch(cli.command) {
        Ok(code) => code,
        Err(err) => {
            let code = ExitCode::for_error(&err);
            eprintln!("txlat: error[{}]: {err}", err.code());
            code
        }
    }
}

fn dispatch(command: Command) -> tl_common::Result<ExitCode> {
    match command {
        Command::Trace(args) => cmd_trace(args),
        Command::Report(args) => cmd_report(args),
        Command::Collections(args) => cmd_collections(args),
        Command::Config { command } => cmd_config(command),
    }
}

fn load_config(path: Option<PathBuf>) -> tl_common::Result<TraceConfig> {
    let resolved = resolve_config(&ConfigOverrides {
        config_file: path,
        ..Default::default()
    })?;
    debug!(source = ?resolved.source, "configuration resolved");
    Ok(resolved.config)
}

fn default_snapshot_dir() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("txlat")
}

fn cmd_trace(args: TraceArgs) -> tl_common::Result<ExitCode> {
    let resolved = resolve_config(&ConfigOverrides {
        config_file: args.config,
        timeslice_secs: args.timeslice,
        duration_secs: args.duration,
        negative_delta: args.negative_delta,
    })?;
    let config = resolved.config;

    let tags: Vec<String> = args
        .tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    let request = TraceRequest {
        db: args.db,
        build_id: args.commit,
        tags,
    };
    let mut source = MapDumpSource::new(
        args.snapshot_dir.unwrap_or_else(default_snapshot_dir),
        TargetSpec {
            pid: args.pid,
            exe: args.exe,
        },
    );
    let cancel = CancelToken::with_signals().map_err(TraceError::Signals)?;
    let settings = LoopSettings::from_secs(config.timeslice_secs, config.duration_secs);

    let outcome = run_trace(&config, &request, &mut source, settings, &cancel)?;
    println!(
        "collection {} closed: {} intervals, {} rows, {} transactions, {} anomalies",
        outcome.collection,
        outcome.totals.intervals,
        outcome.totals.rows,
        outcome.totals.transactions,
        outcome.regressions
    );
    Ok(match outcome.stop {
        StopReason::DurationElapsed => ExitCode::Clean,
        StopReason::Cancelled => ExitCode::Interrupted,
    })
}

fn cmd_report(args: ReportArgs) -> tl_common::Result<ExitCode> {
    let config = load_config(args.config)?;
    let cache = ReconstructionCache::new(config.cache_capacity, config.result_range);
    let stats = cache.get_or_build(&args.db, args.collection.map(CollectionId))?;
    let probe = args.probe.map(ProbeId);

    match args.format {
        OutputFormat::Text => print!("{}", render_text(&stats, probe)),
        OutputFormat::Json => {
            let value = match probe {
                None => serde_json::to_value(&*stats)
                    .map_err(|e| tl_common::Error::Json(e.to_string()))?,
                Some(id) => {
                    let latency: Vec<_> =
                        stats.latency_series.iter().filter(|p| p.probe_id == id).collect();
                    let results: Vec<_> =
                        stats.result_series.iter().filter(|p| p.probe_id == id).collect();
                    json!({
                        "collection": stats.collection,
                        "window": stats.window,
                        "probe": stats.probe(id),
                        "latency_series": latency,
                        "result_series": results,
                        "trimmed_latency": stats.trimmed_latency(id),
                        "trimmed_results": stats.trimmed_results(id),
                        "out_of_range_results": stats.out_of_range_results,
                    })
                }
            };
            print_json(&value)?;
        }
    }
    Ok(ExitCode::Clean)
}

fn cmd_collections(args: CollectionsArgs) -> tl_common::Result<ExitCode> {
    let mut store = HistogramStore::open_existing(&args.db)?;
    let collections = store.ledger().list()?;

    match args.format {
        OutputFormat::Json => {
            let value = serde_json::to_value(&collections)
                .map_err(|e| tl_common::Error::Json(e.to_string()))?;
            print_json(&value)?;
        }
        OutputFormat::Text => {
            for c in &collections {
                let state = match c.end {
                    Some(end) => format!("closed {}", end.format_utc()),
                    None => "open".to_string(),
                };
                let tags = if c.tags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", c.tags.join(", "))
                };
                println!("{} {} {}{}", c.label(), c.build_id, state, tags);
            }
        }
    }
    Ok(ExitCode::Clean)
}

fn cmd_config(command: ConfigCommand) -> tl_common::Result<ExitCode> {
    let value = match command {
        ConfigCommand::Show { config } => serde_json::to_value(load_config(config)?)
            .map_err(|e| tl_common::Error::Json(e.to_string()))?,
        ConfigCommand::Schema => TraceConfig::json_schema(),
    };
    print_json(&value)?;
    Ok(ExitCode::Clean)
}

fn print_json(value: &serde_json::Value) -> tl_common::Result<()> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| tl_common::Error::Json(e.to_string()))?;
    println!("{text}");
    Ok(())
}
