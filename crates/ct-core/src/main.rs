//! Connection Triage Core - scoring and hypothesis-testing service
//!
//! The main entry point for ct-core, handling:
//! - The HTTP API (`serve`)
//! - One-shot predictions, analyses, and rankings
//! - Encoder fitting and artifact checks

use clap::{Args, Parser, Subcommand};
use ct_common::{format_error_human, Error, OutputFormat, StructuredError};
use ct_core::analysis::{duration_analysis, protocol_analysis, tcp_udp_analysis};
use ct_core::config::{load_config, ConfigOptions, ResolvedConfig};
use ct_core::context::AppContext;
use ct_core::dataset::load_dataset;
use ct_core::encode::VocabularyTable;
use ct_core::exit_codes::ExitCode;
use ct_core::hypothesis::VarianceAssumption;
use ct_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use ct_core::rank::top_responders;
use ct_core::server::ApiServer;
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

/// Connection Triage - malicious-likelihood scoring and subgroup analysis
#[derive(Parser)]
#[command(name = "ct-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Override the model artifact path
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Override the protocol encoder artifact path
    #[arg(long, global = true)]
    protocol_encoder: Option<PathBuf>,

    /// Override the connection-state encoder artifact path
    #[arg(long, global = true)]
    conn_state_encoder: Option<PathBuf>,

    /// Override the dataset path
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve(ServeArgs),

    /// Score one connection to a responder host
    Predict(PredictArgs),

    /// Run a subgroup hypothesis test over the dataset
    Analyze(AnalyzeArgs),

    /// Rank responder hosts by maximum malicious likelihood
    Top(TopArgs),

    /// Fit protocol and connection-state encoders from a dataset
    FitEncoders(FitEncodersArgs),

    /// Load every artifact and score the dataset once
    Check,

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Bind address (overrides [server].bind)
    #[arg(long)]
    bind: Option<String>,

    /// Port (overrides [server].port)
    #[arg(long)]
    port: Option<u16>,

    /// Worker threads (overrides [server].workers)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Responder IPv4 address
    #[arg(long)]
    ip: String,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[command(subcommand)]
    command: AnalyzeCommands,

    /// Variance assumption (welch or pooled)
    #[arg(long, global = true)]
    variance: Option<VarianceAssumption>,
}

#[derive(Subcommand, Debug)]
enum AnalyzeCommands {
    /// Long vs short duration connections
    Duration {
        /// Duration threshold in seconds (default: dataset median)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// One protocol vs all others
    Protocol {
        /// tcp or udp
        #[arg(long)]
        protocol: String,
    },

    /// TCP vs UDP only
    TcpUdp,
}

#[derive(Args, Debug)]
struct TopArgs {
    /// Number of responders (default from [analysis].top_limit)
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args, Debug)]
struct FitEncodersArgs {
    /// Directory to write proto_encoder.json and conn_state_encoder.json into
    #[arg(long)]
    out_dir: PathBuf,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else if cli.global.verbose > 0 {
        Some(LogLevel::Info.shifted(-(cli.global.verbose.min(2) as i8)))
    } else {
        None
    };
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let result = match &cli.command {
        Commands::Serve(args) => run_serve(&cli.global, args),
        Commands::Predict(args) => run_predict(&cli.global, args),
        Commands::Analyze(args) => run_analyze(&cli.global, args),
        Commands::Top(args) => run_top(&cli.global, args),
        Commands::FitEncoders(args) => run_fit_encoders(&cli.global, args),
        Commands::Check => run_check(&cli.global),
        Commands::Version => print_version(&cli.global),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(err) => output_error(&cli.global, &err),
    };
    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn resolve_config(global: &GlobalOpts) -> Result<ResolvedConfig, Error> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
    };
    let mut resolved = load_config(&options)?;
    let artifacts = &mut resolved.config.artifacts;
    if let Some(path) = &global.model {
        artifacts.model = path.clone();
    }
    if let Some(path) = &global.protocol_encoder {
        artifacts.protocol_encoder = path.clone();
    }
    if let Some(path) = &global.conn_state_encoder {
        artifacts.conn_state_encoder = path.clone();
    }
    if let Some(path) = &global.dataset {
        artifacts.dataset = path.clone();
    }
    Ok(resolved)
}

fn load_context(global: &GlobalOpts) -> Result<AppContext, Error> {
    AppContext::load(&resolve_config(global)?)
}

fn run_serve(global: &GlobalOpts, args: &ServeArgs) -> Result<ExitCode, Error> {
    let mut resolved = resolve_config(global)?;
    let server_config = &mut resolved.config.server;
    if let Some(bind) = &args.bind {
        server_config.bind = bind.clone();
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }
    if let Some(workers) = args.workers {
        server_config.workers = workers;
    }
    resolved.config.validate()?;

    let address = resolved.config.server.address();
    let workers = resolved.config.server.workers;
    let ctx = Arc::new(AppContext::load(&resolved)?);
    let server = ApiServer::start(&address, workers, ctx)?;
    server.join();
    Ok(ExitCode::Clean)
}

fn run_predict(global: &GlobalOpts, args: &PredictArgs) -> Result<ExitCode, Error> {
    let ctx = load_context(global)?;
    emit(global, &ctx.predict(&args.ip)?)?;
    Ok(ExitCode::Clean)
}

fn run_analyze(global: &GlobalOpts, args: &AnalyzeArgs) -> Result<ExitCode, Error> {
    let ctx = load_context(global)?;
    let significant = match &args.command {
        AnalyzeCommands::Duration { threshold } => {
            let report = duration_analysis(&ctx, *threshold, args.variance)?;
            emit(global, &report)?;
            report.test.significant
        }
        AnalyzeCommands::Protocol { protocol } => {
            let report = protocol_analysis(&ctx, protocol, args.variance)?;
            emit(global, &report)?;
            report.test.significant
        }
        AnalyzeCommands::TcpUdp => {
            let report = tcp_udp_analysis(&ctx, args.variance)?;
            emit(global, &report)?;
            report.test.significant
        }
    };
    Ok(if significant {
        ExitCode::AlternativeSupported
    } else {
        ExitCode::NullSupported
    })
}

fn run_top(global: &GlobalOpts, args: &TopArgs) -> Result<ExitCode, Error> {
    let ctx = load_context(global)?;
    emit(global, &top_responders(&ctx, args.limit)?)?;
    Ok(ExitCode::Clean)
}

#[derive(Serialize)]
struct FitSummary {
    records: usize,
    protocol_classes: Vec<String>,
    conn_state_classes: Vec<String>,
    protocol_encoder: PathBuf,
    conn_state_encoder: PathBuf,
}

fn run_fit_encoders(global: &GlobalOpts, args: &FitEncodersArgs) -> Result<ExitCode, Error> {
    let resolved = resolve_config(global)?;
    let dataset = load_dataset(&resolved.config.artifacts.dataset)?;
    let table = VocabularyTable::fit(dataset.records())?;

    std::fs::create_dir_all(&args.out_dir)?;
    let protocol_path = args.out_dir.join("proto_encoder.json");
    let conn_state_path = args.out_dir.join("conn_state_encoder.json");
    table.save(&protocol_path, &conn_state_path)?;

    emit(
        global,
        &FitSummary {
            records: dataset.len(),
            protocol_classes: table.protocol.classes().to_vec(),
            conn_state_classes: table.conn_state.classes().to_vec(),
            protocol_encoder: protocol_path,
            conn_state_encoder: conn_state_path,
        },
    )?;
    Ok(ExitCode::Clean)
}

#[derive(Serialize)]
struct CheckReport<'a> {
    status: &'static str,
    scored_records: usize,
    provenance: &'a ct_core::context::Provenance,
}

fn run_check(global: &GlobalOpts) -> Result<ExitCode, Error> {
    let ctx = load_context(global)?;
    let population = ctx.score_population()?;
    emit(
        global,
        &CheckReport {
            status: "ok",
            scored_records: population.scores.len(),
            provenance: ctx.provenance(),
        },
    )?;
    Ok(ExitCode::Clean)
}

fn print_version(global: &GlobalOpts) -> Result<ExitCode, Error> {
    let version_info = serde_json::json!({
        "ct_core_version": env!("CARGO_PKG_VERSION"),
        "feature_layout": ct_core::features::layout_fingerprint(),
        "model_schema_version": ct_core::model::MODEL_SCHEMA_VERSION,
    });

    match global.format {
        OutputFormat::Json => emit(global, &version_info)?,
        OutputFormat::Human => println!("ct-core {}", env!("CARGO_PKG_VERSION")),
    }
    Ok(ExitCode::Clean)
}

// ============================================================================
// Output
// ============================================================================

fn emit<T: Serialize>(global: &GlobalOpts, value: &T) -> Result<(), Error> {
    let json = serde_json::to_value(value)?;
    match global.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json)?),
        OutputFormat::Human => print_human(&json, 0),
    }
    Ok(())
}

fn print_human(value: &serde_json::Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                match value {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        println!("{pad}{key}:");
                        print_human(value, indent + 1);
                    }
                    _ => println!("{pad}{key}: {}", scalar(value)),
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                match item {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        println!("{pad}-");
                        print_human(item, indent + 1);
                    }
                    _ => println!("{pad}- {}", scalar(item)),
                }
            }
        }
        _ => println!("{pad}{}", scalar(value)),
    }
}

fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "n/a".to_string(),
        other => other.to_string(),
    }
}

/// Print an error to stderr in the requested format.
fn output_error(global: &GlobalOpts, error: &Error) -> ExitCode {
    match global.format {
        OutputFormat::Json => eprintln!("{}", StructuredError::from(error).to_json_pretty()),
        OutputFormat::Human => {
            eprintln!("{}", format_error_human(error, std::io::stderr().is_terminal()))
        }
    }
    ExitCode::from(error)
}
