//! edsteva - completeness estimation pipeline
//!
//! The main entry point, handling:
//! - Probe computation from a dataset
//! - Model fitting, prediction and threshold selection
//! - Synthetic dataset generation
//! - Configuration checks

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use es_common::{Error, OutputFormat, Result, RunId, SCHEMA_VERSION};
use es_config::validate::validate_thresholds;
use es_core::config::{
    load_config, ConfigError, ConfigOptions, MetricName, PipelineConfig, ResolvedConfig,
    CONFIG_SCHEMA_VERSION,
};
use es_core::exit_codes::ExitCode;
use es_core::hierarchy::CareSiteHierarchy;
use es_core::logging::{event_names, init_logging, Level, LogConfig, LogContext, Stage};
use es_core::{select, Dataset, FitOptions, Model, Probe, SyntheticConfig};
use es_store::{write_table, FlatTable, WriterConfig};
use serde_json::{json, Value};
use tracing::info;

/// edsteva - estimate the temporal completeness of care-site data
#[derive(Parser)]
#[command(name = "edsteva")]
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
    /// Pipeline configuration file (overrides EDSTEVA_CONFIG and XDG lookup)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a dataset into monthly completeness series
    Compute(ComputeArgs),

    /// Fit the configured curve to every series of a probe
    Fit(FitArgs),

    /// Evaluate a fitted model on a probe
    Predict(PredictArgs),

    /// Keep the estimates that pass the thresholds
    Select(SelectArgs),

    /// Generate a synthetic dataset with known deployment months
    Synth(SynthArgs),

    /// Validate configuration (and optionally a dataset)
    Check(CheckArgs),

    /// Print version information
    Version,
}

// ============================================================================
// Command argument structs
// ============================================================================

#[derive(Args, Debug)]
struct ComputeArgs {
    /// Dataset JSON file
    #[arg(long)]
    data: PathBuf,

    /// Where to save the computed probe
    #[arg(long)]
    out: PathBuf,

    /// Also write the predictor table as Parquet
    #[arg(long)]
    parquet: Option<PathBuf>,

    /// Trim each series to its first and last active month
    #[arg(long)]
    trim_dates: bool,
}

#[derive(Args, Debug)]
struct FitArgs {
    /// Probe file produced by `compute`
    #[arg(long)]
    probe: PathBuf,

    /// Where to save the fitted model
    #[arg(long)]
    out: PathBuf,

    /// Also write the estimates table as Parquet
    #[arg(long)]
    parquet: Option<PathBuf>,

    /// First month used for fitting (overrides model.start_date)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// First month excluded from fitting (overrides model.end_date)
    #[arg(long)]
    end_date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Model file produced by `fit`
    #[arg(long)]
    model: PathBuf,

    /// Probe file produced by `compute`
    #[arg(long)]
    probe: PathBuf,

    /// Also write the predictions table as Parquet
    #[arg(long)]
    parquet: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SelectArgs {
    /// Model file produced by `fit`
    #[arg(long)]
    model: PathBuf,

    /// Latest accepted onset month
    #[arg(long)]
    max_t0: Option<NaiveDate>,

    /// Lowest accepted plateau value
    #[arg(long)]
    min_c0: Option<f64>,

    /// Highest accepted fit error
    #[arg(long)]
    max_error: Option<f64>,

    /// Metric bounded by --max-error (defaults to the shape's metric)
    #[arg(long, requires = "max_error")]
    metric: Option<MetricName>,

    /// Save the narrowed model here
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SynthArgs {
    /// Where to write the dataset JSON
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 1)]
    hospitals: usize,

    #[arg(long, default_value_t = 1)]
    poles_per_hospital: usize,

    #[arg(long, default_value_t = 3)]
    units_per_pole: usize,

    #[arg(long, default_value_t = 24)]
    months: usize,

    #[arg(long, default_value_t = 20)]
    visits_per_month: u32,

    /// Deployment month offsets, cycled over units
    #[arg(long, value_delimiter = ',', default_value = "0,6,12")]
    deployment: Vec<u32>,

    /// Relative jitter on monthly visit counts
    #[arg(long, default_value_t = 0.0)]
    noise: f64,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Print the JSON schema of the pipeline configuration
    #[arg(long)]
    schema: bool,

    /// Also load a dataset and check its care site hierarchy
    #[arg(long)]
    data: Option<PathBuf>,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                ExitCode::ArgsError.as_i32()
            } else {
                0
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_logging(&LogConfig::from_env(cli.global.verbose, cli.global.quiet));

    let run_id = RunId::new();
    let (name, stage) = command_info(&cli.command);
    let span = tracing::info_span!("run", run_id = %run_id, stage = stage.as_str());
    let _enter = span.enter();
    info!(event = event_names::RUN_STARTED, command = name, "run started");

    let result = match &cli.command {
        Commands::Compute(args) => run_compute(&cli.global, args),
        Commands::Fit(args) => run_fit(&cli.global, args),
        Commands::Predict(args) => run_predict(args),
        Commands::Select(args) => run_select(&cli.global, args),
        Commands::Synth(args) => run_synth(args),
        Commands::Check(args) => run_check(&cli.global, args),
        Commands::Version => Ok(version_output()),
    };

    let exit_code = match result {
        Ok(output) => {
            let code = output.exit_code();
            render(&cli.global, &run_id, &output);
            code
        }
        Err(err) => report_error(&cli.global, &run_id, name, stage, &err),
    };
    info!(
        event = event_names::RUN_FINISHED,
        exit_code = exit_code.code_name(),
        "run finished"
    );

    std::process::exit(exit_code.as_i32());
}

fn command_info(command: &Commands) -> (&'static str, Stage) {
    match command {
        Commands::Compute(_) => ("compute", Stage::Compute),
        Commands::Fit(_) => ("fit", Stage::Fit),
        Commands::Predict(_) => ("predict", Stage::Predict),
        Commands::Select(_) => ("select", Stage::Select),
        Commands::Synth(_) => ("synth", Stage::Persist),
        Commands::Check(_) => ("check", Stage::Init),
        Commands::Version => ("version", Stage::Init),
    }
}

// ============================================================================
// Output
// ============================================================================

/// Result of one command, rendered in the requested format.
struct CommandOutput {
    command: &'static str,
    /// Row count driving the empty-result exit code; `None` for commands
    /// without a tabular result.
    rows: Option<usize>,
    payload: Value,
    summary: String,
    markdown: Vec<String>,
}

impl CommandOutput {
    fn exit_code(&self) -> ExitCode {
        self.rows.map_or(ExitCode::Clean, ExitCode::for_rows)
    }
}

fn render(global: &GlobalOpts, run_id: &RunId, output: &CommandOutput) {
    match global.format {
        OutputFormat::Json => {
            let mut envelope = json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": run_id.0,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "command": output.command,
                "status": "ok",
            });
            if let (Value::Object(env), Value::Object(payload)) = (&mut envelope, &output.payload)
            {
                env.extend(payload.clone());
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&envelope).unwrap_or_default()
            );
        }
        OutputFormat::Summary => {
            println!("[{}] {}: {}", run_id, output.command, output.summary);
        }
        OutputFormat::Md => {
            println!("# edsteva {}", output.command);
            println!();
            for line in &output.markdown {
                println!("{}", line);
            }
            println!();
            println!("Run: {}", run_id);
        }
    }
}

fn report_error(
    global: &GlobalOpts,
    run_id: &RunId,
    command: &str,
    stage: Stage,
    err: &Error,
) -> ExitCode {
    let exit_code = ExitCode::from(err);
    match global.format {
        OutputFormat::Json => {
            let event = LogContext::new(run_id.0.clone())
                .event(Level::Error, event_names::RUN_FAILED, stage, err.to_string())
                .with_field("command", command)
                .with_field("code", err.code())
                .with_field("category", err.category())
                .with_field("recoverable", err.is_recoverable())
                .with_field("exit_code", exit_code.code_name())
                .with_field("remediation", err.remediation());
            eprintln!("{}", event.to_jsonl());
        }
        OutputFormat::Summary => {
            eprintln!("[{}] {} failed: {}", run_id, command, err);
        }
        OutputFormat::Md => {
            eprintln!("# {}", err.headline());
            eprintln!();
            eprintln!("Error: {}", err);
            eprintln!("Hint: {}", err.remediation());
        }
    }
    exit_code
}

fn table_markdown(table: &FlatTable) -> Vec<String> {
    match table.pretty() {
        Ok(text) => vec!["```".to_string(), text, "```".to_string()],
        Err(e) => vec![format!("(table unavailable: {})", e)],
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

fn load_pipeline(global: &GlobalOpts) -> Result<ResolvedConfig> {
    let options = ConfigOptions {
        pipeline_path: global.config.clone(),
    };
    Ok(load_config(&options)?)
}

fn load_dataset(path: &Path) -> Result<Dataset> {
    let dataset = Dataset::from_json_file(path)?;
    let tables: BTreeMap<&str, usize> = dataset.table_sizes().into_iter().collect();
    info!(
        event = event_names::DATA_LOADED,
        path = %path.display(),
        tables = ?tables,
        "dataset loaded"
    );
    Ok(dataset)
}

fn write_parquet(path: Option<&Path>, table: &FlatTable) -> Result<Option<String>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let written = write_table(path, table, &WriterConfig::new())?;
    Ok(Some(written.display().to_string()))
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_compute(global: &GlobalOpts, args: &ComputeArgs) -> Result<CommandOutput> {
    let config = load_pipeline(global)?;
    let dataset = load_dataset(&args.data)?;

    let mut probe = Probe::new(config.pipeline.probe.clone());
    probe.compute(&dataset)?;
    if args.trim_dates {
        probe.filter_date_per_care_site()?;
    }
    probe.save(&args.out)?;

    let table = probe.to_table()?;
    let parquet = write_parquet(args.parquet.as_deref(), &table)?;
    let predictor = probe.predictor()?;

    Ok(CommandOutput {
        command: "compute",
        rows: Some(predictor.len()),
        payload: json!({
            "config": config.snapshot(),
            "probe_path": args.out.display().to_string(),
            "parquet_path": parquet,
            "domain": predictor.domain,
            "algorithm": predictor.algorithm,
            "label_dimensions": predictor.label_dimensions,
            "count_columns": predictor.count_columns,
            "series": predictor.num_series(),
            "rows": predictor.len(),
        }),
        summary: format!(
            "{} series, {} rows ({} {})",
            predictor.num_series(),
            predictor.len(),
            predictor.domain,
            predictor.algorithm
        ),
        markdown: table_markdown(&table),
    })
}

fn run_fit(global: &GlobalOpts, args: &FitArgs) -> Result<CommandOutput> {
    let config = load_pipeline(global)?;
    let probe = Probe::load(&args.probe)?;

    let model_config = config.pipeline.model.clone();
    let mut options = FitOptions::from_config(&model_config);
    if args.start_date.is_some() {
        options.start_date = args.start_date;
    }
    if args.end_date.is_some() {
        options.end_date = args.end_date;
    }

    let mut model = Model::new(model_config)?;
    let estimates = model.fit(&probe, &options)?.clone();
    model.save(&args.out)?;

    let table = estimates.to_table();
    let parquet = write_parquet(args.parquet.as_deref(), &table)?;

    Ok(CommandOutput {
        command: "fit",
        rows: Some(estimates.len()),
        payload: json!({
            "config": config.snapshot(),
            "model_path": args.out.display().to_string(),
            "parquet_path": parquet,
            "shape": estimates.shape,
            "metrics": estimates.metrics,
            "estimates": estimates.rows,
        }),
        summary: format!("{} estimates ({})", estimates.len(), estimates.shape),
        markdown: table_markdown(&table),
    })
}

fn run_predict(args: &PredictArgs) -> Result<CommandOutput> {
    let model = Model::load(&args.model)?;
    let probe = Probe::load(&args.probe)?;

    let predictions = model.predict(&probe)?;
    let table = predictions.to_table();
    let parquet = write_parquet(args.parquet.as_deref(), &table)?;

    Ok(CommandOutput {
        command: "predict",
        rows: Some(predictions.len()),
        payload: json!({
            "parquet_path": parquet,
            "label_dimensions": predictions.label_dimensions,
            "predictions": predictions.rows,
        }),
        summary: format!("{} predicted months", predictions.len()),
        markdown: table_markdown(&table),
    })
}

fn run_select(global: &GlobalOpts, args: &SelectArgs) -> Result<CommandOutput> {
    let config = load_pipeline(global)?;
    let mut model = Model::load(&args.model)?;

    let mut thresholds = config.pipeline.thresholds.clone();
    if args.max_t0.is_some() {
        thresholds.max_t0 = args.max_t0;
    }
    if args.min_c0.is_some() {
        thresholds.min_c0 = args.min_c0;
    }
    if let Some(bound) = args.max_error {
        let metric = args
            .metric
            .unwrap_or_else(|| model.config().shape.default_metric());
        thresholds.max_metric.insert(metric, bound);
    }
    validate_thresholds(&thresholds).map_err(ConfigError::from)?;

    let estimates = model.estimates()?;
    let total = estimates.len();
    let selected: Vec<_> = select(estimates, &thresholds).into_iter().cloned().collect();
    let sites: Vec<&str> = selected
        .iter()
        .map(|r| r.key.care_site_short_name.as_str())
        .collect();
    let mut markdown = vec![format!("Selected {} of {} estimates.", selected.len(), total)];
    markdown.push(String::new());
    markdown.extend(sites.iter().map(|s| format!("- {}", s)));
    let summary = format!("{} of {} estimates selected", selected.len(), total);

    if let Some(out) = &args.out {
        model.filter_estimates(&thresholds)?;
        model.save(out)?;
    }

    Ok(CommandOutput {
        command: "select",
        rows: Some(selected.len()),
        payload: json!({
            "thresholds": thresholds,
            "total": total,
            "selected": selected,
            "model_path": args.out.as_ref().map(|p| p.display().to_string()),
        }),
        summary,
        markdown,
    })
}

fn run_synth(args: &SynthArgs) -> Result<CommandOutput> {
    let config = SyntheticConfig::default()
        .seed(args.seed)
        .hospitals(args.hospitals)
        .poles_per_hospital(args.poles_per_hospital)
        .units_per_pole(args.units_per_pole)
        .months(args.months)
        .visits_per_month(args.visits_per_month)
        .deployment(args.deployment.clone())
        .noise(args.noise);
    let dataset = config.generate();
    dataset.to_json_file(&args.out)?;

    let deployments: Vec<Value> = config
        .deployments()
        .into_iter()
        .map(|d| {
            json!({
                "care_site_id": d.care_site_id,
                "care_site_short_name": d.short_name,
                "month": d.month,
            })
        })
        .collect();
    let tables: BTreeMap<&str, usize> = dataset.table_sizes().into_iter().collect();
    let markdown = deployments
        .iter()
        .map(|d| format!("- {} from {}", d["care_site_short_name"], d["month"]))
        .collect();

    Ok(CommandOutput {
        command: "synth",
        rows: None,
        payload: json!({
            "data_path": args.out.display().to_string(),
            "seed": args.seed,
            "tables": tables,
            "deployments": deployments,
        }),
        summary: format!("{} units written to {}", deployments.len(), args.out.display()),
        markdown,
    })
}

fn run_check(global: &GlobalOpts, args: &CheckArgs) -> Result<CommandOutput> {
    if args.schema {
        let schema = schemars::schema_for!(PipelineConfig);
        return Ok(CommandOutput {
            command: "check",
            rows: None,
            payload: json!({ "schema": schema }),
            summary: "pipeline configuration schema".to_string(),
            markdown: vec![
                "```json".to_string(),
                serde_json::to_string_pretty(&schema)?,
                "```".to_string(),
            ],
        });
    }

    let config = load_pipeline(global)?;
    let probe = Probe::new(config.pipeline.probe.clone());
    let plan = probe.plan()?;
    Model::new(config.pipeline.model.clone())?;
    let mut checks = vec![
        json!({"check": "config", "status": "ok", "source": config.paths.source.to_string()}),
        json!({
            "check": "probe",
            "status": "ok",
            "domain": plan.domain,
            "algorithm": plan.algorithm,
            "count_columns": plan.count_columns,
        }),
        json!({"check": "model", "status": "ok", "shape": config.pipeline.model.shape}),
    ];

    if let Some(path) = &args.data {
        let dataset = load_dataset(path)?;
        let hierarchy = CareSiteHierarchy::new(dataset.care_sites()?.iter().cloned())?;
        checks.push(json!({
            "check": "data",
            "status": "ok",
            "care_sites": hierarchy.len(),
            "tables": dataset.table_sizes().into_iter().collect::<BTreeMap<_, _>>(),
        }));
    }

    let markdown = checks
        .iter()
        .map(|c| format!("✓ {}: ok", c["check"].as_str().unwrap_or("?")))
        .collect();
    let summary = format!("{} checks ok", checks.len());
    Ok(CommandOutput {
        command: "check",
        rows: None,
        payload: json!({ "config": config.snapshot(), "checks": checks }),
        summary,
        markdown,
    })
}

fn version_output() -> CommandOutput {
    CommandOutput {
        command: "version",
        rows: None,
        payload: json!({
            "edsteva_version": env!("CARGO_PKG_VERSION"),
            "config_schema_version": CONFIG_SCHEMA_VERSION,
            "rust_version": env!("CARGO_PKG_RUST_VERSION"),
        }),
        summary: format!("edsteva {}", env!("CARGO_PKG_VERSION")),
        markdown: vec![
            format!("edsteva {}", env!("CARGO_PKG_VERSION")),
            format!("schema version: {}", SCHEMA_VERSION),
        ],
    }
}
