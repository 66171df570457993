//! DataSage - multi-agent healthcare cost dashboard
//!
//! Runs warehouse-backed cost statistics, local heuristics and LLM
//! summaries for a member profile, from the command line or a web
//! dashboard, and exports the results as JSON, Markdown or PDF.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, connection, aborted run, etc.)
//!   2 - A task recorded an error and --fail-on-error was set

mod agent;
mod cli;
mod clients;
mod config;
mod dashboard;
mod error;
mod models;
mod planner;
mod report;
mod synthetic;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Command, OutputFormat, RunArgs};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Report, ReportMetadata};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig { force } = args.command {
        return handle_init_config(force);
    }

    // Read the config file first so general.verbose can raise the log level
    let located = Config::locate(args.config.as_deref());
    let config_verbose = matches!(located, Ok(Some(ref config)) if config.general.verbose);

    // Initialize logging
    init_logging(args.log_level(config_verbose));

    info!("DataSage v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match dispatch(args, located).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .datasage.toml.
fn handle_init_config(force: bool) -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() && !force {
        eprintln!(
            "⚠️  {} already exists. Remove it, edit it manually, or pass --force.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to choose providers, the cost table, tasks and pipelines.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

async fn dispatch(args: Args, located: Result<Option<Config>>) -> Result<i32> {
    match args.command {
        Command::GenerateData { ref output } => handle_generate_data(output),
        Command::Serve { ref bind } => {
            let config = load_config(&args, located)?;
            let bind = bind.clone().unwrap_or_else(|| config.server.bind.clone());
            handle_serve(config, &bind).await
        }
        Command::Run(ref run) => {
            let mut config = load_config(&args, located)?;
            if let Some(policy) = run.failure_policy {
                config.general.failure_policy = policy;
            }
            run_tasks(&config, run).await
        }
        Command::InitConfig { force } => handle_init_config(force).map(|_| 0),
    }
}

/// Run the requested tasks once and write the report. Returns exit code (0 or 2).
async fn run_tasks(config: &Config, run: &RunArgs) -> Result<i32> {
    let start_time = Instant::now();

    let executor = planner::build_executor(config)?;

    if run.list_tasks {
        println!("Registered tasks:");
        for (name, description) in executor.registry().describe() {
            println!("   {:<20} {}", name, description);
        }
        return Ok(0);
    }

    let filters = run.filters();
    let plan = planner::plan_for(config, &run.requested_tasks())
        .map_err(|e| anyhow::anyhow!("Invalid pipeline: {}", e))?;

    if plan.is_empty() {
        warn!("No tasks selected; the report will be empty");
    }

    println!("🧠 Running {} task(s) for {}", plan.len(), filters);
    println!("   Warehouse table: {}", config.warehouse.table);
    println!("   Model: {}", config.llm.model);
    debug!("Failure policy: {:?}", executor.policy());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_length(plan.len() as u64);
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = executor
        .run_plan_with(&filters, &plan, |index, _total, step| {
            spinner.set_position(index as u64);
            spinner.set_message(format!("Running {}...", step.task));
        })
        .await;

    spinner.finish_and_clear();
    let results = outcome?;

    // Build the report
    let duration = start_time.elapsed().as_secs_f64();
    let report = Report {
        metadata: ReportMetadata {
            generated_at: Utc::now(),
            filters: filters.clone(),
            tasks: plan.step_ids(),
            model_used: config.llm.model.clone(),
            duration_seconds: duration,
        },
        results,
    };

    let output_path = resolve_output(run, config);
    let include_metadata = config.report.include_metadata;
    let bytes = match run.format {
        OutputFormat::Json => report::generate_json_report(&report, include_metadata)?.into_bytes(),
        OutputFormat::Markdown => {
            report::generate_markdown_report(&report, include_metadata).into_bytes()
        }
        OutputFormat::Pdf => report::generate_pdf_report(&report.results),
    };

    std::fs::write(&output_path, &bytes)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    let errors = report.results.error_count();
    println!(
        "\n📊 Run Summary: {} result(s), {} error(s)",
        report.results.len(),
        errors
    );
    for (key, output) in report.results.iter() {
        let mark = if output.is_error() { "❌" } else { "✅" };
        println!("   {} {}", mark, key);
    }
    if let Some(kpi) = report.results.kpi() {
        println!(
            "   Avg cost: ${:.2} | Median: ${:.2} | Min: ${:.2} | Max: ${:.2}",
            kpi.avg_cost, kpi.median_cost, kpi.min_cost, kpi.max_cost
        );
    }
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Report saved to: {}", output_path.display());

    if run.fail_on_error && errors > 0 {
        eprintln!(
            "\n⛔ {} task(s) recorded an error. Failing (exit code 2).",
            errors
        );
        return Ok(2);
    }

    Ok(0)
}

/// `--output`, else `report.output` from config with the extension of the format.
fn resolve_output(run: &RunArgs, config: &Config) -> PathBuf {
    match run.output {
        Some(ref path) => path.clone(),
        None => PathBuf::from(&config.report.output).with_extension(run.format.extension()),
    }
}

async fn handle_serve(config: Config, bind: &str) -> Result<i32> {
    let executor = planner::build_executor(&config)?;
    println!("🌐 DataSage dashboard at http://{}", bind);

    dashboard::serve(dashboard::AppState::new(executor, config), bind).await?;
    Ok(0)
}

fn handle_generate_data(output: &Path) -> Result<i32> {
    println!("🧪 Generating synthetic cost data...");
    let rows = synthetic::generate_to_file(output, &mut synthetic::ThreadRngSampler::new())
        .with_context(|| format!("Failed to generate {}", output.display()))?;
    println!("✅ Synthetic data saved to {} ({} rows)", output.display(), rows);
    Ok(0)
}

/// Take the located config file or defaults, then apply CLI overrides.
///
/// A broken explicit `--config` is an error; a broken default file only warns.
fn load_config(args: &Args, located: Result<Option<Config>>) -> Result<Config> {
    let mut config = match (located, args.config.as_ref()) {
        (Ok(Some(config)), Some(config_path)) => {
            info!("Loaded config from: {}", config_path.display());
            config
        }
        (Ok(Some(config)), None) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            config
        }
        (Ok(None), _) => {
            debug!("No config file found, using defaults");
            Config::default()
        }
        (Err(e), Some(_)) => return Err(e),
        (Err(e), None) => {
            warn!("Failed to load config: {:#}", e);
            Config::default()
        }
    };

    config.merge_with_args(args);
    Ok(config)
}
