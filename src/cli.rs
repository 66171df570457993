//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::{FailurePolicy, LlmProvider, WarehouseProvider};
use crate::models::{FilterParams, MAX_AGE};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// DataSage - multi-agent healthcare cost dashboard
///
/// Runs warehouse-backed cost statistics and LLM summaries for a member
/// profile, from the command line or through the web dashboard.
///
/// Examples:
///   datasage run --min-age 30 --max-age 40 --gender Male --region West
///   datasage run --tasks estimate_cost,explain_kpis --format pdf -o report.pdf
///   datasage --dry-run run --tasks estimate_cost,llm_summary
///   datasage serve --bind 0.0.0.0:8501
///   datasage generate-data -o robust_healthcare_costs.csv
///   datasage init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .datasage.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// OAuth access token for the BigQuery REST API
    #[arg(long, global = true, env = "BIGQUERY_ACCESS_TOKEN", hide_env_values = true)]
    pub bigquery_token: Option<String>,

    /// API key for the OpenAI-compatible completion provider
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[command(flatten)]
    pub services: ServiceOverrides,
}

/// Overrides for the `[warehouse]` and `[llm]` config sections.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ServiceOverrides {
    /// Warehouse backend (bigquery, dry-run)
    #[arg(long, global = true, env = "DATASAGE_WAREHOUSE", value_name = "PROVIDER")]
    pub warehouse: Option<WarehouseProvider>,

    /// Warehouse project id
    #[arg(long, global = true, env = "DATASAGE_PROJECT")]
    pub project: Option<String>,

    /// Fully qualified cost table (project.dataset.table)
    #[arg(long, global = true, env = "DATASAGE_TABLE")]
    pub table: Option<String>,

    /// Completion provider (openai, ollama, dry-run)
    #[arg(long, global = true, env = "DATASAGE_LLM", value_name = "PROVIDER")]
    pub llm: Option<LlmProvider>,

    /// Model id sent to the completion provider
    #[arg(short, long, global = true, env = "DATASAGE_MODEL")]
    pub model: Option<String>,

    /// Completion provider base URL
    #[arg(long, global = true, env = "DATASAGE_LLM_URL", value_name = "URL")]
    pub llm_url: Option<String>,

    /// Request timeout in seconds for both providers
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Use the offline warehouse and completion clients
    ///
    /// Queries are logged and return no rows; prompts are not sent.
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run tasks for one member profile and write a report
    Run(RunArgs),

    /// Serve the web dashboard
    Serve {
        /// Address to listen on (default from config: 127.0.0.1:8501)
        #[arg(long, env = "DATASAGE_BIND", value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Write the synthetic cost table as CSV
    GenerateData {
        /// Output CSV path
        #[arg(short, long, default_value = crate::synthetic::DEFAULT_OUTPUT, value_name = "FILE")]
        output: PathBuf,
    },

    /// Generate a default .datasage.toml configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Minimum member age
    #[arg(long, visible_alias = "age-min", default_value = "0")]
    pub min_age: u32,

    /// Maximum member age
    #[arg(long, visible_alias = "age-max", default_value = "100")]
    pub max_age: u32,

    /// Gender filter (empty matches any)
    #[arg(long, default_value = "")]
    pub gender: String,

    /// Region filter (empty matches any)
    #[arg(long, visible_alias = "state", default_value = "")]
    pub region: String,

    /// Visit type filter (empty matches any)
    #[arg(long, default_value = "")]
    pub visit_type: String,

    /// Tasks to run in order (comma-separated)
    ///
    /// Defaults to the configured pipeline, then to general.default_tasks.
    #[arg(short, long, value_name = "TASKS", value_delimiter = ',')]
    pub tasks: Option<Vec<String>>,

    /// List the registered tasks and exit
    #[arg(long)]
    pub list_tasks: bool,

    /// Output format (json, markdown, pdf)
    #[arg(long, default_value = "json", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report
    ///
    /// Defaults to report.output from config, with the extension of --format
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// What to do when a task fails (record, abort)
    #[arg(long, value_name = "POLICY")]
    pub failure_policy: Option<FailurePolicy>,

    /// Exit with code 2 when any task recorded an error
    #[arg(long)]
    pub fail_on_error: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Markdown format
    Markdown,
    /// PDF format
    Pdf,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
            OutputFormat::Pdf => "pdf",
        }
    }
}

impl RunArgs {
    pub fn filters(&self) -> FilterParams {
        FilterParams {
            age_min: self.min_age,
            age_max: self.max_age,
            gender: self.gender.trim().to_string(),
            region: self.region.trim().to_string(),
            visit_type: self.visit_type.trim().to_string(),
        }
    }

    /// Requested task names with blanks dropped.
    pub fn requested_tasks(&self) -> Vec<String> {
        self.tasks
            .iter()
            .flatten()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.services.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        // Validate LLM URL format if provided
        if let Some(ref url) = self.services.llm_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("LLM URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Command::Run(ref run) = self.command {
            if run.max_age > MAX_AGE {
                return Err(format!("--max-age must be at most {}", MAX_AGE));
            }
            run.filters().validate()?;
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `general.verbose` from the config file; `--quiet`
    /// still wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
