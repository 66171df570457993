//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.datasage.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".datasage.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Data warehouse settings.
    #[serde(default)]
    pub warehouse: WarehouseConfig,

    /// Completion provider settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Optional configured pipeline.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Dashboard server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// What the executor does when an agent fails.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Store `{"error": ...}` under the task and continue.
    #[default]
    Record,
    /// Stop the run and return the error.
    Abort,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Tasks run when none are given on the command line.
    #[serde(default = "default_tasks")]
    pub default_tasks: Vec<String>,

    /// Agent failure handling.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_tasks: default_tasks(),
            failure_policy: FailurePolicy::Record,
            verbose: false,
        }
    }
}

fn default_tasks() -> Vec<String> {
    vec!["estimate_cost".to_string(), "generate_insights".to_string()]
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum WarehouseProvider {
    #[default]
    #[value(name = "bigquery")]
    #[serde(rename = "bigquery")]
    BigQuery,
    DryRun,
}

/// Data warehouse settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default)]
    pub provider: WarehouseProvider,

    /// REST base URL.
    #[serde(default = "default_bigquery_url")]
    pub base_url: String,

    /// Project the query jobs are billed to.
    #[serde(default = "default_project")]
    pub project: String,

    /// Fully qualified `project.dataset.table` holding the cost records.
    #[serde(default = "default_table")]
    pub table: String,

    /// Job location (e.g. "US").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// OAuth access token. Usually supplied via BIGQUERY_ACCESS_TOKEN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            provider: WarehouseProvider::BigQuery,
            base_url: default_bigquery_url(),
            project: default_project(),
            table: default_table(),
            location: None,
            access_token: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_bigquery_url() -> String {
    "https://bigquery.googleapis.com/bigquery/v2".to_string()
}

fn default_project() -> String {
    "datasage-adk-v2".to_string()
}

fn default_table() -> String {
    "datasage-adk-v2.datasage_health.healthcare_costs".to_string()
}

fn default_timeout() -> u64 {
    60
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum LlmProvider {
    #[default]
    #[value(name = "openai")]
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
    DryRun,
}

/// Completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL. Defaults depend on the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API key. Usually supplied via OPENAI_API_KEY.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in response. 0 sends no cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            model: default_model(),
            base_url: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl LlmConfig {
    /// Base URL, falling back to the provider's public default.
    pub fn effective_base_url(&self) -> String {
        if let Some(ref url) = self.base_url {
            return url.clone();
        }
        match self.provider {
            LlmProvider::OpenAi => "https://api.openai.com/v1".to_string(),
            LlmProvider::Ollama => "http://localhost:11434".to_string(),
            LlmProvider::DryRun => String::new(),
        }
    }
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

/// A configured sequence of steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Display name for logs and reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// One pipeline step. Results are stored under `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    pub id: String,
    pub task: String,
    /// Restrict the chained context to these prior step ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<Vec<String>>,
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Default output file path for `run`.
    #[serde(default = "default_output")]
    pub output: String,

    /// Write per-run metadata into Markdown/JSON exports.
    #[serde(default = "default_true")]
    pub include_metadata: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            include_metadata: true,
        }
    }
}

fn default_output() -> String {
    "datasage_report.json".to_string()
}

fn default_true() -> bool {
    true
}

/// Dashboard server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the dashboard listens on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Recent `/run` results kept for PDF download.
    #[serde(default = "default_saved_runs")]
    pub saved_runs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            saved_runs: default_saved_runs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

fn default_saved_runs() -> usize {
    32
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Load `path`, or the default location when no path is given.
    ///
    /// Returns `Ok(None)` only when no path was given and the default file doesn't exist.
    pub fn locate(path: Option<&Path>) -> Result<Option<Self>> {
        match path {
            Some(path) => Self::load(path).map(Some),
            None => Self::load_default(),
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or through their
    /// environment fallbacks) override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(ref token) = args.bigquery_token {
            self.warehouse.access_token = Some(token.clone());
        }
        if let Some(ref key) = args.openai_api_key {
            self.llm.api_key = Some(key.clone());
        }

        let overrides = &args.services;
        if let Some(provider) = overrides.warehouse {
            self.warehouse.provider = provider;
        }
        if let Some(ref project) = overrides.project {
            self.warehouse.project = project.clone();
        }
        if let Some(ref table) = overrides.table {
            self.warehouse.table = table.clone();
        }
        if let Some(provider) = overrides.llm {
            self.llm.provider = provider;
        }
        if let Some(ref model) = overrides.model {
            self.llm.model = model.clone();
        }
        if let Some(ref url) = overrides.llm_url {
            self.llm.base_url = Some(url.clone());
        }
        if let Some(timeout) = overrides.timeout {
            self.warehouse.timeout_seconds = timeout;
            self.llm.timeout_seconds = timeout;
        }
        if overrides.dry_run {
            self.warehouse.provider = WarehouseProvider::DryRun;
            self.llm.provider = LlmProvider::DryRun;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.llm.max_tokens, 500);
        assert_eq!(config.general.failure_policy, FailurePolicy::Record);
        assert_eq!(
            config.general.default_tasks,
            vec!["estimate_cost", "generate_insights"]
        );
        assert!(config.pipeline.steps.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
failure_policy = "abort"
default_tasks = ["estimate_cost"]

[warehouse]
provider = "dry-run"
table = "proj.ds.costs"

[llm]
provider = "ollama"
model = "llama3.2:latest"
temperature = 0.2

[pipeline]
name = "cost-review"

[[pipeline.steps]]
id = "cost"
task = "estimate_cost"

[[pipeline.steps]]
id = "explain"
task = "explain_kpis"
uses = ["cost"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.warehouse.provider, WarehouseProvider::DryRun);
        assert_eq!(config.warehouse.table, "proj.ds.costs");
        assert_eq!(config.warehouse.timeout_seconds, 60);
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.effective_base_url(), "http://localhost:11434");
        assert_eq!(config.pipeline.name.as_deref(), Some("cost-review"));
        assert_eq!(config.pipeline.steps.len(), 2);
        assert_eq!(
            config.pipeline.steps[1].uses,
            Some(vec!["cost".to_string()])
        );
    }

    #[test]
    fn test_max_tokens_zero_removes_cap() {
        use crate::agent::LlmSettings;

        let config: Config = toml::from_str("[llm]\nmax_tokens = 0\n").unwrap();
        assert_eq!(config.llm.max_tokens, 0);
        let request = LlmSettings::from(&config.llm).request("system", "user".to_string());
        assert_eq!(request.max_tokens, None);

        let config: Config = toml::from_str("[llm]\nmax_tokens = 1200\n").unwrap();
        assert_eq!(LlmSettings::from(&config.llm).max_tokens, Some(1200));
        assert_eq!(LlmSettings::from(&Config::default().llm).max_tokens, Some(500));
    }

    #[test]
    fn test_provider_names() {
        let config: Config = toml::from_str(
            "[warehouse]\nprovider = \"bigquery\"\n[llm]\nprovider = \"openai\"\n",
        )
        .unwrap();
        assert_eq!(config.warehouse.provider, WarehouseProvider::BigQuery);
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[server]\nbind = \"0.0.0.0:9000\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.saved_runs, 32);
        assert_eq!(config.report.output, "datasage_report.json");
    }

    #[test]
    fn test_locate_explicit_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[general]\nverbose = true\n").unwrap();

        let config = Config::locate(Some(&path)).unwrap().unwrap();
        assert!(config.general.verbose);

        let missing = dir.path().join("missing.toml");
        assert!(Config::locate(Some(&missing)).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[warehouse]"));
        assert!(toml_str.contains("[llm]"));
        assert!(toml_str.contains("[server]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.warehouse.table, default_table());
    }
}
