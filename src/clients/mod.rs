//! Service clients for the two external collaborators: the data warehouse
//! and the LLM completion provider.
//!
//! Clients are built once per run (or per server) and shared by every agent.

pub mod completion;
pub mod warehouse;

pub use completion::{
    ChatMessage, CompletionClient, CompletionRequest, EchoCompletion, OllamaClient, OpenAiClient,
};
pub use warehouse::{
    BigQueryClient, DryRunWarehouse, QueryParam, Row, WarehouseClient, WarehouseQuery,
};

use crate::config::{LlmConfig, LlmProvider, WarehouseConfig, WarehouseProvider};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Build the warehouse client selected by configuration.
pub fn build_warehouse(config: &WarehouseConfig) -> Result<Arc<dyn WarehouseClient>> {
    match config.provider {
        WarehouseProvider::BigQuery => {
            if config.access_token.is_none() {
                warn!("No BigQuery access token configured; requests will be unauthenticated");
            }
            info!("Warehouse: BigQuery project {}", config.project);
            let client = BigQueryClient::new(
                &config.base_url,
                &config.project,
                config.location.clone(),
                config.access_token.clone(),
                config.timeout_seconds,
            )
            .context("Failed to create BigQuery client")?;
            Ok(Arc::new(client))
        }
        WarehouseProvider::DryRun => {
            info!("Warehouse: dry-run (no queries are sent)");
            Ok(Arc::new(DryRunWarehouse))
        }
    }
}

/// Build the completion client selected by configuration.
pub fn build_completion(config: &LlmConfig) -> Result<Arc<dyn CompletionClient>> {
    let base_url = config.effective_base_url();
    match config.provider {
        LlmProvider::OpenAi => {
            if config.api_key.is_none() {
                warn!("No OpenAI API key configured; completion requests will likely fail");
            }
            info!("LLM: {} via {}", config.model, base_url);
            let client =
                OpenAiClient::new(&base_url, config.api_key.clone(), config.timeout_seconds)
                    .context("Failed to create OpenAI client")?;
            Ok(Arc::new(client))
        }
        LlmProvider::Ollama => {
            info!("LLM: {} via Ollama at {}", config.model, base_url);
            let client = OllamaClient::new(&base_url, config.timeout_seconds)
                .context("Failed to create Ollama client")?;
            Ok(Arc::new(client))
        }
        LlmProvider::DryRun => {
            info!("LLM: dry-run (prompts are not sent)");
            Ok(Arc::new(EchoCompletion))
        }
    }
}
