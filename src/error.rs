//! Error types shared by the service clients, agents and the executor.

use thiserror::Error;

/// Failure talking to the data warehouse.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("cannot reach warehouse at {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("warehouse request timed out after {0}s")]
    Timeout(u64),

    #[error("warehouse API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode warehouse response: {0}")]
    Decode(String),

    #[error("query did not complete: {0}")]
    Incomplete(String),

    #[error("invalid table identifier: {0:?}")]
    InvalidTable(String),
}

/// Failure talking to the completion provider.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("cannot connect to completion provider at {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("completion request timed out after {0}s")]
    Timeout(u64),

    #[error("completion API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse completion response: {0}")]
    Decode(String),

    #[error("completion provider returned no choices")]
    Empty,
}

/// Failure of a single agent invocation.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("missing result from required task '{0}'")]
    MissingDependency(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Raised by the executor when the failure policy is `abort`.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("task '{step}' ({task}) failed: {source}")]
    Agent {
        step: String,
        task: String,
        #[source]
        source: AgentError,
    },
}
