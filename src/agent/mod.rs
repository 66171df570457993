//! Agents: one unit of work per task name.
//!
//! Each agent wraps a single warehouse query, a single completion request,
//! or a local heuristic. Agents are stateless apart from the shared service
//! clients they hold.

pub mod anomaly;
pub mod benefits;
pub mod cost;
pub mod insights;
pub mod reasoner;
pub mod registry;
pub mod sql;

pub use registry::TaskRegistry;

use crate::clients::{ChatMessage, CompletionClient, CompletionRequest, WarehouseClient};
use crate::config::LlmConfig;
use crate::error::AgentError;
use crate::models::{FilterParams, TaskOutput, TaskResults};
use async_trait::async_trait;
use sql::TableRef;
use std::sync::Arc;

/// Which prior results an agent receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependencies {
    /// Filters only.
    None,
    /// The named prior tasks, when they have already run.
    Tasks(&'static [&'static str]),
    /// Everything accumulated so far.
    AllPrior,
}

/// Input handed to an agent for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct AgentContext<'a> {
    pub filters: &'a FilterParams,
    /// Results accumulated before this task, narrowed to its dependencies.
    pub prior: &'a TaskResults,
}

#[async_trait]
pub trait Agent: Send + Sync {
    /// Task name the agent is registered under.
    fn name(&self) -> &'static str;

    /// One-line description for listings.
    fn description(&self) -> &'static str;

    fn dependencies(&self) -> Dependencies {
        Dependencies::None
    }

    async fn run(&self, ctx: AgentContext<'_>) -> Result<TaskOutput, AgentError>;
}

/// Model and sampling options applied to every completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl LlmSettings {
    pub fn request(&self, system: &str, user: String) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl From<&LlmConfig> for LlmSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: (config.max_tokens > 0).then_some(config.max_tokens),
        }
    }
}

/// Shared clients and settings the standard agents are built from.
#[derive(Clone)]
pub struct Services {
    pub warehouse: Arc<dyn WarehouseClient>,
    pub completion: Arc<dyn CompletionClient>,
    pub table: TableRef,
    pub llm: LlmSettings,
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording fakes for the service traits.

    use super::*;
    use crate::clients::{Row, WarehouseQuery};
    use crate::error::{CompletionError, WarehouseError};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeWarehouse {
        pub rows: Vec<Row>,
        pub fail: bool,
        pub queries: Mutex<Vec<WarehouseQuery>>,
    }

    impl FakeWarehouse {
        pub fn returning(rows: Vec<Row>) -> Self {
            Self {
                rows,
                ..Self::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl WarehouseClient for FakeWarehouse {
        async fn query(&self, query: &WarehouseQuery) -> Result<Vec<Row>, WarehouseError> {
            self.queries.lock().unwrap().push(query.clone());
            if self.fail {
                return Err(WarehouseError::Status {
                    status: 500,
                    body: "backend error".to_string(),
                });
            }
            Ok(self.rows.clone())
        }
    }

    #[derive(Default)]
    pub struct FakeCompletion {
        pub reply: String,
        pub fail: bool,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl FakeCompletion {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                ..Self::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn last_prompt(&self) -> String {
            self.requests
                .lock()
                .unwrap()
                .last()
                .and_then(|r| r.messages.last())
                .map(|m| m.content.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl CompletionClient for FakeCompletion {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(CompletionError::Timeout(5));
            }
            Ok(self.reply.clone())
        }
    }

    pub fn llm_settings() -> LlmSettings {
        LlmSettings {
            model: "test-model".to_string(),
            temperature: 0.7,
            max_tokens: Some(500),
        }
    }

    pub fn table() -> TableRef {
        TableRef::parse("proj.dataset.healthcare_costs").unwrap()
    }

    pub fn filters() -> FilterParams {
        FilterParams {
            age_min: 30,
            age_max: 40,
            gender: "Male".to_string(),
            region: "West".to_string(),
            visit_type: "Primary Care".to_string(),
        }
    }
}
