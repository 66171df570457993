//! Task registry: maps task names to agents.

use super::anomaly::AnomalyDetector;
use super::benefits::BenefitsInterpreter;
use super::cost::CostEstimator;
use super::insights::InsightGenerator;
use super::reasoner::{KpiExplainer, LlmSummarizer};
use super::{Agent, Services};
use std::sync::Arc;
use tracing::debug;

/// Registered agents in registration order.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    agents: Vec<Arc<dyn Agent>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The six standard tasks wired to the shared service clients.
    pub fn standard(services: &Services) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CostEstimator::new(
            services.warehouse.clone(),
            services.table.clone(),
        )));
        registry.register(Arc::new(InsightGenerator::new(
            services.warehouse.clone(),
            services.table.clone(),
        )));
        registry.register(Arc::new(BenefitsInterpreter));
        registry.register(Arc::new(AnomalyDetector));
        registry.register(Arc::new(KpiExplainer::new(
            services.completion.clone(),
            services.llm.clone(),
        )));
        registry.register(Arc::new(LlmSummarizer::new(
            services.completion.clone(),
            services.llm.clone(),
        )));
        registry
    }

    /// Register an agent, replacing any agent with the same name.
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        debug!("Registering task {}", agent.name());
        match self.agents.iter_mut().find(|a| a.name() == agent.name()) {
            Some(slot) => *slot = agent,
            None => self.agents.push(agent),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.iter().find(|a| a.name() == name).cloned()
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.agents.iter().any(|a| a.name() == name)
    }

    #[cfg(test)]
    pub fn names(&self) -> Vec<&'static str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    /// `(name, description)` pairs for listings and the dashboard form.
    pub fn describe(&self) -> Vec<(&'static str, &'static str)> {
        self.agents
            .iter()
            .map(|a| (a.name(), a.description()))
            .collect()
    }
}
