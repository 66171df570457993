//! Sequential plan executor.
//!
//! Steps run one at a time in plan order. Each step sees only results
//! produced by earlier steps, narrowed to its dependencies.

use super::pipeline::{Plan, Step};
use crate::agent::{Agent, AgentContext, Dependencies, TaskRegistry};
use crate::config::FailurePolicy;
use crate::error::ExecutorError;
use crate::models::{FilterParams, TaskOutput, TaskResults};
use tracing::{debug, info, warn};

pub struct Executor {
    registry: TaskRegistry,
    policy: FailurePolicy,
}

impl Executor {
    pub fn new(registry: TaskRegistry, policy: FailurePolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Run each named task once, in order.
    #[cfg(test)]
    pub async fn run_tasks<S: AsRef<str>>(
        &self,
        filters: &FilterParams,
        tasks: &[S],
    ) -> Result<TaskResults, ExecutorError> {
        self.run_plan(filters, &Plan::from_tasks(tasks)).await
    }

    pub async fn run_plan(
        &self,
        filters: &FilterParams,
        plan: &Plan,
    ) -> Result<TaskResults, ExecutorError> {
        self.run_plan_with(filters, plan, |_, _, _| {}).await
    }

    /// Run a plan, calling `on_step(index, total, step)` before each step.
    pub async fn run_plan_with<F>(
        &self,
        filters: &FilterParams,
        plan: &Plan,
        mut on_step: F,
    ) -> Result<TaskResults, ExecutorError>
    where
        F: FnMut(usize, usize, &Step) + Send,
    {
        let mut results = TaskResults::new();
        // (step id, task name) of every step that stored a result
        let mut completed: Vec<(&str, &str)> = Vec::with_capacity(plan.len());
        let total = plan.len();

        if let Some(ref name) = plan.name {
            info!("Running pipeline '{}' ({} steps)", name, total);
        }

        for (index, step) in plan.steps.iter().enumerate() {
            on_step(index, total, step);

            let Some(agent) = self.registry.get(&step.task) else {
                warn!("Unknown task: {}", step.task);
                results.insert(
                    step.id.clone(),
                    TaskOutput::error(format!("Unknown task: {}", step.task)),
                );
                completed.push((step.id.as_str(), step.task.as_str()));
                continue;
            };

            let prior = context_for(step, agent.as_ref(), &results, &completed);
            debug!(
                "Step {} ({}) sees prior results: {:?}",
                step.id,
                step.task,
                prior.keys().collect::<Vec<_>>()
            );
            info!("Running task {} ({}/{})", step.task, index + 1, total);

            let ctx = AgentContext {
                filters,
                prior: &prior,
            };

            match agent.run(ctx).await {
                Ok(output) => results.insert(step.id.clone(), output),
                Err(e) => match self.policy {
                    FailurePolicy::Record => {
                        warn!("Task {} failed: {}", step.id, e);
                        results.insert(step.id.clone(), TaskOutput::error(e.to_string()));
                    }
                    FailurePolicy::Abort => {
                        return Err(ExecutorError::Agent {
                            step: step.id.clone(),
                            task: step.task.clone(),
                            source: e,
                        });
                    }
                },
            }
            completed.push((step.id.as_str(), step.task.as_str()));
        }

        Ok(results)
    }
}

/// Prior results a step may see. `uses` on the step wins over the agent's
/// declared dependencies.
///
/// Declared dependencies name tasks, while results are keyed by step id, so
/// an earlier step matches when either its id or its task is declared.
fn context_for(
    step: &Step,
    agent: &dyn Agent,
    results: &TaskResults,
    completed: &[(&str, &str)],
) -> TaskResults {
    if let Some(ref uses) = step.uses {
        return results.subset(uses.as_slice());
    }
    match agent.dependencies() {
        Dependencies::None => TaskResults::new(),
        Dependencies::Tasks(names) => {
            let keys: Vec<&str> = completed
                .iter()
                .filter(|(id, task)| names.iter().any(|name| name == id || name == task))
                .map(|(id, _)| *id)
                .collect();
            results.subset(&keys)
        }
        Dependencies::AllPrior => results.clone(),
    }
}
