//! Execution plans: an ordered list of steps, each bound to a task.

use crate::config::PipelineConfig;
use std::collections::HashSet;

/// One scheduled invocation. The output is stored under `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub id: String,
    pub task: String,
    /// Overrides the agent's declared dependencies when set.
    pub uses: Option<Vec<String>>,
}

impl Step {
    pub fn for_task(task: &str) -> Self {
        Self {
            id: task.to_string(),
            task: task.to_string(),
            uses: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub name: Option<String>,
    pub steps: Vec<Step>,
}

impl Plan {
    /// One step per task name, keeping the first occurrence of duplicates.
    pub fn from_tasks<S: AsRef<str>>(tasks: &[S]) -> Self {
        let mut seen = HashSet::new();
        let steps = tasks
            .iter()
            .map(AsRef::as_ref)
            .filter(|t| seen.insert(t.to_string()))
            .map(Step::for_task)
            .collect();

        Self { name: None, steps }
    }

    /// Build from `[[pipeline.steps]]`. Step ids must be unique.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, String> {
        if config.steps.is_empty() {
            return Err("pipeline has no steps".to_string());
        }

        let mut seen = HashSet::new();
        for step in &config.steps {
            if step.id.trim().is_empty() {
                return Err(format!("pipeline step for task '{}' has no id", step.task));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(format!("duplicate pipeline step id '{}'", step.id));
            }
        }

        Ok(Self {
            name: config.name.clone(),
            steps: config
                .steps
                .iter()
                .map(|s| Step {
                    id: s.id.clone(),
                    task: s.task.clone(),
                    uses: s.uses.clone(),
                })
                .collect(),
        })
    }

    pub fn step_ids(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Split a comma-separated task list, dropping blanks.
pub fn parse_task_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}
