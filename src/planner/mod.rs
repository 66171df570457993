//! Planner: turns a task list or configured pipeline into sequential agent
//! calls and accumulates their results.

pub mod executor;
pub mod pipeline;

pub use executor::Executor;
pub use pipeline::{parse_task_list, Plan};

use crate::agent::sql::TableRef;
use crate::agent::{LlmSettings, Services, TaskRegistry};
use crate::clients::{build_completion, build_warehouse};
use crate::config::Config;
use anyhow::{Context, Result};

/// Build the service clients and an executor over the standard registry.
pub fn build_executor(config: &Config) -> Result<Executor> {
    let table = TableRef::parse(&config.warehouse.table)
        .with_context(|| format!("Invalid warehouse table '{}'", config.warehouse.table))?;

    let services = Services {
        warehouse: build_warehouse(&config.warehouse)?,
        completion: build_completion(&config.llm)?,
        table,
        llm: LlmSettings::from(&config.llm),
    };

    Ok(Executor::new(
        TaskRegistry::standard(&services),
        config.general.failure_policy,
    ))
}

/// Explicitly requested tasks win; otherwise the configured pipeline, then
/// the configured default tasks.
pub fn plan_for(config: &Config, requested: &[String]) -> std::result::Result<Plan, String> {
    if !requested.is_empty() {
        Ok(Plan::from_tasks(requested))
    } else if !config.pipeline.steps.is_empty() {
        Plan::from_config(&config.pipeline)
    } else {
        Ok(Plan::from_tasks(&config.general.default_tasks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmProvider, StepConfig, WarehouseProvider};

    fn dry_run_config() -> Config {
        let mut config = Config::default();
        config.warehouse.provider = WarehouseProvider::DryRun;
        config.llm.provider = LlmProvider::DryRun;
        config
    }

    #[test]
    fn test_build_executor_dry_run() {
        let executor = build_executor(&dry_run_config()).unwrap();
        assert_eq!(executor.registry().names().len(), 6);
    }

    #[test]
    fn test_build_executor_rejects_bad_table() {
        let mut config = dry_run_config();
        config.warehouse.table = "costs; DROP TABLE x".to_string();
        assert!(build_executor(&config).is_err());
    }

    #[test]
    fn test_plan_for_precedence() {
        let mut config = dry_run_config();
        let requested = vec!["llm_summary".to_string()];
        assert_eq!(
            plan_for(&config, &[]).unwrap().step_ids(),
            vec!["estimate_cost", "generate_insights"]
        );

        config.pipeline.steps.push(StepConfig {
            id: "cost".to_string(),
            task: "estimate_cost".to_string(),
            uses: None,
        });
        assert_eq!(plan_for(&config, &[]).unwrap().step_ids(), vec!["cost"]);
        assert_eq!(
            plan_for(&config, &requested).unwrap().step_ids(),
            vec!["llm_summary"]
        );
    }

    #[tokio::test]
    async fn test_dry_run_plan_executes_all_tasks() {
        let executor = build_executor(&dry_run_config()).unwrap();
        let tasks: Vec<String> = executor
            .registry()
            .names()
            .into_iter()
            .map(String::from)
            .collect();
        let results = executor
            .run_tasks(&crate::models::FilterParams::default(), &tasks)
            .await
            .unwrap();
        assert_eq!(results.len(), 6);
        assert_eq!(results.error_count(), 0);
    }

    #[tokio::test]
    async fn test_fixture_pipeline_chains_by_step_id() {
        let config: Config =
            toml::from_str(include_str!("../../fixtures/review_pipeline.toml")).unwrap();
        let executor = build_executor(&config).unwrap();
        let plan = plan_for(&config, &[]).unwrap();
        assert_eq!(plan.name.as_deref(), Some("cost-review"));

        let results = executor
            .run_plan(&crate::models::FilterParams::default(), &plan)
            .await
            .unwrap();

        assert_eq!(
            results.keys().collect::<Vec<_>>(),
            vec!["cost", "anomalies", "explain", "summary"]
        );
        match results.get("anomalies") {
            Some(crate::models::TaskOutput::Anomaly(report)) => {
                assert_eq!(report.flags, vec!["zero_extremes"]);
            }
            other => panic!("unexpected anomaly output: {:?}", other),
        }
        match results.get("explain") {
            Some(crate::models::TaskOutput::Explanation(e)) => {
                assert_eq!(e.flag.as_deref(), Some("zero_extremes"));
            }
            other => panic!("unexpected explanation output: {:?}", other),
        }
    }
}
