//! Prompt-building agents backed by the completion provider.

use super::anomaly::ZERO_EXTREMES;
use super::{Agent, AgentContext, Dependencies, LlmSettings};
use crate::clients::CompletionClient;
use crate::error::AgentError;
use crate::models::{FilterParams, KpiExplanation, KpiResult, TaskOutput, TaskResults};
use async_trait::async_trait;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{info, warn};

const EXPLAIN_SYSTEM_PROMPT: &str =
    "You are a healthcare cost analyst who explains statistics in plain language.";

const SUMMARY_SYSTEM_PROMPT: &str = "You are a helpful medical AI analyst assistant.";

pub const ZERO_EXTREMES_WARNING: &str =
    "Warning: the minimum or maximum cost is zero, so the selected filters probably matched no records. \
     Adjust the filters before interpreting these KPIs.";

/// `explain_kpis`: asks the provider to explain the `estimate_cost` KPIs.
pub struct KpiExplainer {
    completion: Arc<dyn CompletionClient>,
    settings: LlmSettings,
}

impl KpiExplainer {
    pub fn new(completion: Arc<dyn CompletionClient>, settings: LlmSettings) -> Self {
        Self {
            completion,
            settings,
        }
    }
}

pub fn kpi_prompt(kpi: &KpiResult, filters: &FilterParams) -> String {
    let mut prompt = format!(
        "Explain these healthcare cost KPIs for {} aged {}-{} ({}, {} visits):\n",
        filters.audience(),
        filters.age_min,
        filters.age_max,
        filters.region_label(),
        filters.visit_label()
    );

    let _ = writeln!(prompt, "- Average cost: ${:.2}", kpi.avg_cost);
    let _ = writeln!(prompt, "- Median cost: ${:.2}", kpi.median_cost);
    let _ = writeln!(prompt, "- Minimum cost: ${:.2}", kpi.min_cost);
    let _ = writeln!(prompt, "- Maximum cost: ${:.2}", kpi.max_cost);
    if let Some(sd) = kpi.std_dev {
        let _ = writeln!(prompt, "- Standard deviation: ${:.2}", sd);
    }
    if let Some(n) = kpi.sample_size {
        let _ = writeln!(prompt, "- Sample size: {}", n);
    }
    if let Some(r) = kpi.insurance_coverage_ratio {
        let _ = writeln!(prompt, "- Share paid by insurance: {:.1}%", r * 100.0);
    }
    if let Some(r) = kpi.member_burden_ratio {
        let _ = writeln!(prompt, "- Share paid by the member: {:.1}%", r * 100.0);
    }

    prompt.push_str(
        "\nDescribe what the gap between average and median suggests about the distribution \
         and what a member should expect to pay. Keep it under 150 words.",
    );
    prompt
}

#[async_trait]
impl Agent for KpiExplainer {
    fn name(&self) -> &'static str {
        "explain_kpis"
    }

    fn description(&self) -> &'static str {
        "LLM explanation of the estimate_cost KPIs"
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::Tasks(&["estimate_cost"])
    }

    async fn run(&self, ctx: AgentContext<'_>) -> Result<TaskOutput, AgentError> {
        let kpi = ctx
            .prior
            .kpi()
            .ok_or_else(|| AgentError::MissingDependency("estimate_cost".to_string()))?;

        if kpi.has_zero_extremes() {
            info!("explain_kpis: zero cost extremes, skipping completion request");
            return Ok(TaskOutput::Explanation(KpiExplanation {
                flag: Some(ZERO_EXTREMES.to_string()),
                explanation: ZERO_EXTREMES_WARNING.to_string(),
            }));
        }

        let request = self
            .settings
            .request(EXPLAIN_SYSTEM_PROMPT, kpi_prompt(kpi, ctx.filters));
        let explanation = self.completion.complete(&request).await?;

        Ok(TaskOutput::Explanation(KpiExplanation {
            flag: None,
            explanation,
        }))
    }
}

/// `llm_summary`: summarizes every prior output in plain terms.
pub struct LlmSummarizer {
    completion: Arc<dyn CompletionClient>,
    settings: LlmSettings,
}

impl LlmSummarizer {
    pub fn new(completion: Arc<dyn CompletionClient>, settings: LlmSettings) -> Self {
        Self {
            completion,
            settings,
        }
    }
}

pub fn summary_prompt(prior: &TaskResults) -> String {
    let mut content =
        "Here are the outputs from multiple agents analyzing healthcare cost data:\n".to_string();
    for (task, output) in prior.iter() {
        let rendered = serde_json::to_string(output).unwrap_or_default();
        let _ = write!(content, "\n---\n{}:\n{}\n", task.to_uppercase(), rendered);
    }
    content.push_str(
        "\n\nCan you summarize the key findings in simple terms and offer any recommendations?",
    );
    content
}

#[async_trait]
impl Agent for LlmSummarizer {
    fn name(&self) -> &'static str {
        "llm_summary"
    }

    fn description(&self) -> &'static str {
        "LLM narrative over all earlier results"
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::AllPrior
    }

    /// Provider failures become the summary text instead of an error.
    async fn run(&self, ctx: AgentContext<'_>) -> Result<TaskOutput, AgentError> {
        let request = self
            .settings
            .request(SUMMARY_SYSTEM_PROMPT, summary_prompt(ctx.prior));

        match self.completion.complete(&request).await {
            Ok(text) => Ok(TaskOutput::Narrative(text)),
            Err(e) => {
                warn!("llm_summary failed: {}", e);
                Ok(TaskOutput::Narrative(format!("LLM Error: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{filters, llm_settings, FakeCompletion};

    fn kpi() -> KpiResult {
        KpiResult {
            avg_cost: 2500.0,
            median_cost: 2300.0,
            min_cost: 120.0,
            max_cost: 4900.0,
            std_dev: Some(1300.0),
            sample_size: Some(55),
            insurance_coverage_ratio: Some(0.8),
            member_burden_ratio: Some(0.2),
        }
    }

    #[tokio::test]
    async fn test_explain_requires_kpi() {
        let completion = Arc::new(FakeCompletion::replying("unused"));
        let agent = KpiExplainer::new(completion.clone(), llm_settings());
        let filters = filters();
        let prior = TaskResults::new();

        let err = agent
            .run(AgentContext {
                filters: &filters,
                prior: &prior,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MissingDependency(ref t) if t == "estimate_cost"));
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_extremes_skips_provider() {
        let completion = Arc::new(FakeCompletion::replying("unused"));
        let agent = KpiExplainer::new(completion.clone(), llm_settings());
        let filters = filters();
        let mut prior = TaskResults::new();
        prior.insert("estimate_cost", TaskOutput::Kpi(KpiResult::zeroed()));

        let output = agent
            .run(AgentContext {
                filters: &filters,
                prior: &prior,
            })
            .await
            .unwrap();

        match output {
            TaskOutput::Explanation(e) => assert_eq!(e.flag.as_deref(), Some(ZERO_EXTREMES)),
            other => panic!("unexpected output: {:?}", other),
        }
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_explain_sends_kpi_prompt() {
        let completion = Arc::new(FakeCompletion::replying("Costs are right-skewed."));
        let agent = KpiExplainer::new(completion.clone(), llm_settings());
        let filters = filters();
        let mut prior = TaskResults::new();
        prior.insert("estimate_cost", TaskOutput::Kpi(kpi()));

        let output = agent
            .run(AgentContext {
                filters: &filters,
                prior: &prior,
            })
            .await
            .unwrap();

        assert_eq!(
            output,
            TaskOutput::Explanation(KpiExplanation {
                flag: None,
                explanation: "Costs are right-skewed.".to_string(),
            })
        );
        let prompt = completion.last_prompt();
        assert!(prompt.contains("Average cost: $2500.00"));
        assert!(prompt.contains("Sample size: 55"));
        assert!(prompt.contains("Males aged 30-40"));
    }

    #[tokio::test]
    async fn test_explain_propagates_provider_error() {
        let completion = Arc::new(FakeCompletion::failing());
        let agent = KpiExplainer::new(completion, llm_settings());
        let filters = filters();
        let mut prior = TaskResults::new();
        prior.insert("estimate_cost", TaskOutput::Kpi(kpi()));

        let err = agent
            .run(AgentContext {
                filters: &filters,
                prior: &prior,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Completion(_)));
    }

    #[test]
    fn test_summary_prompt_lists_prior_tasks() {
        let mut prior = TaskResults::new();
        prior.insert("estimate_cost", TaskOutput::Kpi(kpi()));
        prior.insert("detect_anomalies", TaskOutput::error("boom"));

        let prompt = summary_prompt(&prior);
        assert!(prompt.contains("ESTIMATE_COST:"));
        assert!(prompt.contains("DETECT_ANOMALIES:"));
        assert!(prompt.contains("\"avg_cost\":2500.0"));
        assert!(prompt.ends_with("offer any recommendations?"));
    }

    #[tokio::test]
    async fn test_summary_swallows_provider_error() {
        let agent = LlmSummarizer::new(Arc::new(FakeCompletion::failing()), llm_settings());
        let filters = filters();
        let prior = TaskResults::new();

        let output = agent
            .run(AgentContext {
                filters: &filters,
                prior: &prior,
            })
            .await
            .unwrap();

        match output {
            TaskOutput::Narrative(text) => assert!(text.starts_with("LLM Error:")),
            other => panic!("unexpected output: {:?}", other),
        }
    }
}
