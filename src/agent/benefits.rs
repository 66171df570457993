//! `interpret_benefits`: a local summary of likely coverage.

use super::{Agent, AgentContext};
use crate::error::AgentError;
use crate::models::{BenefitsSummary, FilterParams, TaskOutput};
use async_trait::async_trait;

pub struct BenefitsInterpreter;

pub fn interpret(filters: &FilterParams) -> BenefitsSummary {
    BenefitsSummary {
        summary: format!(
            "Benefits interpreted for {} visits in {} for {} aged {}-{}.",
            filters.visit_label(),
            filters.region_label(),
            filters.audience(),
            filters.age_min,
            filters.age_max
        ),
        coverage: "Likely covered under preventive services".to_string(),
        copay: "Low or none expected".to_string(),
    }
}

#[async_trait]
impl Agent for BenefitsInterpreter {
    fn name(&self) -> &'static str {
        "interpret_benefits"
    }

    fn description(&self) -> &'static str {
        "Plain-language coverage and copay expectations"
    }

    async fn run(&self, ctx: AgentContext<'_>) -> Result<TaskOutput, AgentError> {
        Ok(TaskOutput::Benefits(interpret(ctx.filters)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::filters;

    #[test]
    fn test_summary_mentions_filters() {
        let summary = interpret(&filters());
        assert_eq!(
            summary.summary,
            "Benefits interpreted for Primary Care visits in West for Males aged 30-40."
        );
        assert_eq!(summary.copay, "Low or none expected");
    }

    #[test]
    fn test_summary_with_empty_filters() {
        let summary = interpret(&FilterParams::default());
        assert_eq!(
            summary.summary,
            "Benefits interpreted for all visits in all regions for members aged 0-100."
        );
    }
}
