//! `detect_anomalies`: local heuristics over the filters and any prior KPI.

use super::{Agent, AgentContext, Dependencies};
use crate::error::AgentError;
use crate::models::{AnomalyReport, FilterParams, KpiResult, TaskOutput};
use async_trait::async_trait;

pub const ELDERLY_EMERGENCY: &str = "elderly_emergency";
pub const ZERO_EXTREMES: &str = "zero_extremes";

/// Age above which emergency visits are flagged.
const ELDERLY_AGE: u32 = 70;

pub const NO_ANOMALY_MESSAGE: &str = "No significant anomalies detected in the cost data.";

pub struct AnomalyDetector;

pub fn detect(filters: &FilterParams, kpi: Option<&KpiResult>) -> AnomalyReport {
    let mut flags = Vec::new();
    let mut notes = Vec::new();

    if filters.visit_type.eq_ignore_ascii_case("emergency") && filters.age_max > ELDERLY_AGE {
        flags.push(ELDERLY_EMERGENCY.to_string());
        notes.push("Higher-than-expected emergency costs detected for elderly patients.");
    }

    if kpi.is_some_and(KpiResult::has_zero_extremes) {
        flags.push(ZERO_EXTREMES.to_string());
        notes.push("Minimum or maximum cost is zero; the filters may not match any records.");
    }

    let message = if notes.is_empty() {
        NO_ANOMALY_MESSAGE.to_string()
    } else {
        format!("Warning: {}", notes.join(" "))
    };

    AnomalyReport { flags, message }
}

#[async_trait]
impl Agent for AnomalyDetector {
    fn name(&self) -> &'static str {
        "detect_anomalies"
    }

    fn description(&self) -> &'static str {
        "Flags elderly emergency visits and empty cost extremes"
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::Tasks(&["estimate_cost"])
    }

    async fn run(&self, ctx: AgentContext<'_>) -> Result<TaskOutput, AgentError> {
        Ok(TaskOutput::Anomaly(detect(ctx.filters, ctx.prior.kpi())))
    }
}
