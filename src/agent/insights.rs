//! `generate_insights`: grouped visit statistics rendered as a sentence.

use super::sql::{visit_insights_query, TableRef};
use super::{Agent, AgentContext};
use crate::clients::{Row, WarehouseClient};
use crate::error::AgentError;
use crate::models::{FilterParams, InsightOutput, TaskOutput};
use async_trait::async_trait;
use std::sync::Arc;

pub const NO_MATCH_MESSAGE: &str = "No matching insights found.";

pub struct InsightGenerator {
    warehouse: Arc<dyn WarehouseClient>,
    table: TableRef,
}

impl InsightGenerator {
    pub fn new(warehouse: Arc<dyn WarehouseClient>, table: TableRef) -> Self {
        Self { warehouse, table }
    }
}

/// Describe the largest matching group. Group columns win over the filters
/// since an empty filter matches several groups.
fn insight_from_row(row: &Row, filters: &FilterParams) -> InsightOutput {
    let gender = row.get_str("gender").unwrap_or(filters.gender.as_str());
    let region = row.get_str("region").unwrap_or(filters.region_label());
    let visit_type = row.get_str("visit_type").unwrap_or(filters.visit_label());

    let visit_count = row.get_u64("visit_count").unwrap_or_default();
    let avg_cost = row.get_f64("avg_cost").unwrap_or_default();
    let min_cost = row.get_f64("min_cost").unwrap_or_default();
    let max_cost = row.get_f64("max_cost").unwrap_or_default();

    let audience = if gender.is_empty() {
        "members".to_string()
    } else {
        format!("{}s", gender)
    };

    let insight = format!(
        "For {} aged {}-{} in {} visiting for {}, there were {} visits. \
         Avg cost: ${:.2}, Min: ${:.2}, Max: ${:.2}.",
        audience,
        filters.age_min,
        filters.age_max,
        region,
        visit_type,
        visit_count,
        avg_cost,
        min_cost,
        max_cost
    );

    InsightOutput::Found {
        avg_cost,
        min_cost,
        max_cost,
        visit_count,
        insight,
    }
}

#[async_trait]
impl Agent for InsightGenerator {
    fn name(&self) -> &'static str {
        "generate_insights"
    }

    fn description(&self) -> &'static str {
        "Visit counts and cost range for the largest matching group"
    }

    async fn run(&self, ctx: AgentContext<'_>) -> Result<TaskOutput, AgentError> {
        ctx.filters.validate().map_err(AgentError::InvalidInput)?;
        let query = visit_insights_query(&self.table, ctx.filters);
        let rows = self.warehouse.query(&query).await?;

        let output = match rows.first() {
            Some(row) => insight_from_row(row, ctx.filters),
            None => InsightOutput::NoMatch {
                message: NO_MATCH_MESSAGE.to_string(),
            },
        };
        Ok(TaskOutput::Insight(output))
    }
}
