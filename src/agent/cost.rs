//! `estimate_cost`: cost statistics for the filtered member population.

use super::sql::{cost_stats_query, TableRef};
use super::{Agent, AgentContext};
use crate::clients::{Row, WarehouseClient};
use crate::error::AgentError;
use crate::models::{KpiResult, TaskOutput};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct CostEstimator {
    warehouse: Arc<dyn WarehouseClient>,
    table: TableRef,
}

impl CostEstimator {
    pub fn new(warehouse: Arc<dyn WarehouseClient>, table: TableRef) -> Self {
        Self { warehouse, table }
    }
}

/// Missing rows or a NULL average mean nothing matched.
fn kpi_from_rows(rows: &[Row]) -> KpiResult {
    let Some(row) = rows.first() else {
        return KpiResult::zeroed();
    };
    let Some(avg_cost) = row.get_f64("avg_cost") else {
        return KpiResult::zeroed();
    };

    KpiResult {
        avg_cost,
        median_cost: row.get_f64("median_cost").unwrap_or_default(),
        min_cost: row.get_f64("min_cost").unwrap_or_default(),
        max_cost: row.get_f64("max_cost").unwrap_or_default(),
        std_dev: row.get_f64("std_dev"),
        sample_size: row.get_u64("sample_size"),
        insurance_coverage_ratio: row.get_f64("insurance_coverage_ratio"),
        member_burden_ratio: row.get_f64("member_burden_ratio"),
    }
}

#[async_trait]
impl Agent for CostEstimator {
    fn name(&self) -> &'static str {
        "estimate_cost"
    }

    fn description(&self) -> &'static str {
        "Average, median, min and max cost with coverage ratios"
    }

    async fn run(&self, ctx: AgentContext<'_>) -> Result<TaskOutput, AgentError> {
        ctx.filters.validate().map_err(AgentError::InvalidInput)?;
        let query = cost_stats_query(&self.table, ctx.filters);
        let rows = self.warehouse.query(&query).await?;
        debug!("estimate_cost received {} rows", rows.len());
        Ok(TaskOutput::Kpi(kpi_from_rows(&rows)))
    }
}
