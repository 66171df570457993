//! SQL templates for the warehouse-backed agents.
//!
//! Filter values are always bound as named parameters. Only the table
//! identifier is spliced into the text, after validation.

use crate::clients::{QueryParam, WarehouseQuery};
use crate::error::WarehouseError;
use crate::models::FilterParams;
use std::fmt;

/// A validated `project.dataset.table` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef(String);

impl TableRef {
    pub fn parse(raw: &str) -> Result<Self, WarehouseError> {
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(WarehouseError::InvalidTable(raw.to_string()))
        }
    }

    /// Backtick-quoted for use in a FROM clause.
    pub fn quoted(&self) -> String {
        format!("`{}`", self.0)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// An empty categorical parameter matches every row.
const FILTER_PREDICATE: &str = "age BETWEEN @age_min AND @age_max
          AND (@gender = '' OR LOWER(gender) = LOWER(@gender))
          AND (@region = '' OR LOWER(region) = LOWER(@region))
          AND (@visit_type = '' OR LOWER(visit_type) = LOWER(@visit_type))";

fn filter_params(filters: &FilterParams) -> Vec<QueryParam> {
    vec![
        QueryParam::int64("age_min", i64::from(filters.age_min)),
        QueryParam::int64("age_max", i64::from(filters.age_max)),
        QueryParam::string("gender", &filters.gender),
        QueryParam::string("region", &filters.region),
        QueryParam::string("visit_type", &filters.visit_type),
    ]
}

/// Cost statistics plus the insurance/member ratios for one filter set.
pub fn cost_stats_query(table: &TableRef, filters: &FilterParams) -> WarehouseQuery {
    let sql = format!(
        "WITH cost_stats AS (
        SELECT
          AVG(cost) AS avg_cost,
          APPROX_QUANTILES(cost, 2)[OFFSET(1)] AS median_cost,
          MIN(cost) AS min_cost,
          MAX(cost) AS max_cost,
          STDDEV(cost) AS std_dev,
          COUNT(*) AS sample_size,
          AVG(insurance_paid) AS avg_insurance_paid,
          AVG(member_paid) AS avg_member_paid
        FROM {table}
        WHERE {predicate}
      )
      SELECT
        *,
        avg_insurance_paid / NULLIF(avg_cost, 0) AS insurance_coverage_ratio,
        avg_member_paid / NULLIF(avg_cost, 0) AS member_burden_ratio
      FROM cost_stats",
        table = table.quoted(),
        predicate = FILTER_PREDICATE,
    );

    WarehouseQuery {
        sql,
        params: filter_params(filters),
    }
}

/// Visit counts and rounded cost extremes per (visit type, region, gender),
/// largest group first.
pub fn visit_insights_query(table: &TableRef, filters: &FilterParams) -> WarehouseQuery {
    let sql = format!(
        "SELECT
        visit_type,
        region,
        gender,
        COUNT(*) AS visit_count,
        ROUND(AVG(cost), 2) AS avg_cost,
        ROUND(MIN(cost), 2) AS min_cost,
        ROUND(MAX(cost), 2) AS max_cost
      FROM {table}
      WHERE {predicate}
      GROUP BY visit_type, region, gender
      ORDER BY visit_count DESC",
        table = table.quoted(),
        predicate = FILTER_PREDICATE,
    );

    WarehouseQuery {
        sql,
        params: filter_params(filters),
    }
}
