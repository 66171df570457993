//! Data models for the cost dashboard.
//!
//! This module contains the filter parameters every agent receives, the
//! per-task outputs, and the ordered results mapping the executor builds.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Upper bound accepted for `age_max` at the CLI and dashboard edges.
pub const MAX_AGE: u32 = 120;

/// Category values present in the cost table.
pub const GENDERS: [&str; 3] = ["Male", "Female", "Other"];
pub const REGIONS: [&str; 4] = ["Northeast", "Midwest", "South", "West"];
pub const VISIT_TYPES: [&str; 4] = ["Emergency", "Primary Care", "Inpatient", "Outpatient"];

/// Member profile filters shared by every task in a run.
///
/// An empty categorical filter matches any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    #[serde(alias = "min_age")]
    pub age_min: u32,
    #[serde(alias = "max_age")]
    pub age_max: u32,
    pub gender: String,
    #[serde(alias = "state")]
    pub region: String,
    pub visit_type: String,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            age_min: 0,
            age_max: 100,
            gender: String::new(),
            region: String::new(),
            visit_type: String::new(),
        }
    }
}

impl FilterParams {
    /// Check the age range. Categorical values are passed through untouched.
    pub fn validate(&self) -> Result<(), String> {
        if self.age_min > self.age_max {
            return Err(format!(
                "age_min ({}) must not exceed age_max ({})",
                self.age_min, self.age_max
            ));
        }
        if self.age_max > MAX_AGE {
            return Err(format!("age_max must be at most {}", MAX_AGE));
        }
        Ok(())
    }

    /// "Females", "Males", or "members" when no gender is selected.
    pub fn audience(&self) -> String {
        if self.gender.is_empty() {
            "members".to_string()
        } else {
            format!("{}s", self.gender)
        }
    }

    pub fn region_label(&self) -> &str {
        if self.region.is_empty() {
            "all regions"
        } else {
            &self.region
        }
    }

    pub fn visit_label(&self) -> &str {
        if self.visit_type.is_empty() {
            "all"
        } else {
            &self.visit_type
        }
    }
}

impl fmt::Display for FilterParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ages {}-{}, gender {}, region {}, visit type {}",
            self.age_min,
            self.age_max,
            or_any(&self.gender),
            or_any(&self.region),
            or_any(&self.visit_type)
        )
    }
}

fn or_any(value: &str) -> &str {
    if value.is_empty() {
        "any"
    } else {
        value
    }
}

/// Summary cost statistics computed by the warehouse.
///
/// No ordering between the fields is enforced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiResult {
    pub avg_cost: f64,
    pub median_cost: f64,
    pub min_cost: f64,
    pub max_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance_coverage_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_burden_ratio: Option<f64>,
}

impl KpiResult {
    /// The result reported when no rows match the filters.
    pub fn zeroed() -> Self {
        Self::default()
    }

    /// True when either extreme is exactly zero, which usually means the
    /// filters matched nothing.
    pub fn has_zero_extremes(&self) -> bool {
        self.min_cost == 0.0 || self.max_cost == 0.0
    }
}

/// Output of the grouped visit statistics query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InsightOutput {
    NoMatch {
        message: String,
    },
    Found {
        avg_cost: f64,
        min_cost: f64,
        max_cost: f64,
        visit_count: u64,
        insight: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenefitsSummary {
    pub summary: String,
    pub coverage: String,
    pub copay: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiExplanation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    pub explanation: String,
}

/// Output stored under one task (or pipeline step) name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskOutput {
    Kpi(KpiResult),
    Insight(InsightOutput),
    Benefits(BenefitsSummary),
    Anomaly(AnomalyReport),
    Explanation(KpiExplanation),
    Narrative(String),
    Error { error: String },
}

impl TaskOutput {
    pub fn error(message: impl Into<String>) -> Self {
        TaskOutput::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TaskOutput::Error { .. })
    }

    pub fn as_kpi(&self) -> Option<&KpiResult> {
        match self {
            TaskOutput::Kpi(kpi) => Some(kpi),
            _ => None,
        }
    }

    /// Flatten into ordered `key: value` pairs for display and export.
    pub fn display_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut push = |k: &str, v: String| pairs.push((k.to_string(), v));

        match self {
            TaskOutput::Kpi(kpi) => {
                push("avg_cost", money(kpi.avg_cost));
                push("median_cost", money(kpi.median_cost));
                push("min_cost", money(kpi.min_cost));
                push("max_cost", money(kpi.max_cost));
                if let Some(sd) = kpi.std_dev {
                    push("std_dev", money(sd));
                }
                if let Some(n) = kpi.sample_size {
                    push("sample_size", n.to_string());
                }
                if let Some(r) = kpi.insurance_coverage_ratio {
                    push("insurance_coverage_ratio", ratio(r));
                }
                if let Some(r) = kpi.member_burden_ratio {
                    push("member_burden_ratio", ratio(r));
                }
            }
            TaskOutput::Insight(InsightOutput::NoMatch { message }) => {
                push("message", message.clone());
            }
            TaskOutput::Insight(InsightOutput::Found {
                avg_cost,
                min_cost,
                max_cost,
                visit_count,
                insight,
            }) => {
                push("avg_cost", money(*avg_cost));
                push("min_cost", money(*min_cost));
                push("max_cost", money(*max_cost));
                push("visit_count", visit_count.to_string());
                push("insight", insight.clone());
            }
            TaskOutput::Benefits(b) => {
                push("summary", b.summary.clone());
                push("coverage", b.coverage.clone());
                push("copay", b.copay.clone());
            }
            TaskOutput::Anomaly(a) => {
                if !a.flags.is_empty() {
                    push("flags", a.flags.join(", "));
                }
                push("message", a.message.clone());
            }
            TaskOutput::Explanation(e) => {
                if let Some(ref flag) = e.flag {
                    push("flag", flag.clone());
                }
                push("explanation", e.explanation.clone());
            }
            TaskOutput::Narrative(text) => push("summary", text.clone()),
            TaskOutput::Error { error } => push("error", error.clone()),
        }

        pairs
    }
}

fn money(v: f64) -> String {
    format!("{:.2}", v)
}

fn ratio(v: f64) -> String {
    format!("{:.4}", v)
}

/// Insertion-ordered mapping from task (or step) name to its output.
///
/// Serializes as a JSON object in execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskResults {
    entries: Vec<(String, TaskOutput)>,
}

impl TaskResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an output. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, output: TaskOutput) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = output,
            None => self.entries.push((key, output)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&TaskOutput> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskOutput)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the entries whose keys are listed, in accumulation order.
    pub fn subset<S: AsRef<str>>(&self, keys: &[S]) -> TaskResults {
        TaskResults {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| keys.iter().any(|wanted| wanted.as_ref() == k))
                .cloned()
                .collect(),
        }
    }

    /// The KPI stored under `estimate_cost`, or else the first KPI present.
    pub fn kpi(&self) -> Option<&KpiResult> {
        self.get("estimate_cost")
            .and_then(TaskOutput::as_kpi)
            .or_else(|| self.entries.iter().find_map(|(_, v)| v.as_kpi()))
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|(_, v)| v.is_error()).count()
    }
}

impl Serialize for TaskResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Metadata about a run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub filters: FilterParams,
    pub tasks: Vec<String>,
    pub model_used: String,
    pub duration_seconds: f64,
}

/// A complete run: metadata plus the results mapping.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub results: TaskResults,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_aliases() {
        let filters: FilterParams = serde_json::from_str(
            r#"{"min_age": 30, "max_age": 40, "gender": "Male", "state": "West"}"#,
        )
        .unwrap();
        assert_eq!(filters.age_min, 30);
        assert_eq!(filters.age_max, 40);
        assert_eq!(filters.region, "West");
        assert_eq!(filters.visit_type, "");
    }

    #[test]
    fn test_filter_validation() {
        let mut filters = FilterParams::default();
        assert!(filters.validate().is_ok());

        filters.age_min = 50;
        filters.age_max = 40;
        assert!(filters.validate().is_err());

        filters.age_min = 0;
        filters.age_max = 121;
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_zeroed_kpi_serializes_four_fields() {
        let json = serde_json::to_value(KpiResult::zeroed()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(obj["avg_cost"], 0.0);
        assert!(KpiResult::zeroed().has_zero_extremes());
    }

    #[test]
    fn test_results_preserve_insertion_order() {
        let mut results = TaskResults::new();
        results.insert("zeta", TaskOutput::Narrative("z".to_string()));
        results.insert("alpha", TaskOutput::error("boom"));
        results.insert("zeta", TaskOutput::Narrative("z2".to_string()));

        let keys: Vec<_> = results.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);

        let json = serde_json::to_string(&results).unwrap();
        assert_eq!(json, r#"{"zeta":"z2","alpha":{"error":"boom"}}"#);
        assert_eq!(results.error_count(), 1);
    }

    #[test]
    fn test_kpi_lookup_prefers_estimate_cost() {
        let mut results = TaskResults::new();
        let mut other = KpiResult::zeroed();
        other.avg_cost = 1.0;
        let mut primary = KpiResult::zeroed();
        primary.avg_cost = 2.0;
        results.insert("cost_a", TaskOutput::Kpi(other));
        results.insert("estimate_cost", TaskOutput::Kpi(primary));

        assert_eq!(results.kpi().map(|k| k.avg_cost), Some(2.0));
        assert_eq!(
            results.subset(&["cost_a"]).kpi().map(|k| k.avg_cost),
            Some(1.0)
        );
    }

    #[test]
    fn test_display_pairs_for_kpi() {
        let kpi = KpiResult {
            avg_cost: 1234.5,
            median_cost: 1000.0,
            min_cost: 100.0,
            max_cost: 4999.99,
            std_dev: None,
            sample_size: Some(42),
            insurance_coverage_ratio: Some(0.8),
            member_burden_ratio: None,
        };
        let pairs = TaskOutput::Kpi(kpi).display_pairs();
        assert_eq!(pairs[0], ("avg_cost".to_string(), "1234.50".to_string()));
        assert!(pairs.iter().any(|(k, v)| k == "sample_size" && v == "42"));
        assert!(!pairs.iter().any(|(k, _)| k == "std_dev"));
    }
}
