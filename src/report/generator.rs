//! Markdown and JSON report generation.
//!
//! Both formats walk the results mapping in execution order and use the
//! same `key: value` pairs as the PDF export.

use crate::models::{Report, ReportMetadata, TaskOutput, TaskResults};
use anyhow::Result;

/// Heading shared by every export format.
pub const REPORT_TITLE: &str = "DataSage Healthcare Cost Report";

/// `estimate_cost` -> `Estimate Cost`.
pub fn section_title(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, include_metadata: bool) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", REPORT_TITLE));

    if include_metadata {
        output.push_str(&generate_metadata_section(&report.metadata));
    }

    output.push_str(&generate_results_section(&report.results));

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Run Details\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Filters:** {}\n", metadata.filters));
    section.push_str(&format!("- **Tasks:** {}\n", metadata.tasks.join(", ")));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// One `##` section per task, in execution order.
fn generate_results_section(results: &TaskResults) -> String {
    if results.is_empty() {
        return "No tasks were run.\n\n".to_string();
    }

    let mut section = String::new();
    for (key, output) in results.iter() {
        section.push_str(&generate_task_block(key, output));
    }
    section
}

fn generate_task_block(key: &str, output: &TaskOutput) -> String {
    let mut block = format!("## {}\n\n", section_title(key));

    match output {
        TaskOutput::Narrative(text) => {
            block.push_str(text);
            block.push_str("\n\n");
        }
        TaskOutput::Error { error } => {
            block.push_str(&format!("> **Error:** {}\n\n", error));
        }
        other => {
            for (k, v) in other.display_pairs() {
                block.push_str(&format!("- **{}:** {}\n", k, v));
            }
            block.push('\n');
        }
    }

    block
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by DataSage*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report, include_metadata: bool) -> Result<String> {
    if include_metadata {
        serde_json::to_string_pretty(report).map_err(Into::into)
    } else {
        serde_json::to_string_pretty(&report.results).map_err(Into::into)
    }
}
