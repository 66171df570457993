//! Server-rendered HTML for the dashboard pages.

use crate::models::{
    FilterParams, InsightOutput, KpiResult, TaskOutput, TaskResults, GENDERS, REGIONS, VISIT_TYPES,
};
use crate::report::{section_title, REPORT_TITLE};

const STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; margin: 0; color: #222; }
header { background: #1f3b57; color: #fff; padding: 16px 24px; }
header p { margin: 4px 0 0; color: #c9d6e3; }
main { display: flex; gap: 24px; padding: 24px; }
aside { min-width: 260px; }
section { margin-bottom: 24px; }
label { display: block; margin-top: 12px; font-weight: 600; }
.cards { display: flex; gap: 16px; flex-wrap: wrap; }
.card { border: 1px solid #ddd; border-radius: 6px; padding: 12px 16px; min-width: 140px; }
.card .label { color: #666; font-size: 0.85em; }
.card .value { font-size: 1.5em; font-weight: 600; }
.info { background: #e8f1fb; border-left: 4px solid #2b7bd1; padding: 8px 12px; margin: 6px 0; }
.success { background: #eaf7ee; border-left: 4px solid #2e9d4f; padding: 8px 12px; }
.warning { background: #fff5e0; border-left: 4px solid #e09a1a; padding: 8px 12px; }
.error { background: #fdecea; border-left: 4px solid #d23c2f; padding: 8px 12px; margin: 6px 0; }
pre { white-space: pre-wrap; }
"#;

const KPI_GLOSSARY: [(&str, &str); 4] = [
    ("Avg Cost", "Mean of all costs"),
    ("Median", "Midpoint in cost distribution"),
    ("Min/Max", "Extremes in the data"),
    ("Coverage / burden ratio", "Average insurer or member share of the average cost"),
];

/// Escape text for HTML element content and quoted attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `$1,234.56`
pub fn format_currency(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <header><h1>DataSage Multi-Agent System</h1>\
         <p>Explore healthcare cost estimates and benefit summaries with AI agents.</p></header>\n\
         {body}\n</body>\n</html>\n",
        title = escape_html(title),
    )
}

fn select(name: &str, label: &str, options: &[&str], selected: &str) -> String {
    let mut html = format!(
        "<label for=\"{name}\">{label}</label>\n<select id=\"{name}\" name=\"{name}\">\n\
         <option value=\"\">Any</option>\n"
    );
    for option in options {
        let mark = if option.eq_ignore_ascii_case(selected) {
            " selected"
        } else {
            ""
        };
        html.push_str(&format!(
            "<option value=\"{v}\"{mark}>{v}</option>\n",
            v = escape_html(option)
        ));
    }
    html.push_str("</select>\n");
    html
}

fn slider(name: &str, label: &str, value: u32) -> String {
    format!(
        "<label for=\"{name}\">{label}: <output id=\"{name}_out\">{value}</output></label>\n\
         <input type=\"range\" id=\"{name}\" name=\"{name}\" min=\"18\" max=\"100\" value=\"{value}\" \
         oninput=\"document.getElementById('{name}_out').value = this.value\">\n"
    )
}

/// Sidebar form that submits to `/run`.
fn filter_form(
    filters: &FilterParams,
    tasks: &[(&'static str, &'static str)],
    selected: &[String],
) -> String {
    let mut html = String::from("<aside>\n<form method=\"get\" action=\"/run\">\n<h2>Member Profile</h2>\n");
    html.push_str(&slider("age_min", "Min Age", filters.age_min.clamp(18, 100)));
    html.push_str(&slider("age_max", "Max Age", filters.age_max.clamp(18, 100)));
    html.push_str(&select("gender", "Gender", &GENDERS, &filters.gender));
    html.push_str(&select("visit_type", "Visit Type", &VISIT_TYPES, &filters.visit_type));
    html.push_str(&select("region", "Region", &REGIONS, &filters.region));

    html.push_str(&format!(
        "<h2>Agent Tasks</h2>\n<select name=\"tasks\" multiple size=\"{}\">\n",
        tasks.len()
    ));
    for (name, description) in tasks {
        let mark = if selected.iter().any(|s| s == name) {
            " selected"
        } else {
            ""
        };
        html.push_str(&format!(
            "<option value=\"{name}\" title=\"{}\"{mark}>{name}</option>\n",
            escape_html(description)
        ));
    }
    html.push_str("</select>\n<p><button type=\"submit\">Run Agents</button></p>\n</form>\n</aside>\n");
    html
}

/// Landing page with the filter form.
pub fn index_page(tasks: &[(&'static str, &'static str)], default_tasks: &[String]) -> String {
    let filters = FilterParams {
        age_min: 30,
        age_max: 40,
        ..FilterParams::default()
    };
    let body = format!(
        "<main>\n{}<div><p>Choose a member profile and the agent tasks to run.</p></div>\n</main>",
        filter_form(&filters, tasks, default_tasks)
    );
    layout("DataSage", &body)
}

/// Semicircular gauge of the average cost on `[0, max]`, with a marker at the median.
pub fn gauge_svg(kpi: &KpiResult) -> String {
    let range = if kpi.max_cost > 0.0 { kpi.max_cost } else { 5000.0 };
    let fraction = |v: f64| (v / range).clamp(0.0, 1.0);
    let point = |f: f64, r: f64| {
        let angle = std::f64::consts::PI * (1.0 - f);
        (100.0 + r * angle.cos(), 100.0 - r * angle.sin())
    };

    let (ax, ay) = point(fraction(kpi.avg_cost), 80.0);
    let (mx1, my1) = point(fraction(kpi.median_cost), 68.0);
    let (mx2, my2) = point(fraction(kpi.median_cost), 92.0);
    let delta = kpi.avg_cost - kpi.median_cost;
    let delta_sign = if delta >= 0.0 { "+" } else { "-" };

    format!(
        "<svg class=\"gauge\" viewBox=\"0 0 200 130\" width=\"320\" role=\"img\" \
         aria-label=\"Average cost compared with median\">\n\
         <path d=\"M 20 100 A 80 80 0 0 1 180 100\" fill=\"none\" stroke=\"#e5e5e5\" stroke-width=\"14\"/>\n\
         <path d=\"M 20 100 A 80 80 0 0 1 {ax:.2} {ay:.2}\" fill=\"none\" stroke=\"green\" stroke-width=\"14\"/>\n\
         <line x1=\"{mx1:.2}\" y1=\"{my1:.2}\" x2=\"{mx2:.2}\" y2=\"{my2:.2}\" stroke=\"#333\" stroke-width=\"2\"/>\n\
         <text x=\"100\" y=\"92\" text-anchor=\"middle\" font-size=\"16\">{avg}</text>\n\
         <text x=\"100\" y=\"112\" text-anchor=\"middle\" font-size=\"10\">{delta_sign}{delta} vs median</text>\n\
         <text x=\"20\" y=\"125\" text-anchor=\"middle\" font-size=\"8\">0</text>\n\
         <text x=\"180\" y=\"125\" text-anchor=\"middle\" font-size=\"8\">{max}</text>\n\
         </svg>\n",
        avg = format_currency(kpi.avg_cost),
        delta = format_currency(delta.abs()),
        max = format_currency(range),
    )
}

fn metric_cards(kpi: &KpiResult) -> String {
    let mut cards = vec![
        ("Avg Cost", format_currency(kpi.avg_cost)),
        ("Median Cost", format_currency(kpi.median_cost)),
        ("Min Cost", format_currency(kpi.min_cost)),
        ("Max Cost", format_currency(kpi.max_cost)),
    ];
    if let Some(n) = kpi.sample_size {
        cards.push(("Visits", n.to_string()));
    }

    let mut html = String::from("<div class=\"cards\">\n");
    for (label, value) in cards {
        html.push_str(&format!(
            "<div class=\"card\"><div class=\"label\">{label}</div><div class=\"value\">{value}</div></div>\n"
        ));
    }
    html.push_str("</div>\n");
    html
}

fn glossary() -> String {
    let mut html = String::from("<details>\n<summary>What these KPIs mean</summary>\n<ul>\n");
    for (term, meaning) in KPI_GLOSSARY {
        html.push_str(&format!("<li><strong>{term}</strong>: {meaning}</li>\n"));
    }
    html.push_str("</ul>\n</details>\n");
    html
}

/// One section per result, in execution order.
fn result_section(key: &str, output: &TaskOutput) -> String {
    let mut html = format!("<section>\n<h2>{}</h2>\n", escape_html(&section_title(key)));

    match output {
        TaskOutput::Kpi(kpi) => {
            html.push_str("<h3>Key Cost Metrics</h3>\n");
            html.push_str(&metric_cards(kpi));
            html.push_str(&glossary());
            html.push_str("<h3>Cost Distribution</h3>\n");
            html.push_str(&gauge_svg(kpi));
        }
        TaskOutput::Benefits(benefits) => {
            html.push_str(&format!(
                "<div class=\"info\">{}</div>\n<div class=\"info\">Coverage: {}</div>\n\
                 <div class=\"info\">Copay: {}</div>\n",
                escape_html(&benefits.summary),
                escape_html(&benefits.coverage),
                escape_html(&benefits.copay)
            ));
        }
        TaskOutput::Anomaly(report) => {
            let class = if report.flags.is_empty() {
                "success"
            } else {
                "warning"
            };
            html.push_str(&format!(
                "<div class=\"{class}\">{}</div>\n",
                escape_html(&report.message)
            ));
        }
        TaskOutput::Insight(InsightOutput::NoMatch { message }) => {
            html.push_str(&format!("<p>{}</p>\n", escape_html(message)));
        }
        TaskOutput::Insight(InsightOutput::Found { insight, .. }) => {
            html.push_str(&format!("<p>{}</p>\n", escape_html(insight)));
        }
        TaskOutput::Explanation(explanation) => {
            let class = if explanation.flag.is_some() {
                "warning"
            } else {
                "info"
            };
            html.push_str(&format!(
                "<div class=\"{class}\"><pre>{}</pre></div>\n",
                escape_html(&explanation.explanation)
            ));
        }
        TaskOutput::Narrative(text) => {
            html.push_str(&format!("<pre>{}</pre>\n", escape_html(text)));
        }
        TaskOutput::Error { error } => {
            html.push_str(&format!(
                "<div class=\"error\">Error: {}</div>\n",
                escape_html(error)
            ));
        }
    }

    html.push_str("</section>\n");
    html
}

/// Results page: the form again, then every result and a PDF link.
pub fn results_page(
    filters: &FilterParams,
    results: &TaskResults,
    tasks: &[(&'static str, &'static str)],
    run_id: &str,
) -> String {
    let selected: Vec<String> = results.keys().map(String::from).collect();

    let mut content = format!(
        "<div>\n<p>Results for {}.</p>\n",
        escape_html(&filters.to_string())
    );
    if results.is_empty() {
        content.push_str("<p>No tasks were run.</p>\n");
    }
    for (key, output) in results.iter() {
        content.push_str(&result_section(key, output));
    }

    let href = format!("/report.pdf?run={}", run_id);
    content.push_str(&format!(
        "<section>\n<h2>Export Report</h2>\n<a href=\"{}\" download=\"datasage_report.pdf\">\
         Download PDF Report</a>\n</section>\n</div>\n",
        escape_html(&href)
    ));

    let body = format!(
        "<main>\n{}{}</main>",
        filter_form(filters, tasks, &selected),
        content
    );
    layout(REPORT_TITLE, &body)
}

pub fn error_page(status: &str, message: &str) -> String {
    let body = format!(
        "<main>\n<div>\n<h2>{}</h2>\n<div class=\"error\">{}</div>\n<p><a href=\"/\">Back</a></p>\n</div>\n</main>",
        escape_html(status),
        escape_html(message)
    );
    layout("DataSage", &body)
}
