//! Output formatting utilities

use colored::Colorize;
use sizer_lib::{ClusterRecord, ReportFormat, RunReport};
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

/// Report format implied by the output file extension.
///
/// `.csv` selects CSV; anything else is JSON.
pub fn format_for_path(path: &Path) -> ReportFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => ReportFormat::Csv,
        _ => ReportFormat::Json,
    }
}

/// One line of the console summary
#[derive(Debug, Tabled)]
pub struct ClusterRow {
    #[tabled(rename = "Project")]
    pub project: String,
    #[tabled(rename = "Cluster")]
    pub cluster: String,
    #[tabled(rename = "Tier")]
    pub tier: String,
    #[tabled(rename = "Lower")]
    pub lower_tier: String,
    #[tabled(rename = "CPU %")]
    pub cpu: String,
    #[tabled(rename = "Memory GB")]
    pub memory: String,
    #[tabled(rename = "IOPS")]
    pub iops: String,
    #[tabled(rename = "Connections")]
    pub connections: String,
    #[tabled(rename = "Flags")]
    pub flags: String,
}

impl ClusterRow {
    pub fn new(project: &str, record: &ClusterRecord) -> Self {
        Self {
            project: project.to_string(),
            cluster: record.cluster_name.clone(),
            tier: text(record.tier.as_deref()),
            lower_tier: text(record.lower_tier.as_deref()),
            cpu: number(record.cpu_avg_percent),
            memory: number(record.memory_avg_gb),
            iops: number(record.iops_avg),
            connections: number(record.connections_avg),
            flags: record.raised_flags().join(" "),
        }
    }
}

/// Rows of the console summary, in report order
pub fn summary_rows(report: &RunReport) -> Vec<ClusterRow> {
    report
        .projects
        .iter()
        .flat_map(|project| {
            project
                .clusters
                .iter()
                .map(|record| ClusterRow::new(&project.project_name, record))
        })
        .collect()
}

/// Print the per-cluster summary table
pub fn print_summary(report: &RunReport) {
    let rows = summary_rows(report);
    if rows.is_empty() {
        print_warning("No clusters found");
        return;
    }

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);

    let flagged = report
        .projects
        .iter()
        .flat_map(|p| &p.clusters)
        .filter(|c| !c.raised_flags().is_empty())
        .count();
    if flagged > 0 {
        print_info(&format!(
            "{} of {} clusters show low utilization signals",
            flagged,
            report.cluster_count()
        ));
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn number(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}
