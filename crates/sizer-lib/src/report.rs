//! Run report serialization
//!
//! A report is written either as one JSON document or as a CSV table with
//! one row per cluster. The CSV column order is fixed by `CSV_COLUMNS`:
//! the owning project followed by every `ClusterRecord` field in
//! declaration order. Absent values are empty cells.

use crate::error::ReportError;
use crate::models::{ClusterRecord, RunReport};
use serde_json::{Map, Number, Value};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Serialization of a run report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Single JSON document
    Json,
    /// One CSV row per cluster
    Csv,
}

/// How a CSV cell maps back to a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Always present text
    Text,
    /// Text that may be absent
    OptionalText,
    Number,
    Flag,
}

/// CSV columns, in output order
pub const CSV_COLUMNS: &[(&str, ColumnKind)] = &[
    ("project_name", ColumnKind::Text),
    ("project_id", ColumnKind::Text),
    ("cluster_name", ColumnKind::Text),
    ("cluster_id", ColumnKind::OptionalText),
    ("cluster_type", ColumnKind::OptionalText),
    ("mongodb_version", ColumnKind::OptionalText),
    ("state", ColumnKind::OptionalText),
    ("provider", ColumnKind::OptionalText),
    ("region", ColumnKind::OptionalText),
    ("tier", ColumnKind::OptionalText),
    ("disk_size_gb", ColumnKind::Number),
    ("created_at", ColumnKind::OptionalText),
    ("updated_at", ColumnKind::OptionalText),
    ("cpu_max_percent", ColumnKind::Number),
    ("cpu_avg_percent", ColumnKind::Number),
    ("cpu_tier_limit", ColumnKind::Number),
    ("cpu_lower_tier_limit", ColumnKind::Number),
    ("memory_max_gb", ColumnKind::Number),
    ("memory_avg_gb", ColumnKind::Number),
    ("memory_tier_limit_gb", ColumnKind::Number),
    ("memory_lower_tier_limit_gb", ColumnKind::Number),
    ("iops_max", ColumnKind::Number),
    ("iops_avg", ColumnKind::Number),
    ("iops_tier_limit", ColumnKind::Number),
    ("iops_lower_tier_limit", ColumnKind::Number),
    ("connections_max", ColumnKind::Number),
    ("connections_avg", ColumnKind::Number),
    ("connections_tier_limit", ColumnKind::Number),
    ("connections_lower_tier_limit", ColumnKind::Number),
    ("read_ops_max", ColumnKind::Number),
    ("read_ops_avg", ColumnKind::Number),
    ("write_ops_max", ColumnKind::Number),
    ("write_ops_avg", ColumnKind::Number),
    ("disk_usage_max_gb", ColumnKind::Number),
    ("disk_available_max_gb", ColumnKind::Number),
    ("disk_tier_limit_gb", ColumnKind::Number),
    ("lower_tier", ColumnKind::OptionalText),
    ("low_cpu_use", ColumnKind::Flag),
    ("low_memory_use", ColumnKind::Flag),
    ("low_iops_use", ColumnKind::Flag),
    ("low_connections_use", ColumnKind::Flag),
    ("low_disk_use", ColumnKind::Flag),
    ("cpu_lower_tier_acceptable_use", ColumnKind::Flag),
    ("memory_lower_tier_acceptable_use", ColumnKind::Flag),
    ("iops_lower_tier_acceptable_use", ColumnKind::Flag),
    ("connections_lower_tier_acceptable_use", ColumnKind::Flag),
    ("disk_lower_tier_acceptable_use", ColumnKind::Flag),
];

const PROJECT_NAME: &str = "project_name";
const PROJECT_ID: &str = "project_id";

/// A cluster row read back from a CSV report
#[derive(Debug, Clone, PartialEq)]
pub struct CsvClusterRow {
    pub project_name: String,
    pub project_id: String,
    pub cluster: ClusterRecord,
}

/// Serialize `report` to `writer`.
///
/// `pretty` indents JSON output and has no effect on CSV.
pub fn write_report<W: Write>(
    report: &RunReport,
    format: ReportFormat,
    pretty: bool,
    writer: W,
) -> Result<(), ReportError> {
    match format {
        ReportFormat::Json if pretty => serde_json::to_writer_pretty(writer, report)?,
        ReportFormat::Json => serde_json::to_writer(writer, report)?,
        ReportFormat::Csv => write_csv(report, writer)?,
    }
    Ok(())
}

/// Serialize `report` to a new file at `path`, replacing any existing one
pub fn write_report_file(
    path: &Path,
    report: &RunReport,
    format: ReportFormat,
    pretty: bool,
) -> Result<(), ReportError> {
    let file_error = |source| ReportError::File {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(file_error)?;
    let mut writer = BufWriter::new(file);
    write_report(report, format, pretty, &mut writer)?;
    writer.flush().map_err(file_error)?;
    Ok(())
}

fn write_csv<W: Write>(report: &RunReport, writer: W) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_COLUMNS.iter().map(|(name, _)| *name))?;

    for project in &report.projects {
        for cluster in &project.clusters {
            let fields = serde_json::to_value(cluster)?;
            let row = CSV_COLUMNS.iter().map(|(name, _)| match *name {
                PROJECT_NAME => project.project_name.clone(),
                PROJECT_ID => project.project_id.clone(),
                field => cell(fields.get(field)),
            });
            wtr.write_record(row)?;
        }
    }

    wtr.flush()?;
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Parse a CSV report back into cluster rows
pub fn read_csv_report<R: Read>(reader: R) -> Result<Vec<CsvClusterRow>, ReportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();

    let kinds = headers
        .iter()
        .map(|header| {
            column_kind(header).ok_or_else(|| ReportError::UnknownColumn(header.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let mut project_name = String::new();
        let mut project_id = String::new();
        let mut fields = Map::new();

        for ((header, kind), raw) in headers.iter().zip(&kinds).zip(record.iter()) {
            match header {
                PROJECT_NAME => project_name = raw.to_string(),
                PROJECT_ID => project_id = raw.to_string(),
                _ => {
                    fields.insert(header.to_string(), parse_cell(header, *kind, raw)?);
                }
            }
        }

        rows.push(CsvClusterRow {
            project_name,
            project_id,
            cluster: serde_json::from_value(Value::Object(fields))?,
        });
    }

    Ok(rows)
}

fn column_kind(name: &str) -> Option<ColumnKind> {
    CSV_COLUMNS
        .iter()
        .find(|(column, _)| *column == name)
        .map(|(_, kind)| *kind)
}

fn parse_cell(column: &str, kind: ColumnKind, raw: &str) -> Result<Value, ReportError> {
    let invalid = || ReportError::InvalidCell {
        column: column.to_string(),
        value: raw.to_string(),
    };

    if raw.is_empty() {
        return Ok(match kind {
            ColumnKind::Text => Value::String(String::new()),
            _ => Value::Null,
        });
    }

    match kind {
        ColumnKind::Text | ColumnKind::OptionalText => Ok(Value::String(raw.to_string())),
        ColumnKind::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        ColumnKind::Flag => raw.parse::<bool>().map(Value::Bool).map_err(|_| invalid()),
    }
}
