//! Cluster sizing library for managed database deployments
//!
//! This crate provides the core functionality for:
//! - Fetching clusters, processes and measurements from the management API
//! - Reducing measurement time series to max/avg statistics
//! - Matching clusters to their primary process
//! - Evaluating utilization against a tier capacity table
//! - Serializing the run report as JSON or CSV

pub mod client;
pub mod collector;
pub mod error;
pub mod evaluator;
pub mod matcher;
pub mod models;
pub mod observability;
pub mod reducer;
pub mod report;
pub mod tiers;

pub use client::{AtlasClient, ClientConfig, Credentials, Fetch, ResourceClient, SampleSpan};
pub use collector::{CollectionSettings, Collector};
pub use error::{ClientError, CollectError, ConfigError, ReportError};
pub use evaluator::{
    MetricKind, ObservedUsage, Threshold, UsageAssessment, UsageEvaluator, UsageThresholds,
};
pub use matcher::select_primary_process;
pub use models::*;
pub use observability::RunLogger;
pub use reducer::{reduce_single, reduce_summed, StatSummary, TimeWindow};
pub use report::{
    read_csv_report, write_report, write_report_file, ColumnKind, CsvClusterRow, ReportFormat,
    CSV_COLUMNS,
};
pub use tiers::{TierSpec, TierTable};
