//! Usage evaluation against tier capacity
//!
//! Flags clusters whose sustained utilization is low relative to their
//! tier (over-provisioned) and checks whether the same load would still
//! fit one tier down. Every flag is `Some(true)` or `None`; absence covers
//! both "not low enough" and "no data".

use crate::error::ConfigError;
use crate::models::ClusterRecord;
use crate::tiers::TierSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default percentage below which usage counts as low
pub const DEFAULT_LOW_USAGE_PERCENT: f64 = 33.0;

/// Default percentage of the lower tier's capacity that still leaves headroom
pub const DEFAULT_LOWER_TIER_ACCEPTABLE_PERCENT: f64 = 60.0;

/// Resource dimensions that carry usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Memory,
    Iops,
    Connections,
    Disk,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Cpu,
        MetricKind::Memory,
        MetricKind::Iops,
        MetricKind::Connections,
        MetricKind::Disk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::Iops => "iops",
            MetricKind::Connections => "connections",
            MetricKind::Disk => "disk",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(MetricKind::Cpu),
            "memory" | "ram" => Ok(MetricKind::Memory),
            "iops" => Ok(MetricKind::Iops),
            "connections" | "connection" => Ok(MetricKind::Connections),
            "disk" => Ok(MetricKind::Disk),
            other => Err(format!("unknown metric kind '{}'", other)),
        }
    }
}

/// Percentages applied to one metric kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub low_usage_percent: f64,
    pub lower_tier_acceptable_percent: f64,
}

impl Default for Threshold {
    fn default() -> Self {
        Self {
            low_usage_percent: DEFAULT_LOW_USAGE_PERCENT,
            lower_tier_acceptable_percent: DEFAULT_LOWER_TIER_ACCEPTABLE_PERCENT,
        }
    }
}

/// Thresholds for every metric kind
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageThresholds {
    pub cpu: Threshold,
    pub memory: Threshold,
    pub iops: Threshold,
    pub connections: Threshold,
    pub disk: Threshold,
}

/// Row of the thresholds CSV (`metric,low_usage,lower_tier`)
#[derive(Debug, Deserialize)]
struct ThresholdRow {
    metric: String,
    low_usage: f64,
    lower_tier: f64,
}

impl UsageThresholds {
    /// Same threshold for every kind
    pub fn uniform(threshold: Threshold) -> Self {
        Self {
            cpu: threshold,
            memory: threshold,
            iops: threshold,
            connections: threshold,
            disk: threshold,
        }
    }

    pub fn get(&self, kind: MetricKind) -> Threshold {
        match kind {
            MetricKind::Cpu => self.cpu,
            MetricKind::Memory => self.memory,
            MetricKind::Iops => self.iops,
            MetricKind::Connections => self.connections,
            MetricKind::Disk => self.disk,
        }
    }

    pub fn set(&mut self, kind: MetricKind, threshold: Threshold) {
        match kind {
            MetricKind::Cpu => self.cpu = threshold,
            MetricKind::Memory => self.memory = threshold,
            MetricKind::Iops => self.iops = threshold,
            MetricKind::Connections => self.connections = threshold,
            MetricKind::Disk => self.disk = threshold,
        }
    }

    /// Override `defaults` with the rows of a thresholds CSV.
    ///
    /// Kinds missing from the file keep their default.
    pub fn from_reader<R: std::io::Read>(reader: R, defaults: Self) -> Result<Self, ConfigError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut thresholds = defaults;

        for row in rdr.deserialize::<ThresholdRow>() {
            let row = row?;
            match row.metric.parse::<MetricKind>() {
                Ok(kind) => thresholds.set(
                    kind,
                    Threshold {
                        low_usage_percent: row.low_usage,
                        lower_tier_acceptable_percent: row.lower_tier,
                    },
                ),
                Err(reason) => {
                    tracing::warn!(event = "config_row_ignored", %reason, "Ignoring threshold row");
                }
            }
        }

        Ok(thresholds)
    }

    pub fn load(path: &Path, defaults: Self) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, defaults)
    }

    /// Load from `path` when given, falling back to `defaults`
    pub fn load_or_defaults(path: Option<&Path>, defaults: Self) -> Self {
        let Some(path) = path else {
            return defaults;
        };
        Self::load(path, defaults).unwrap_or_else(|e| {
            tracing::warn!(
                event = "config_fallback",
                path = %path.display(),
                error = %e,
                "Could not load thresholds file, using defaults"
            );
            defaults
        })
    }
}

/// Observed utilization of one cluster, in the units of the tier table
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObservedUsage {
    /// Average CPU, percent of all cores
    pub cpu_avg_percent: Option<f64>,
    pub memory_avg_gb: Option<f64>,
    pub iops_avg: Option<f64>,
    pub connections_avg: Option<f64>,
    pub disk_max_gb: Option<f64>,
    pub disk_size_gb: Option<f64>,
}

impl ObservedUsage {
    pub fn from_record(record: &ClusterRecord) -> Self {
        Self {
            cpu_avg_percent: record.cpu_avg_percent,
            memory_avg_gb: record.memory_avg_gb,
            iops_avg: record.iops_avg,
            connections_avg: record.connections_avg,
            disk_max_gb: record.disk_usage_max_gb,
            disk_size_gb: record.disk_size_gb,
        }
    }
}

/// Outcome for one metric kind
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KindAssessment {
    pub usage_percent: Option<f64>,
    pub tier_limit: Option<f64>,
    pub lower_tier_limit: Option<f64>,
    pub low_use: Option<bool>,
    pub lower_tier_acceptable: Option<bool>,
}

/// Outcome for every metric kind of a cluster
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageAssessment {
    pub lower_tier: Option<String>,
    pub cpu: KindAssessment,
    pub memory: KindAssessment,
    pub iops: KindAssessment,
    pub connections: KindAssessment,
    pub disk: KindAssessment,
}

impl UsageAssessment {
    pub fn get(&self, kind: MetricKind) -> &KindAssessment {
        match kind {
            MetricKind::Cpu => &self.cpu,
            MetricKind::Memory => &self.memory,
            MetricKind::Iops => &self.iops,
            MetricKind::Connections => &self.connections,
            MetricKind::Disk => &self.disk,
        }
    }

    /// Copy limits and flags onto a report record
    pub fn apply_to(&self, record: &mut ClusterRecord) {
        record.lower_tier = self.lower_tier.clone();

        record.cpu_tier_limit = self.cpu.tier_limit;
        record.cpu_lower_tier_limit = self.cpu.lower_tier_limit;
        record.low_cpu_use = self.cpu.low_use;
        record.cpu_lower_tier_acceptable_use = self.cpu.lower_tier_acceptable;

        record.memory_tier_limit_gb = self.memory.tier_limit;
        record.memory_lower_tier_limit_gb = self.memory.lower_tier_limit;
        record.low_memory_use = self.memory.low_use;
        record.memory_lower_tier_acceptable_use = self.memory.lower_tier_acceptable;

        record.iops_tier_limit = self.iops.tier_limit;
        record.iops_lower_tier_limit = self.iops.lower_tier_limit;
        record.low_iops_use = self.iops.low_use;
        record.iops_lower_tier_acceptable_use = self.iops.lower_tier_acceptable;

        record.connections_tier_limit = self.connections.tier_limit;
        record.connections_lower_tier_limit = self.connections.lower_tier_limit;
        record.low_connections_use = self.connections.low_use;
        record.connections_lower_tier_acceptable_use = self.connections.lower_tier_acceptable;

        record.disk_tier_limit_gb = self.disk.tier_limit;
        record.low_disk_use = self.disk.low_use;
        record.disk_lower_tier_acceptable_use = self.disk.lower_tier_acceptable;
    }
}

/// Pure evaluator of observed usage against tier capacity
#[derive(Debug, Clone)]
pub struct UsageEvaluator {
    thresholds: UsageThresholds,
}

impl UsageEvaluator {
    pub fn new(thresholds: UsageThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate every metric kind.
    ///
    /// Kinds without an observed value, or whose capacity is not positive,
    /// are left entirely absent. Disk is judged against the cluster's
    /// provisioned size and never has a lower-tier verdict.
    pub fn evaluate(
        &self,
        observed: &ObservedUsage,
        tier: &TierSpec,
        lower: Option<&TierSpec>,
    ) -> UsageAssessment {
        // CPU is observed as a percentage of the current tier's cores;
        // convert to cores so it compares against any tier.
        let cpu_cores_used = observed
            .cpu_avg_percent
            .map(|pct| pct / 100.0 * tier.cpu_cores);

        UsageAssessment {
            lower_tier: lower.map(|l| l.name.clone()),
            cpu: self.assess(
                MetricKind::Cpu,
                cpu_cores_used,
                tier.cpu_cores,
                lower.map(|l| l.cpu_cores),
            ),
            memory: self.assess(
                MetricKind::Memory,
                observed.memory_avg_gb,
                tier.ram_gb,
                lower.map(|l| l.ram_gb),
            ),
            iops: self.assess(
                MetricKind::Iops,
                observed.iops_avg,
                tier.max_iops,
                lower.map(|l| l.max_iops),
            ),
            connections: self.assess(
                MetricKind::Connections,
                observed.connections_avg,
                tier.max_connections,
                lower.map(|l| l.max_connections),
            ),
            disk: match observed.disk_size_gb {
                Some(size) => self.assess(MetricKind::Disk, observed.disk_max_gb, size, None),
                None => KindAssessment::default(),
            },
        }
    }

    fn assess(
        &self,
        kind: MetricKind,
        used: Option<f64>,
        capacity: f64,
        lower_capacity: Option<f64>,
    ) -> KindAssessment {
        let Some(used) = used else {
            return KindAssessment::default();
        };
        if capacity <= 0.0 {
            return KindAssessment::default();
        }

        let threshold = self.thresholds.get(kind);
        let usage_percent = used / capacity * 100.0;

        let lower_tier_acceptable = lower_capacity
            .filter(|cap| *cap > 0.0)
            .map(|cap| used / cap * 100.0)
            .and_then(|pct| flag(pct < threshold.lower_tier_acceptable_percent));

        KindAssessment {
            usage_percent: Some(usage_percent),
            tier_limit: Some(capacity),
            lower_tier_limit: lower_capacity,
            low_use: flag(usage_percent < threshold.low_usage_percent),
            lower_tier_acceptable,
        }
    }
}

fn flag(condition: bool) -> Option<bool> {
    condition.then_some(true)
}
