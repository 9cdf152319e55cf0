//! Core data models for the sizing collector
//!
//! Two families live here: the documents returned by the management API
//! (projects, clusters, processes, disks, measurements) and the report
//! records assembled from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// List envelope used by every collection endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_default")]
    pub results: Vec<T>,
}

/// Project (API "group") within an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A running database process (one node of a cluster)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub id: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub user_alias: Option<String>,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Process {
    pub const PRIMARY_TYPE: &'static str = "REPLICA_PRIMARY";

    pub fn is_primary(&self) -> bool {
        self.type_name.as_deref() == Some(Self::PRIMARY_TYPE)
    }
}

/// Disk partition attached to a process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    #[serde(default)]
    pub partition_name: Option<String>,
}

/// A single sample of a measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

impl DataPoint {
    pub fn new(timestamp: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            timestamp: Some(timestamp.into()),
            value,
        }
    }
}

/// Named time series of one observed metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub name: String,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data_points: Vec<DataPoint>,
}

/// Body of both measurement endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeasurementsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub measurements: Vec<Measurement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionStrings {
    #[serde(default)]
    pub standard: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub instance_size_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplicationSpec {
    #[serde(rename = "regionsConfig", default, deserialize_with = "null_as_default")]
    pub regions_config: Map<String, Value>,
}

/// Cluster description as returned by the clusters endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub cluster_type: Option<String>,
    #[serde(rename = "mongoDBVersion", default)]
    pub mongodb_version: Option<String>,
    #[serde(default)]
    pub state_name: Option<String>,
    #[serde(default)]
    pub create_date: Option<String>,
    #[serde(default)]
    pub update_date: Option<String>,
    #[serde(rename = "diskSizeGB", default)]
    pub disk_size_gb: Option<f64>,
    #[serde(rename = "mongoURI", default)]
    pub mongo_uri: Option<String>,
    #[serde(default)]
    pub connection_strings: Option<ConnectionStrings>,
    #[serde(default)]
    pub provider_settings: Option<ProviderSettings>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub replication_specs: Vec<ReplicationSpec>,
}

/// Node spec groups consulted, in order, when resolving the instance size
const NODE_SPEC_GROUPS: [&str; 3] = ["electableSpecs", "readOnlySpecs", "analyticsSpecs"];

impl Cluster {
    /// Connection string naming the cluster's hosts
    pub fn connection_descriptor(&self) -> Option<&str> {
        self.mongo_uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .or_else(|| {
                self.connection_strings
                    .as_ref()
                    .and_then(|c| c.standard.as_deref())
            })
    }

    pub fn provider(&self) -> Option<String> {
        self.provider_settings
            .as_ref()
            .and_then(|p| p.provider_name.clone())
            .filter(|name| !name.is_empty())
    }

    /// Region from provider settings, else the first configured region
    pub fn region(&self) -> Option<String> {
        self.provider_settings
            .as_ref()
            .and_then(|p| p.region_name.clone())
            .filter(|name| !name.is_empty())
            .or_else(|| {
                self.first_regions_config()
                    .and_then(|config| config.keys().next().cloned())
            })
    }

    /// Instance size name from provider settings, else from replication specs
    pub fn tier(&self) -> Option<String> {
        self.provider_settings
            .as_ref()
            .and_then(|p| p.instance_size_name.clone())
            .filter(|name| !name.is_empty())
            .or_else(|| self.tier_from_replication_specs())
    }

    fn first_regions_config(&self) -> Option<&Map<String, Value>> {
        self.replication_specs
            .first()
            .map(|spec| &spec.regions_config)
            .filter(|config| !config.is_empty())
    }

    fn tier_from_replication_specs(&self) -> Option<String> {
        let region = self.first_regions_config()?.values().next()?;
        NODE_SPEC_GROUPS.iter().find_map(|group| {
            let spec = match region.get(*group)? {
                Value::Array(items) => items.first()?,
                other @ Value::Object(_) => other,
                _ => return None,
            };
            spec.get("instanceSize")?
                .as_str()
                .filter(|size| !size.is_empty())
                .map(str::to_string)
        })
    }
}

/// Per-cluster row of the run report
///
/// Field order is the documented column order of the tabular output.
/// Usage flags are either `Some(true)` or `None`, never `Some(false)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub cluster_name: String,
    pub cluster_id: Option<String>,
    pub cluster_type: Option<String>,
    pub mongodb_version: Option<String>,
    pub state: Option<String>,
    pub provider: Option<String>,
    pub region: Option<String>,
    pub tier: Option<String>,
    pub disk_size_gb: Option<f64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,

    pub cpu_max_percent: Option<f64>,
    pub cpu_avg_percent: Option<f64>,
    pub cpu_tier_limit: Option<f64>,
    pub cpu_lower_tier_limit: Option<f64>,
    pub memory_max_gb: Option<f64>,
    pub memory_avg_gb: Option<f64>,
    pub memory_tier_limit_gb: Option<f64>,
    pub memory_lower_tier_limit_gb: Option<f64>,
    pub iops_max: Option<f64>,
    pub iops_avg: Option<f64>,
    pub iops_tier_limit: Option<f64>,
    pub iops_lower_tier_limit: Option<f64>,
    pub connections_max: Option<f64>,
    pub connections_avg: Option<f64>,
    pub connections_tier_limit: Option<f64>,
    pub connections_lower_tier_limit: Option<f64>,
    pub read_ops_max: Option<f64>,
    pub read_ops_avg: Option<f64>,
    pub write_ops_max: Option<f64>,
    pub write_ops_avg: Option<f64>,
    pub disk_usage_max_gb: Option<f64>,
    pub disk_available_max_gb: Option<f64>,
    pub disk_tier_limit_gb: Option<f64>,

    pub lower_tier: Option<String>,
    pub low_cpu_use: Option<bool>,
    pub low_memory_use: Option<bool>,
    pub low_iops_use: Option<bool>,
    pub low_connections_use: Option<bool>,
    pub low_disk_use: Option<bool>,
    pub cpu_lower_tier_acceptable_use: Option<bool>,
    pub memory_lower_tier_acceptable_use: Option<bool>,
    pub iops_lower_tier_acceptable_use: Option<bool>,
    pub connections_lower_tier_acceptable_use: Option<bool>,
    pub disk_lower_tier_acceptable_use: Option<bool>,
}

impl ClusterRecord {
    /// Identity and configuration fields; every metric starts absent
    pub fn from_cluster(cluster: &Cluster) -> Self {
        Self {
            cluster_name: cluster.name.clone(),
            cluster_id: cluster.id.clone(),
            cluster_type: cluster.cluster_type.clone(),
            mongodb_version: cluster.mongodb_version.clone(),
            state: cluster.state_name.clone(),
            provider: cluster.provider(),
            region: cluster.region(),
            tier: cluster.tier(),
            disk_size_gb: cluster.disk_size_gb,
            created_at: cluster.create_date.clone(),
            updated_at: cluster.update_date.clone(),
            ..Default::default()
        }
    }

    /// Flags raised for this cluster, by field name
    pub fn raised_flags(&self) -> Vec<&'static str> {
        [
            ("low_cpu_use", self.low_cpu_use),
            ("low_memory_use", self.low_memory_use),
            ("low_iops_use", self.low_iops_use),
            ("low_connections_use", self.low_connections_use),
            ("low_disk_use", self.low_disk_use),
            ("cpu_lower_tier_acceptable_use", self.cpu_lower_tier_acceptable_use),
            ("memory_lower_tier_acceptable_use", self.memory_lower_tier_acceptable_use),
            ("iops_lower_tier_acceptable_use", self.iops_lower_tier_acceptable_use),
            (
                "connections_lower_tier_acceptable_use",
                self.connections_lower_tier_acceptable_use,
            ),
            ("disk_lower_tier_acceptable_use", self.disk_lower_tier_acceptable_use),
        ]
        .into_iter()
        .filter(|(_, flag)| *flag == Some(true))
        .map(|(name, _)| name)
        .collect()
    }
}

/// All clusters collected for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project_id: String,
    pub project_name: String,
    pub clusters: Vec<ClusterRecord>,
}

/// The persisted artifact of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub organization_id: Option<String>,
    pub collection_timestamp: DateTime<Utc>,
    pub projects: Vec<ProjectRecord>,
}

impl RunReport {
    pub fn cluster_count(&self) -> usize {
        self.projects.iter().map(|p| p.clusters.len()).sum()
    }
}
