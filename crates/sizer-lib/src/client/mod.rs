//! Management API access
//!
//! `ResourceClient` is the seam between the collector and the network.
//! Calls the run cannot proceed without (projects, clusters) return a
//! `Result`; optional calls (processes, measurements, disks) return a
//! `Fetch`, so a failed optional call degrades to "no data" without the
//! collector having to reason about errors.

mod atlas;

pub use atlas::{AtlasClient, ClientConfig, Credentials};

use crate::error::ClientError;
use crate::models::{Disk, Measurement, Process, Project};
use async_trait::async_trait;
use serde_json::Value;

/// Outcome of an optional fetch
#[derive(Debug)]
pub enum Fetch<T> {
    /// The call succeeded and returned data
    Data(T),
    /// The call succeeded (or the resource does not exist) with nothing in it
    Empty,
    /// The call failed; the caller carries on without the data
    Failed(ClientError),
}

impl<T> Fetch<Vec<T>> {
    /// `Empty` for an empty list, `Data` otherwise
    pub fn from_items(items: Vec<T>) -> Self {
        if items.is_empty() {
            Fetch::Empty
        } else {
            Fetch::Data(items)
        }
    }

    pub fn from_result(result: Result<Vec<T>, ClientError>) -> Self {
        match result {
            Ok(items) => Self::from_items(items),
            Err(e) => Fetch::Failed(e),
        }
    }
}

/// Sampling interval and lookback window for measurement requests
/// (ISO-8601 durations, e.g. `PT1M` over `P2D`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSpan {
    pub granularity: String,
    pub period: String,
}

impl Default for SampleSpan {
    fn default() -> Self {
        Self {
            granularity: "PT1M".to_string(),
            period: "P2D".to_string(),
        }
    }
}

/// Read access to the management API
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// List the projects of an organization
    async fn list_projects(&self, org_id: &str) -> Result<Vec<Project>, ClientError>;

    /// Fetch a single project
    async fn get_project(&self, project_id: &str) -> Result<Project, ClientError>;

    /// List cluster documents of a project.
    ///
    /// Entries stay untyped so one malformed cluster can be skipped
    /// without losing the others.
    async fn list_clusters(&self, project_id: &str) -> Result<Vec<Value>, ClientError>;

    /// List the running processes of a project
    async fn list_processes(&self, project_id: &str) -> Fetch<Vec<Process>>;

    /// Fetch one measurement group of a process
    async fn get_process_measurements(
        &self,
        project_id: &str,
        process_id: &str,
        measurement_type: &str,
        span: &SampleSpan,
    ) -> Fetch<Vec<Measurement>>;

    /// List the disk partitions of a process
    async fn list_disks(&self, project_id: &str, process_id: &str) -> Fetch<Vec<Disk>>;

    /// Fetch measurements of one disk partition
    async fn get_disk_measurements(
        &self,
        project_id: &str,
        process_id: &str,
        partition_name: &str,
        metric_types: &[&str],
        span: &SampleSpan,
    ) -> Fetch<Vec<Measurement>>;
}
