//! Collection run orchestration
//!
//! Walks projects, then clusters, then metric categories, one call at a
//! time. Required calls (project and cluster listings) abort the run;
//! everything below a cluster degrades to absent fields. A cluster whose
//! document cannot be read is skipped without affecting the others.


use crate::client::{Fetch, ResourceClient, SampleSpan};
use crate::error::{ClientError, CollectError};
use crate::evaluator::{ObservedUsage, UsageEvaluator};
use crate::matcher::select_primary_process;
use crate::models::{
    Cluster, ClusterRecord, Measurement, Process, Project, ProjectRecord, RunReport,
};
use crate::observability::RunLogger;
use crate::reducer::{reduce_single, reduce_summed, round2, StatSummary, TimeWindow};
use crate::tiers::TierTable;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Per-mode CPU series; only their sum describes total utilization
const CPU_SERIES: &[&str] = &[
    "SYSTEM_NORMALIZED_CPU_GUEST",
    "SYSTEM_NORMALIZED_CPU_IOWAIT",
    "SYSTEM_NORMALIZED_CPU_IRQ",
    "SYSTEM_NORMALIZED_CPU_KERNEL",
    "SYSTEM_NORMALIZED_CPU_NICE",
    "SYSTEM_NORMALIZED_CPU_SOFTIRQ",
    "SYSTEM_NORMALIZED_CPU_STEAL",
    "SYSTEM_NORMALIZED_CPU_USER",
];

const READ_OP_SERIES: &[&str] = &["OPCOUNTER_CMD", "OPCOUNTER_GETMORE", "OPCOUNTER_QUERY"];

const WRITE_OP_SERIES: &[&str] = &[
    "OPCOUNTER_DELETE",
    "OPCOUNTER_TTL_DELETED",
    "OPCOUNTER_INSERT",
    "OPCOUNTER_UPDATE",
];

const CPU_TYPE: &str = "CPU_USAGE";
const MEMORY_TYPE: &str = "MEMORY";
const MEMORY_USED: &str = "SYSTEM_MEMORY_USED";
const DISK_TYPE: &str = "DISK";
const DISK_STORAGE_TOTAL: &str = "DB_STORAGE_TOTAL";
const DATABASE_SIZE_TYPE: &str = "DATABASE_SIZE";
const DATA_SIZE_TOTAL: &str = "DB_DATA_SIZE_TOTAL";
const OPERATIONS_TYPE: &str = "DATABASE_OPERATIONS";
const CONNECTIONS: &str = "CONNECTIONS";
const PARTITION_IOPS: &str = "DISK_PARTITION_IOPS_TOTAL";

/// Memory is reported in KB
const KB_PER_GB: f64 = 1024.0 * 1024.0;
/// Storage is reported in bytes
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Sampling configuration of a run
#[derive(Debug, Clone, Default)]
pub struct CollectionSettings {
    /// Granularity and lookback requested for every measurement
    pub span: SampleSpan,
    /// Optional time-of-day filter applied to every sample
    pub window: Option<TimeWindow>,
}

/// Drives a single collection run
pub struct Collector {
    /// API access
    client: Arc<dyn ResourceClient>,
    /// Tier capacities, loaded once per run
    tiers: TierTable,
    /// Usage flags evaluator
    evaluator: UsageEvaluator,
    /// Sampling configuration
    settings: CollectionSettings,
    /// Structured run events
    logger: RunLogger,
}

impl Collector {
    /// Create a new collector
    pub fn new(
        client: Arc<dyn ResourceClient>,
        tiers: TierTable,
        evaluator: UsageEvaluator,
        settings: CollectionSettings,
        logger: RunLogger,
    ) -> Self {
        Self {
            client,
            tiers,
            evaluator,
            settings,
            logger,
        }
    }

    /// Collect every project of an organization
    pub async fn collect_organization(&self, org_id: &str) -> Result<RunReport, ClientError> {
        self.log_start();
        let collection_timestamp = Utc::now();

        let projects = self.client.list_projects(org_id).await?;
        self.logger.log_projects_found(projects.len());

        let projects = self.collect_projects(projects).await?;
        Ok(self.finish(Some(org_id.to_string()), collection_timestamp, projects))
    }

    /// Collect a single project
    pub async fn collect_project(&self, project_id: &str) -> Result<RunReport, ClientError> {
        self.log_start();
        let collection_timestamp = Utc::now();

        let project = self.client.get_project(project_id).await?;
        self.logger.log_projects_found(1);

        let projects = self.collect_projects(vec![project]).await?;
        Ok(self.finish(None, collection_timestamp, projects))
    }

    fn log_start(&self) {
        self.logger.log_run_started(
            self.tiers.len(),
            self.settings.window.map(|w| w.to_string()),
        );
    }

    fn finish(
        &self,
        organization_id: Option<String>,
        collection_timestamp: chrono::DateTime<Utc>,
        projects: Vec<ProjectRecord>,
    ) -> RunReport {
        let report = RunReport {
            organization_id,
            collection_timestamp,
            projects,
        };
        self.logger
            .log_run_completed(report.projects.len(), report.cluster_count());
        report
    }

    async fn collect_projects(
        &self,
        projects: Vec<Project>,
    ) -> Result<Vec<ProjectRecord>, ClientError> {
        let mut records = Vec::with_capacity(projects.len());
        for project in projects {
            records.push(self.collect_project_record(project).await?);
        }
        Ok(records)
    }

    async fn collect_project_record(&self, project: Project) -> Result<ProjectRecord, ClientError> {
        let project_name = project.name.clone().unwrap_or_else(|| project.id.clone());
        let documents = self.client.list_clusters(&project.id).await?;
        self.logger
            .log_project_started(&project.id, &project_name, documents.len());

        let processes = if documents.is_empty() {
            Vec::new()
        } else {
            let fetch = self.client.list_processes(&project.id).await;
            self.settle(&project_name, "processes", fetch)
                .unwrap_or_default()
        };

        let mut clusters = Vec::with_capacity(documents.len());
        for document in documents {
            let name = document_name(&document);
            match self.collect_cluster(&project.id, document, &processes).await {
                Ok(record) => clusters.push(record),
                Err(e) => self
                    .logger
                    .log_cluster_skipped(&project.id, &name, &e.to_string()),
            }
        }

        Ok(ProjectRecord {
            project_id: project.id,
            project_name,
            clusters,
        })
    }

    async fn collect_cluster(
        &self,
        project_id: &str,
        document: Value,
        processes: &[Process],
    ) -> Result<ClusterRecord, CollectError> {
        let cluster: Cluster = serde_json::from_value(document)?;
        let mut record = ClusterRecord::from_cluster(&cluster);

        match select_primary_process(&cluster.name, cluster.connection_descriptor(), processes) {
            Some(process) => {
                self.logger.log_process_selected(
                    &cluster.name,
                    &process.id,
                    process.hostname.as_deref(),
                    process.type_name.as_deref(),
                );
                self.collect_metrics(project_id, &cluster.name, &process.id, &mut record)
                    .await;
            }
            None => self.logger.log_no_process(&cluster.name),
        }

        if let (Some(size), Some(used)) = (record.disk_size_gb, record.disk_usage_max_gb) {
            record.disk_available_max_gb = Some(round2(size - used));
        }

        self.evaluate(&mut record);

        let flags = record.raised_flags();
        self.logger
            .log_cluster_collected(&record.cluster_name, record.tier.as_deref(), &flags);
        Ok(record)
    }

    async fn collect_metrics(
        &self,
        project_id: &str,
        cluster: &str,
        process_id: &str,
        record: &mut ClusterRecord,
    ) {
        let window = self.settings.window.as_ref();

        let cpu = self.measurements(project_id, cluster, process_id, CPU_TYPE).await;
        let cpu = reduce_summed(named(&cpu, CPU_SERIES), window);
        record.cpu_max_percent = cpu.max;
        record.cpu_avg_percent = cpu.avg;

        let memory = self.measurements(project_id, cluster, process_id, MEMORY_TYPE).await;
        let memory = reduce_named(&memory, MEMORY_USED, window).scaled(KB_PER_GB);
        record.memory_max_gb = memory.max;
        record.memory_avg_gb = memory.avg;

        let disk = self.disk_usage(project_id, cluster, process_id).await;
        record.disk_usage_max_gb = disk.max;

        let iops = self.partition_iops(project_id, cluster, process_id).await;
        record.iops_max = iops.max;
        record.iops_avg = iops.avg;

        let operations = self
            .measurements(project_id, cluster, process_id, OPERATIONS_TYPE)
            .await;
        let connections = reduce_named(&operations, CONNECTIONS, window);
        record.connections_max = connections.max;
        record.connections_avg = connections.avg;

        let reads = reduce_summed(named(&operations, READ_OP_SERIES), window);
        record.read_ops_max = reads.max;
        record.read_ops_avg = reads.avg;

        let writes = reduce_summed(named(&operations, WRITE_OP_SERIES), window);
        record.write_ops_max = writes.max;
        record.write_ops_avg = writes.avg;
    }

    /// Storage used, falling back to data size when storage is not reported
    async fn disk_usage(&self, project_id: &str, cluster: &str, process_id: &str) -> StatSummary {
        let window = self.settings.window.as_ref();

        let storage = self.measurements(project_id, cluster, process_id, DISK_TYPE).await;
        let summary = reduce_named(&storage, DISK_STORAGE_TOTAL, window);
        if !summary.is_empty() {
            return summary.scaled(BYTES_PER_GB);
        }

        let data = self
            .measurements(project_id, cluster, process_id, DATABASE_SIZE_TYPE)
            .await;
        reduce_named(&data, DATA_SIZE_TOTAL, window).scaled(BYTES_PER_GB)
    }

    /// IOPS of the first disk partition
    async fn partition_iops(&self, project_id: &str, cluster: &str, process_id: &str) -> StatSummary {
        let fetch = self.client.list_disks(project_id, process_id).await;
        let Some(partition) = self
            .settle(cluster, "disks", fetch)
            .and_then(|disks| disks.into_iter().find_map(|d| d.partition_name))
        else {
            return StatSummary::default();
        };

        let fetch = self
            .client
            .get_disk_measurements(
                project_id,
                process_id,
                &partition,
                &[PARTITION_IOPS],
                &self.settings.span,
            )
            .await;
        let measurements = self
            .settle(cluster, "disk measurements", fetch)
            .unwrap_or_default();
        reduce_named(&measurements, PARTITION_IOPS, self.settings.window.as_ref())
    }

    async fn measurements(
        &self,
        project_id: &str,
        cluster: &str,
        process_id: &str,
        measurement_type: &str,
    ) -> Vec<Measurement> {
        let fetch = self
            .client
            .get_process_measurements(project_id, process_id, measurement_type, &self.settings.span)
            .await;
        self.settle(cluster, measurement_type, fetch)
            .unwrap_or_default()
    }

    /// Log a degraded or empty fetch and keep whatever data it carried
    fn settle<T>(&self, cluster: &str, what: &str, fetch: Fetch<T>) -> Option<T> {
        match fetch {
            Fetch::Data(data) => Some(data),
            Fetch::Empty => {
                self.logger.log_fetch_empty(cluster, what);
                None
            }
            Fetch::Failed(e) => {
                self.logger.log_fetch_degraded(cluster, what, &e);
                None
            }
        }
    }

    fn evaluate(&self, record: &mut ClusterRecord) {
        let Some(tier) = record.tier.as_deref().and_then(|name| self.tiers.get(name)) else {
            self.logger
                .log_tier_unknown(&record.cluster_name, record.tier.as_deref());
            return;
        };
        let lower = self.tiers.find_lower_tier(&tier.name);

        let assessment = self
            .evaluator
            .evaluate(&ObservedUsage::from_record(record), tier, lower);
        assessment.apply_to(record);
    }
}

fn named<'a>(
    measurements: &'a [Measurement],
    names: &'static [&'static str],
) -> impl Iterator<Item = &'a Measurement> {
    measurements
        .iter()
        .filter(move |m| names.contains(&m.name.as_str()))
}

fn reduce_named(
    measurements: &[Measurement],
    name: &str,
    window: Option<&TimeWindow>,
) -> StatSummary {
    measurements
        .iter()
        .find(|m| m.name == name)
        .map(|m| reduce_single(m, window))
        .unwrap_or_default()
}

fn document_name(document: &Value) -> String {
    document
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string()
}
