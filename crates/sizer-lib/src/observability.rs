//! Structured logging for collection runs
//!
//! Every significant step of a run is emitted as a `tracing` event with an
//! `event` field and the identifiers needed to correlate it, so the output
//! stays machine-readable under a JSON subscriber.

use crate::error::ClientError;
use tracing::{debug, info, warn};

/// Structured logger for run events
#[derive(Debug, Clone)]
pub struct RunLogger {
    scope: String,
}

impl RunLogger {
    /// `scope` identifies the run (organization or project id)
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    /// Log run start
    pub fn log_run_started(&self, tiers: usize, window: Option<String>) {
        info!(
            event = "run_started",
            scope = %self.scope,
            tiers = tiers,
            time_window = ?window,
            "Starting metadata collection"
        );
    }

    /// Log project discovery
    pub fn log_projects_found(&self, count: usize) {
        info!(
            event = "projects_found",
            scope = %self.scope,
            count = count,
            "Found projects"
        );
    }

    /// Log the start of a project
    pub fn log_project_started(&self, project_id: &str, project_name: &str, clusters: usize) {
        info!(
            event = "project_started",
            scope = %self.scope,
            project_id = %project_id,
            project_name = %project_name,
            clusters = clusters,
            "Processing project"
        );
    }

    /// Log which process stands in for a cluster
    pub fn log_process_selected(
        &self,
        cluster: &str,
        process_id: &str,
        hostname: Option<&str>,
        type_name: Option<&str>,
    ) {
        info!(
            event = "process_selected",
            scope = %self.scope,
            cluster = %cluster,
            process_id = %process_id,
            hostname = ?hostname,
            type_name = type_name.unwrap_or("UNKNOWN"),
            "Using process for cluster metrics"
        );
    }

    /// Log a cluster whose project has no processes to measure
    pub fn log_no_process(&self, cluster: &str) {
        info!(
            event = "no_process",
            scope = %self.scope,
            cluster = %cluster,
            "No processes in project, metrics unavailable"
        );
    }

    /// Log an optional fetch that failed and was replaced by an empty result
    pub fn log_fetch_degraded(&self, cluster: &str, what: &str, error: &ClientError) {
        warn!(
            event = "fetch_degraded",
            scope = %self.scope,
            cluster = %cluster,
            what = %what,
            error = %error,
            status = ?error.status().map(|s| s.as_u16()),
            "Optional fetch failed, continuing without it"
        );
    }

    /// Log an optional fetch that returned nothing
    pub fn log_fetch_empty(&self, cluster: &str, what: &str) {
        debug!(
            event = "fetch_empty",
            scope = %self.scope,
            cluster = %cluster,
            what = %what,
            "No data returned"
        );
    }

    /// Log a tier that is missing from the tier table
    pub fn log_tier_unknown(&self, cluster: &str, tier: Option<&str>) {
        warn!(
            event = "tier_unknown",
            scope = %self.scope,
            cluster = %cluster,
            tier = tier.unwrap_or(""),
            "Tier not in tier table, skipping usage evaluation"
        );
    }

    /// Log a finished cluster
    pub fn log_cluster_collected(&self, cluster: &str, tier: Option<&str>, flags: &[&str]) {
        info!(
            event = "cluster_collected",
            scope = %self.scope,
            cluster = %cluster,
            tier = tier.unwrap_or(""),
            flags = %flags.join(","),
            "Collected cluster metadata"
        );
    }

    /// Log a cluster dropped from the report
    pub fn log_cluster_skipped(&self, project_id: &str, cluster: &str, reason: &str) {
        warn!(
            event = "cluster_skipped",
            scope = %self.scope,
            project_id = %project_id,
            cluster = %cluster,
            reason = %reason,
            "Error collecting metadata for cluster"
        );
    }

    /// Log run completion
    pub fn log_run_completed(&self, projects: usize, clusters: usize) {
        info!(
            event = "run_completed",
            scope = %self.scope,
            projects = projects,
            clusters = clusters,
            "Metadata collection complete"
        );
    }
}
