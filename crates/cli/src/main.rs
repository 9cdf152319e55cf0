//! Atlas sizing collector CLI
//!
//! Collects cluster configuration and utilization for an organization (or
//! a single project), flags over-provisioned clusters against a tier table
//! and writes the result as JSON or CSV.

mod config;
mod output;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::AppConfig;
use sizer_lib::{
    AtlasClient, CollectionSettings, Collector, Credentials, RunLogger, TierTable, TimeWindow,
    UsageEvaluator, UsageThresholds,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Atlas sizing collector
#[derive(Parser)]
#[command(name = "atlas-sizer")]
#[command(author, version, about = "Collect MongoDB Atlas cluster metadata and sizing signals", long_about = None)]
pub struct Cli {
    /// Organization to collect (all of its projects)
    #[arg(long, env = "ATLAS_ORG_ID")]
    pub org_id: Option<String>,

    /// Collect a single project instead of a whole organization
    #[arg(long, env = "ATLAS_PROJECT_ID")]
    pub project_id: Option<String>,

    /// API public key
    #[arg(long, env = "ATLAS_PUBLIC_KEY", hide_env_values = true)]
    pub public_key: Option<String>,

    /// API private key
    #[arg(long, env = "ATLAS_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Report path; a .csv extension writes CSV, anything else JSON
    #[arg(long, short, default_value = "atlas_metadata.json")]
    pub output: PathBuf,

    /// Indent JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Start of the time-of-day window (HH:MM, UTC)
    #[arg(long, requires = "window_end")]
    pub window_start: Option<String>,

    /// End of the time-of-day window (HH:MM, UTC)
    #[arg(long, requires = "window_start")]
    pub window_end: Option<String>,

    /// Tier capacity table (CSV)
    #[arg(long)]
    pub tiers_file: Option<PathBuf>,

    /// Usage thresholds table (CSV)
    #[arg(long)]
    pub thresholds_file: Option<PathBuf>,

    /// Measurement granularity (e.g. PT1M)
    #[arg(long)]
    pub granularity: Option<String>,

    /// Measurement lookback period (e.g. P2D)
    #[arg(long)]
    pub period: Option<String>,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

/// What a run covers
enum Scope {
    Organization(String),
    Project(String),
}

impl Cli {
    /// Both API keys, or an error naming the missing one
    fn credentials(&self) -> Result<Credentials> {
        let public_key = non_empty(&self.public_key)
            .context("Missing API public key: pass --public-key or set ATLAS_PUBLIC_KEY")?;
        let private_key = non_empty(&self.private_key)
            .context("Missing API private key: pass --private-key or set ATLAS_PRIVATE_KEY")?;
        Ok(Credentials::new(public_key, private_key))
    }

    fn scope(&self) -> Result<Scope> {
        if let Some(project_id) = non_empty(&self.project_id) {
            return Ok(Scope::Project(project_id.to_string()));
        }
        match non_empty(&self.org_id) {
            Some(org_id) => Ok(Scope::Organization(org_id.to_string())),
            None => bail!(
                "Missing organization: pass --org-id (ATLAS_ORG_ID) or --project-id (ATLAS_PROJECT_ID)"
            ),
        }
    }

    fn window(&self) -> Result<Option<TimeWindow>> {
        match (&self.window_start, &self.window_end) {
            (Some(start), Some(end)) => TimeWindow::parse(start, end)
                .map(Some)
                .context("Invalid time window"),
            _ => Ok(None),
        }
    }

    /// Apply flag overrides on top of file and environment settings
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(path) = &self.tiers_file {
            config.tiers_file = Some(path.clone());
        }
        if let Some(path) = &self.thresholds_file {
            config.thresholds_file = Some(path.clone());
        }
        if let Some(granularity) = &self.granularity {
            config.granularity = granularity.clone();
        }
        if let Some(period) = &self.period {
            config.period = period.clone();
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("info,sizer_lib=debug,atlas_sizer=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    let credentials = cli.credentials()?;
    let scope = cli.scope()?;
    let window = cli.window()?;
    let format = output::format_for_path(&cli.output);

    let tiers = TierTable::load_or_builtin(config.tiers_file.as_deref());
    let thresholds =
        UsageThresholds::load_or_defaults(config.thresholds_file.as_deref(), UsageThresholds::default());

    let client = AtlasClient::new(credentials, config.client_config())
        .context("Failed to create API client")?;

    let scope_id = match &scope {
        Scope::Organization(id) | Scope::Project(id) => id.clone(),
    };
    let collector = Collector::new(
        Arc::new(client),
        tiers,
        UsageEvaluator::new(thresholds),
        CollectionSettings {
            span: config.sample_span(),
            window,
        },
        RunLogger::new(scope_id),
    );

    let report = match &scope {
        Scope::Organization(org_id) => collector.collect_organization(org_id).await,
        Scope::Project(project_id) => collector.collect_project(project_id).await,
    }
    .context("Metadata collection failed")?;

    sizer_lib::write_report_file(&cli.output, &report, format, cli.pretty)
        .with_context(|| format!("Failed to write report to {}", cli.output.display()))?;
    info!(path = %cli.output.display(), format = ?format, "Report written");

    output::print_summary(&report);
    output::print_success(&format!(
        "Collected {} clusters from {} projects into {}",
        report.cluster_count(),
        report.projects.len(),
        cli.output.display()
    ));

    Ok(())
}
