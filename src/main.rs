//! Leadflow - CRM lead dashboard from the command line
//!
//! # Usage
//!
//! ```bash
//! # Metric cards for the current month from a JSON snapshot
//! leadflow --data leads.json summary
//!
//! # Hot leads from LinkedIn, any date
//! leadflow --data leads.json list --all-time --qualification Hot --origin LinkedIn
//!
//! # Copy a snapshot into the sled store, then qualify two leads
//! leadflow --config leadflow.toml import --data leads.json
//! leadflow --config leadflow.toml qualify --ids 1,2 --status Hot
//! ```
//!
//! # Environment Variables
//!
//! - `LEADFLOW_CONFIG`: Path to the TOML config (default: ./leadflow.toml)
//! - `LEADFLOW_DATA`: JSON lead snapshot seeding the in-memory store
//! - `RUST_LOG`: Logging level (default: info)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use tracing::{info, warn};

use leadflow::analytics::Metric;
use leadflow::config::StoreBackend;
use leadflow::display::{format_phone, initials};
use leadflow::{
    DashboardConfig, DashboardSession, DateRange, FilterCriteria, InMemoryLeadStore, Lead,
    LeadId, LeadStore, MutationOutcome, Origin, QualificationStatus, Selection, SessionSettings,
    SledLeadStore,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "leadflow")]
#[command(about = "CRM lead analytics and real-time synchronization")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config file (overrides LEADFLOW_CONFIG / ./leadflow.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON array of leads. Seeds the in-memory store; read by `import`.
    #[arg(long, global = true, env = "LEADFLOW_DATA")]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Metric cards with deltas against the previous period
    Summary {
        #[command(flatten)]
        filters: FilterArgs,
        /// Print the full dashboard view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Lead table under the given filters
    List {
        #[command(flatten)]
        filters: FilterArgs,
        /// Maximum rows to print
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Set the qualification of several leads at once
    Qualify {
        /// Comma-separated lead ids
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<LeadId>,
        /// New status (English or Portuguese name)
        #[arg(long)]
        status: QualificationStatus,
    },

    /// Copy the `--data` snapshot into the sled store
    Import,
}

#[derive(clap::Args, Debug, Clone, Default)]
struct FilterArgs {
    /// First day of the period (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day of the period (defaults to --from)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,
    /// No date restriction
    #[arg(long, conflicts_with_all = ["from", "to"])]
    all_time: bool,
    /// `all` or a qualification status
    #[arg(long)]
    qualification: Option<Selection<QualificationStatus>>,
    /// `all` or an origin label
    #[arg(long)]
    origin: Option<Selection<Origin>>,
    /// Case-insensitive name search (table only)
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    /// Apply command-line overrides on top of the configured defaults.
    fn apply(self, mut criteria: FilterCriteria) -> FilterCriteria {
        if self.all_time {
            criteria.range = DateRange::all_time();
        } else if let Some(from) = self.from {
            criteria.range = DateRange { from: Some(from), to: self.to };
        }
        if let Some(qualification) = self.qualification {
            criteria.qualification = qualification;
        }
        if let Some(origin) = self.origin {
            criteria.origin = origin;
        }
        if let Some(search) = self.search {
            criteria.search = search;
        }
        criteria
    }
}

// ============================================================================
// Store setup
// ============================================================================

fn read_snapshot(path: &Path) -> Result<Vec<Lead>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading lead snapshot {}", path.display()))?;
    let leads: Vec<Lead> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing lead snapshot {}", path.display()))?;
    info!(path = %path.display(), count = leads.len(), "Read lead snapshot");
    Ok(leads)
}

fn open_store(config: &DashboardConfig, data: Option<&Path>) -> Result<Arc<dyn LeadStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            let leads = match data {
                Some(path) => read_snapshot(path)?,
                None => {
                    warn!("No --data snapshot given, in-memory store starts empty");
                    Vec::new()
                }
            };
            Ok(Arc::new(InMemoryLeadStore::with_leads(leads)))
        }
        StoreBackend::Sled => {
            let path = config
                .store
                .path
                .as_deref()
                .context("store.path must be set for the sled backend")?;
            if data.is_some() {
                warn!("--data is only read by `import` when using the sled backend");
            }
            Ok(Arc::new(SledLeadStore::open(path)?))
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn print_summary(session: &DashboardSession) {
    let view = session.view();
    println!("Período: {}", view.criteria.range);
    for metric in Metric::ALL {
        let card = view.metrics.get(metric);
        let (current, delta) = card.map_or((0, "0.0"), |c| (c.current, c.delta.as_str()));
        println!("  {:<22} {:>6}  ({delta}%)", metric.title(), current);
    }
    println!(
        "  {:<22} {:>12.2}  ({}%)",
        "Valor em pipeline", view.metrics.pipeline_value.current, view.metrics.pipeline_value.delta
    );
    println!(
        "  {:<22} {:>11}%  (anterior {}%)",
        "Taxa de conversão", view.metrics.conversion_rate, view.metrics.previous_conversion_rate
    );
}

fn print_table(session: &DashboardSession, limit: Option<usize>) {
    let rows = session.table();
    let shown = limit.unwrap_or(rows.len()).min(rows.len());
    for row in &rows[..shown] {
        let lead = &row.lead;
        println!(
            "{:>6}  {}  {:<3} {:<28} {:<22} {:<16} {}",
            lead.id.to_string(),
            lead.created_at.format("%Y-%m-%d"),
            initials(lead.name.as_deref()),
            lead.name.as_deref().unwrap_or("-"),
            format_phone(lead.phone.as_deref()),
            row.origin.label(),
            lead.qualification_status.label(),
        );
    }
    println!("{shown} de {} lead(s)", rows.len());
}

fn run_import(config: &DashboardConfig, data: Option<&Path>) -> Result<()> {
    if config.store.backend != StoreBackend::Sled {
        bail!("import requires store.backend = \"sled\"");
    }
    let data = data.context("import needs --data <json>")?;
    let path = config
        .store
        .path
        .as_deref()
        .context("store.path must be set for the sled backend")?;

    let leads = read_snapshot(data)?;
    let store = SledLeadStore::open(path)?;
    let written = store.import(&leads)?;
    println!("Importados {written} lead(s); total no banco: {}", store.count());
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => DashboardConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DashboardConfig::load(),
    };
    config.validate()?;

    if matches!(args.command, SubCommand::Import) {
        return run_import(&config, args.data.as_deref());
    }

    let store = open_store(&config, args.data.as_deref())?;
    let base_criteria = config.default_criteria(Utc::now().date_naive());

    let criteria = match &args.command {
        SubCommand::Summary { filters, .. } | SubCommand::List { filters, .. } => {
            filters.clone().apply(base_criteria)
        }
        _ => base_criteria,
    };
    let settings = SessionSettings {
        criteria,
        notice_capacity: config.session.notice_capacity,
    };
    let session = DashboardSession::start(store, settings)
        .await
        .context("loading leads")?;

    let result = match args.command {
        SubCommand::Summary { json: true, .. } => {
            println!("{}", serde_json::to_string_pretty(&session.view())?);
            Ok(())
        }
        SubCommand::Summary { .. } => {
            print_summary(&session);
            Ok(())
        }
        SubCommand::List { limit, .. } => {
            print_table(&session, limit);
            Ok(())
        }
        SubCommand::Qualify { ids, status } => {
            if config.store.backend == StoreBackend::Memory {
                warn!("In-memory store: the change is not persisted");
            }
            match session.bulk_update(&ids, Some(status)).await {
                Ok(MutationOutcome::Applied { changed }) => {
                    println!("{} lead(s) marcados como {} ({changed} alterados)", ids.len(), status.label());
                    Ok(())
                }
                Ok(MutationOutcome::Ignored) => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
        SubCommand::Import => Ok(()),
    };

    session.shutdown().await;
    result
}
