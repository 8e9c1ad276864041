//! Sales agent commission and weekly bonus calculator
//!
//! Ingests monthly deposit exports into a cleaned master table, then computes
//! per-deposit commissions and weekly bonuses and writes the ledgers.

mod bonus;
mod commission;
mod config;
mod constants;
mod dataset;
mod normalizer;
mod records;
mod report;
mod reports;
mod sequence;
mod sources;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use bonus::{BonusCounts, BonusSchedule};
use config::{Config, FileConfig, Overrides};
use dataset::{Dataset, SharedDataset};
use store::Store;

#[derive(Parser, Debug)]
#[command(name = "agent-commissions")]
#[command(about = "Commission and weekly bonus calculation for sales agents")]
struct Args {
    /// Data directory for the master table (SQLite and CSV preview)
    #[arg(short, long, default_value = "./data", global = true)]
    data_dir: PathBuf,

    /// Output directory for generated reports
    #[arg(short, long, default_value = "./output", global = true)]
    output_dir: PathBuf,

    /// Config file (optional; defaults apply when missing)
    #[arg(short, long, default_value = constants::CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,

    /// Local currency units per USD for bonus conversion
    #[arg(long, global = true)]
    exchange_rate: Option<f64>,

    /// Weekly bonus schedule
    #[arg(long, value_enum, global = true)]
    bonus_schedule: Option<BonusSchedule>,

    /// Which deposits count toward the weekly bonus
    #[arg(long, value_enum, global = true)]
    bonus_counts: Option<BonusCounts>,

    /// First date to report (YYYY-MM-DD or DD/MM/YYYY, inclusive)
    #[arg(long, global = true)]
    start_date: Option<String>,

    /// Last date to report (YYYY-MM-DD or DD/MM/YYYY, inclusive)
    #[arg(long, global = true)]
    end_date: Option<String>,

    /// Only report this agent (repeatable)
    #[arg(long = "agent", global = true)]
    agents: Vec<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read source tables and replace the master table
    Ingest {
        /// Delimited source files (CSV or semicolon-separated)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Compute commissions and bonuses and write reports (default)
    Report,

    /// List agents in the master table
    Agents,

    /// Show master table statistics
    Stats,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            exchange_rate: self.exchange_rate,
            bonus_schedule: self.bonus_schedule,
            bonus_counts: self.bonus_counts,
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            agents: self.agents.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Invalid configuration stops the run before anything is read
    let file_config = FileConfig::load_or_default(&args.config)?;
    let config = Config::from_file(&file_config, &args.overrides())?;

    std::fs::create_dir_all(&args.data_dir)?;

    match args.command {
        Some(Command::Ingest { ref files }) => handle_ingest(&args.data_dir, files, &config).await,
        Some(Command::Agents) => handle_agents(&args.data_dir).await,
        Some(Command::Stats) => handle_stats(&args.data_dir).await,
        Some(Command::Report) | None => {
            run_report_generation(&args.data_dir, &args.output_dir, &config).await
        }
    }
}

/// Read, normalize and store source tables
async fn handle_ingest(data_dir: &Path, files: &[PathBuf], config: &Config) -> Result<()> {
    println!("Reading {} source tables...", files.len());
    let tables = sources::read_tables(files);
    if tables.is_empty() {
        anyhow::bail!("No readable source tables among {} files", files.len());
    }

    let summary = sources::build_master(tables, &config.default_month_tag);
    for (name, kept, dropped) in &summary.tables {
        if *dropped > 0 {
            println!("  {}: {} rows ({} dropped, unparseable date)", name, kept, dropped);
        } else {
            println!("  {}: {} rows", name, kept);
        }
    }

    let store = Store::open(&data_dir.join(constants::MASTER_DB_FILENAME)).await?;
    let stored = store.replace_deposits(&summary.rows).await?;
    store
        .set_metadata(constants::LAST_INGEST_KEY, &chrono::Utc::now().to_rfc3339())
        .await?;

    let preview_path = data_dir.join(constants::MASTER_PREVIEW_FILENAME);
    sources::write_master_csv(&preview_path, &summary.rows)?;

    println!(
        "\nStored {} deposits ({} dropped) in {}",
        stored,
        summary.dropped(),
        data_dir.join(constants::MASTER_DB_FILENAME).display()
    );
    println!("  Generated: {}", preview_path.display());

    Ok(())
}

/// Load the master table from SQLite, falling back to the CSV preview
async fn load_dataset(data_dir: &Path) -> Result<Dataset> {
    let preview_path = data_dir.join(constants::MASTER_PREVIEW_FILENAME);

    let from_store = async {
        let store = Store::open(&data_dir.join(constants::MASTER_DB_FILENAME)).await?;
        store.load_master().await
    };

    match from_store.await {
        Ok(table) if !table.rows.is_empty() || !preview_path.exists() => {
            info!(rows = table.rows.len(), "loaded master table from SQLite");
            Ok(Dataset::from_tables([table]))
        }
        Ok(_) => {
            info!("master database is empty, reading CSV preview");
            Ok(Dataset::from_tables([sources::read_master_csv(&preview_path)?]))
        }
        Err(e) if preview_path.exists() => {
            warn!(error = %format!("{:#}", e), "master database unavailable, reading CSV preview");
            Ok(Dataset::from_tables([sources::read_master_csv(&preview_path)?]))
        }
        Err(e) => Err(e),
    }
}

/// Compute commissions and bonuses, write reports and print the summary
async fn run_report_generation(data_dir: &Path, output_dir: &Path, config: &Config) -> Result<()> {
    println!("Loading master table...");
    let shared = SharedDataset::new(load_dataset(data_dir).await?);
    let dataset = shared.snapshot();

    println!("  {} deposits", dataset.len());
    if dataset.dropped() > 0 {
        println!("  {} rows dropped (unparseable date)", dataset.dropped());
    }
    if dataset.is_empty() {
        println!("\nNo deposits loaded. Run `ingest` with the monthly source files first.");
    }

    if !config.period.is_open() {
        println!(
            "  Period: {} to {}",
            config.period.start.map_or("start".to_string(), |d| d.to_string()),
            config.period.end.map_or("end".to_string(), |d| d.to_string())
        );
    }
    if !config.agents.is_empty() {
        println!("  Agents: {}", config.agents.join(", "));
    }

    let report = report::compute(&dataset, config);

    println!("\nGenerating reports...");
    reports::generate_all_reports(output_dir, &report)?;

    reports::print_summary(&report);

    Ok(())
}

/// List agents with their deposit counts
async fn handle_agents(data_dir: &Path) -> Result<()> {
    let dataset = load_dataset(data_dir).await?;
    let agents = dataset.agents();

    if agents.is_empty() {
        println!("No deposits loaded.");
        return Ok(());
    }

    println!("Agents ({}):", agents.len());
    for (agent, count) in &agents {
        println!(
            "  {:<30} {:>6}",
            agent.as_deref().unwrap_or("(none)"),
            count
        );
    }

    Ok(())
}

/// Print master table statistics
async fn handle_stats(data_dir: &Path) -> Result<()> {
    let store = Store::open(&data_dir.join(constants::MASTER_DB_FILENAME)).await?;
    let stats = store.stats().await?;

    println!("Master table: {}", stats);
    if !stats.months.is_empty() {
        println!("  Month tags: {}", stats.months.join(", "));
    }
    match store.get_metadata(constants::LAST_INGEST_KEY).await? {
        Some(when) => println!("  Last ingest: {}", when),
        None => println!("  Last ingest: never"),
    }

    Ok(())
}
