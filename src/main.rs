//! Smart-Contract Debt Lineage CLI
//!
//! Resolves contract redeployment lineages from seed addresses and mines
//! the technical-debt comments of every version.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use eth_debt_lineage::config::CrawlerConfig;
use eth_debt_lineage::debt_evolution::{analyze_contract_dir, analyze_dataset};
use eth_debt_lineage::ethereum::{seeds_from_text, SeedAddress};
use eth_debt_lineage::etherscan::EtherscanClient;
use eth_debt_lineage::export::CsvExporter;
use eth_debt_lineage::fetch_lineage::LineageResolver;
use eth_debt_lineage::scan_debt::DebtScanner;
use eth_debt_lineage::throttle::{CredentialRotator, RateBudget};

#[derive(Parser)]
#[command(name = "eth-debt-lineage")]
#[command(version)]
#[command(about = "Contract lineage crawling and debt-comment mining", long_about = None)]
struct Cli {
    /// Path to configuration file (optional, uses env vars if not provided)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve lineages for seed addresses and mine their debt comments
    Crawl {
        /// Seed contract addresses
        seeds: Vec<String>,

        /// File of seed addresses (free text, addresses are extracted)
        #[arg(short, long)]
        seeds_file: Option<PathBuf>,
    },

    /// Re-scan the on-disk dataset and export debt data
    Analyze,

    /// Show dataset status and per-contract version counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    // Load configuration
    let config = match &cli.config {
        Some(path) => CrawlerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => CrawlerConfig::load().context("Failed to load config from environment")?,
    };
    config.ensure_directories()?;

    match cli.command {
        Commands::Crawl { seeds, seeds_file } => {
            cmd_crawl(&config, seeds, seeds_file).await?;
        }
        Commands::Analyze => {
            cmd_analyze(&config)?;
        }
        Commands::Status => {
            cmd_status(&config)?;
        }
    }

    Ok(())
}

/// Gather seeds from CLI arguments and the optional seeds file.
fn gather_seeds(seeds: Vec<String>, seeds_file: Option<PathBuf>) -> Result<Vec<SeedAddress>> {
    let mut gathered: Vec<SeedAddress> = Vec::new();

    for raw in &seeds {
        match SeedAddress::parse(raw) {
            Ok(seed) => gathered.push(seed),
            Err(e) => warn!("ignoring seed {}: {}", raw, e),
        }
    }

    if let Some(path) = seeds_file {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read seeds file {:?}", path))?;
        gathered.extend(seeds_from_text(&text));
    }

    let mut seen = std::collections::HashSet::new();
    gathered.retain(|seed| seen.insert(seed.to_lowercase()));
    Ok(gathered)
}

async fn cmd_crawl(
    config: &CrawlerConfig,
    seeds: Vec<String>,
    seeds_file: Option<PathBuf>,
) -> Result<()> {
    info!("=== Crawling Contract Lineages ===");

    let seeds = gather_seeds(seeds, seeds_file)?;
    if seeds.is_empty() {
        anyhow::bail!("no valid seed addresses given");
    }
    info!("{} seed address(es) to resolve", seeds.len());

    let credentials = config.load_credentials();
    if credentials.is_empty() {
        warn!(
            "credential pool {:?} is empty, calls will go out unauthenticated",
            config.credentials_file
        );
    } else {
        info!("loaded {} API credential(s)", credentials.len());
    }

    // One budget and one credential pool shared by everything in this run.
    let budget = Arc::new(RateBudget::new(config.rate_limits.requests_per_second));
    let rotator = Arc::new(CredentialRotator::new(credentials));
    let client = Arc::new(EtherscanClient::new(
        config.api_url.clone(),
        budget,
        rotator,
        config.retry.clone(),
    ));

    let resolver = LineageResolver::new(client, config.network_root());
    let scanner = DebtScanner::from_config(&config.scan);
    let exporter = CsvExporter::new(&config.paths.debt_root);

    let mut resolved = 0usize;
    for seed in &seeds {
        let address = seed.to_lowercase();
        info!("--- seed {} ---", address);

        let lineage = match resolver.resolve(&address).await {
            Ok(lineage) => lineage,
            Err(e) => {
                // One failed seed must not take down the batch.
                error!("lineage resolution failed for {}: {}", address, e);
                continue;
            }
        };

        if lineage.is_empty() {
            info!("{}: no redeployments found", address);
            continue;
        }
        info!(
            "{}: {} versions of {}",
            address,
            lineage.len(),
            lineage.contract_name
        );

        let contract_dir = config.network_root().join(&lineage.contract_name);
        match analyze_contract_dir(&contract_dir, &scanner, &exporter) {
            Ok(series) => {
                info!(
                    "{}: debt per version {:?}",
                    lineage.contract_name, series
                );
            }
            Err(e) => error!("debt analysis failed for {}: {}", lineage.contract_name, e),
        }
        resolved += 1;
    }

    info!("=== Crawl complete: {}/{} seeds resolved ===", resolved, seeds.len());
    Ok(())
}

fn cmd_analyze(config: &CrawlerConfig) -> Result<()> {
    info!("=== Analyzing Dataset ===");

    let scanner = DebtScanner::from_config(&config.scan);
    let exporter = CsvExporter::new(&config.paths.debt_root);

    let analyzed = analyze_dataset(&config.network_root(), &scanner, &exporter)
        .context("Failed to analyze dataset")?;

    info!("analyzed {} contract(s) under {:?}", analyzed, config.network_root());
    Ok(())
}

fn cmd_status(config: &CrawlerConfig) -> Result<()> {
    info!("=== Dataset Status ===");
    info!("Network root: {:?}", config.network_root());

    let root = config.network_root();
    if !root.exists() {
        info!("dataset is empty (network root missing)");
        return Ok(());
    }

    let mut contracts = 0usize;
    let mut versions = 0usize;
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(&root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    for dir in &dirs {
        let count = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map_or(false, |name| name.ends_with(".sol"))
            })
            .count();
        info!(
            "  {:?}: {} version(s)",
            dir.file_name().unwrap_or_default(),
            count
        );
        contracts += 1;
        versions += count;
    }

    info!("{} contract(s), {} version(s) total", contracts, versions);
    Ok(())
}
