use anyhow::{Context, Result};
use casafinder::checkpoint::CheckpointStore;
use casafinder::crawler::{CrawlOptions, Crawler};
use casafinder::extractor::ExtractMode;
use casafinder::fetcher::{FetchPolicy, PageFetcher};
use casafinder::logging;
use casafinder::registry::{Registry, DEFAULT_MAX_PAGES};
use casafinder::report::CrawlReporter;
use casafinder::storage::ListingStore;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Keep every listing card, even with missing fields
    Incremental,
    /// Keep only cards with rooms, bathrooms and area
    Strict,
}

impl From<Mode> for ExtractMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Incremental => ExtractMode::Incremental,
            Mode::Strict => ExtractMode::Strict,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Casafinder - house listings crawler")]
struct Args {
    /// Path to the SQLite database
    #[clap(long, default_value = "propiedades.db")]
    db: PathBuf,

    /// Maximum number of pages to crawl per city
    #[clap(short, long, default_value_t = DEFAULT_MAX_PAGES)]
    max_pages: u32,

    /// Extraction mode
    #[clap(long, value_enum, default_value = "incremental")]
    mode: Mode,

    /// CSV backup of every listing seen during the run
    #[clap(long, default_value = "data/data.csv")]
    csv: PathBuf,

    /// Do not write the CSV backup
    #[clap(long)]
    no_csv: bool,

    /// Discard the saved checkpoint and crawl from the beginning
    #[clap(long)]
    reset: bool,

    /// Enable debug output
    #[clap(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.debug);

    let mut store = ListingStore::open(&args.db)
        .with_context(|| format!("Failed to open database {}", args.db.display()))?;
    info!("Database {} holds {} listings", args.db.display(), store.count()?);

    let checkpoints = CheckpointStore::for_database(&args.db);
    if args.reset && checkpoints.clear()? {
        println!("Checkpoint {} discarded, starting from the beginning", checkpoints.path().display());
    }

    let fetcher = PageFetcher::new(FetchPolicy::default()).context("Failed to build HTTP client")?;
    let registry = Registry::default();
    let options = CrawlOptions {
        max_pages: args.max_pages,
        mode: args.mode.into(),
        csv_backup: (!args.no_csv).then_some(args.csv),
    };

    Crawler::new(
        &fetcher,
        &mut store,
        &checkpoints,
        &registry,
        options,
        CrawlReporter::stdout(),
    )?
    .run();

    println!("Total listings in database: {}", store.count()?);
    Ok(())
}
