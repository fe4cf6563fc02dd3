use anyhow::{Context, Result};
use casafinder::cleaning::{clean_listings, clean_store, CleaningRules};
use casafinder::logging;
use casafinder::snapshot;
use casafinder::storage::ListingStore;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Offline cleaning passes for scraped listings")]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Enable debug output
    #[clap(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean a CSV snapshot into a new file
    Csv {
        /// Raw CSV snapshot
        #[clap(short, long, default_value = "data/data.csv")]
        input: PathBuf,

        /// Where to write the cleaned rows
        #[clap(short, long, default_value = "data/data_clean.csv")]
        output: PathBuf,
    },
    /// Delete out-of-range rows from the database and recompute price per m²
    Db {
        /// Path to the SQLite database
        #[clap(long, default_value = "propiedades.db")]
        db: PathBuf,

        /// Do not ask for confirmation
        #[clap(short, long)]
        yes: bool,
    },
    /// Load a cleaned CSV snapshot into the database
    Import {
        /// Cleaned CSV snapshot
        #[clap(short, long, default_value = "data/data_clean.csv")]
        input: PathBuf,

        /// Path to the SQLite database
        #[clap(long, default_value = "propiedades.db")]
        db: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.debug);
    let rules = CleaningRules::default();

    match args.command {
        Command::Csv { input, output } => {
            let listings = snapshot::load_listings_from_csv(&input)?;
            let (kept, report) = clean_listings(listings, &rules);
            snapshot::save_listings_to_csv(&kept, &output)?;

            println!("Rows read:           {}", report.input);
            println!("Missing fields:      {}", report.missing_fields);
            println!("Out of range:        {}", report.out_of_range);
            println!("Inconsistent:        {}", report.inconsistent);
            println!("Rows kept:           {}", report.kept);
            println!("Saved to: {}", output.display());
        }
        Command::Db { db, yes } => {
            let mut store = open_store(&db)?;
            println!(
                "This deletes listings outside price {}-{}, area {}-{} m², rooms {}-{}, bathrooms {}-{} from {}",
                rules.price.min,
                rules.price.max,
                rules.area.min,
                rules.area.max,
                rules.rooms.min,
                rules.rooms.max,
                rules.bathrooms.min,
                rules.bathrooms.max,
                db.display()
            );
            if !yes && !confirm("Continue? (si/no): ")? {
                println!("Cancelled");
                return Ok(());
            }

            let result = clean_store(&mut store, &rules)?;
            println!("Before:     {}", result.before);
            println!("Deleted:    {}", result.deleted);
            println!("After:      {}", result.after);
            println!("Recomputed: {} price per m² values", result.recomputed);
        }
        Command::Import { input, db } => {
            let mut store = open_store(&db)?;
            let listings = snapshot::load_listings_from_csv(&input)?;
            let outcome = store.insert_batch(&listings)?;

            println!("Rows read: {}", listings.len());
            println!("Inserted:  {}", outcome.inserted);
            println!("Invalid:   {}", outcome.invalid);
            println!("Duplicate: {}", outcome.duplicates);
            println!("Total listings in database: {}", store.count()?);
        }
    }

    Ok(())
}

fn open_store(db: &Path) -> Result<ListingStore> {
    ListingStore::open(db).with_context(|| format!("Failed to open database {}", db.display()))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "si" | "sí" | "s" | "yes" | "y"))
}
