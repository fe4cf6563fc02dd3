use anyhow::{bail, Context, Result};
use casafinder::logging;
use casafinder::registry::Registry;
use casafinder::snapshot;
use casafinder::storage::{ColumnStats, ListingFilter, ListingStore, StoreStats};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Summaries of the stored listings")]
struct Args {
    /// Path to the SQLite database
    #[clap(long, default_value = "propiedades.db")]
    db: PathBuf,

    /// Only listings in this zone
    #[clap(short, long)]
    zone: Option<String>,

    /// Only listings in this city
    #[clap(short, long)]
    city: Option<String>,

    /// Minimum price
    #[clap(long)]
    min_price: Option<i64>,

    /// Maximum price
    #[clap(long)]
    max_price: Option<i64>,

    /// Export the whole table to this CSV file
    #[clap(short, long)]
    export: Option<PathBuf>,

    /// Enable debug output
    #[clap(short, long)]
    debug: bool,
}

impl Args {
    fn filter(&self) -> Option<ListingFilter> {
        let filter = ListingFilter {
            zone: self.zone.clone(),
            city: self.city.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
        };
        (filter != ListingFilter::default()).then_some(filter)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.debug);

    let store = ListingStore::open(&args.db)
        .with_context(|| format!("Failed to open database {}", args.db.display()))?;

    if let Some(path) = &args.export {
        let rows = snapshot::export_store_to_csv(&store, path)?;
        println!("Exported {} listings to {}", rows, path.display());
        return Ok(());
    }

    match args.filter() {
        Some(filter) => print_filtered(&store, filter)?,
        None => print_stats(&store.stats()?),
    }
    Ok(())
}

fn print_filtered(store: &ListingStore, mut filter: ListingFilter) -> Result<()> {
    let registry = Registry::default();

    if let (None, Some(city)) = (&filter.zone, &filter.city) {
        match registry.zone_for_city(city) {
            Some(zone) => filter.zone = Some(zone.to_string()),
            None => bail!("Unknown city: {}", city),
        }
    }
    if let Some(zone) = &filter.zone {
        if registry.zone(zone).is_none() {
            bail!("Unknown zone: {}", zone);
        }
        if let Some(city) = &filter.city {
            if !registry.is_known(zone, city) {
                bail!("{} is not a city of {}", city, zone);
            }
        }
    }

    let rows = store.filtered(&filter)?;
    for row in &rows {
        println!(
            "{:>10} | {:>4} m² | {:>2} dorm | {:>2} baños | {:>9} | {} / {} | {}",
            row.price,
            fmt_opt(row.area),
            fmt_opt(row.rooms),
            fmt_opt(row.bathrooms),
            row.price_per_area.map(|p| format!("{:.2}", p)).unwrap_or_else(|| "-".to_string()),
            row.zone,
            row.city,
            row.url
        );
    }
    println!("\n{} listings match", rows.len());
    Ok(())
}

fn fmt_opt(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn fmt_column(label: &str, stats: Option<ColumnStats>) {
    match stats {
        Some(s) => println!("{:<8} min {:>10}  avg {:>12.2}  max {:>10}", label, s.min, s.avg, s.max),
        None => println!("{:<8} no data", label),
    }
}

fn print_stats(stats: &StoreStats) {
    println!("=== Listings: {} ===", stats.total);

    println!("\nBy zone:");
    for (zone, count) in &stats.by_zone {
        println!("  {:<25} {:>6}", zone, count);
    }

    println!("\nTop cities:");
    for (city, zone, count) in &stats.top_cities {
        println!("  {:<25} {:<25} {:>6}", city, zone, count);
    }

    println!();
    fmt_column("Price", stats.price);
    fmt_column("Area", stats.area);

    println!("\nAverage price per m² by zone:");
    for (zone, ppa) in &stats.price_per_area_by_zone {
        println!("  {:<25} {:>10.2}", zone, ppa);
    }

    println!(
        "\nScrapes: {} distinct, first {}, last {}",
        stats.distinct_scrapes,
        stats.first_scrape.as_deref().unwrap_or("-"),
        stats.last_scrape.as_deref().unwrap_or("-")
    );
}
