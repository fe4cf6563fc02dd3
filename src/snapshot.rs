use crate::models::RawListing;
use crate::storage::ListingStore;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::Path;
use tracing::{info, warn};

fn create_writer(output_path: &Path) -> Result<csv::Writer<File>> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;
    Ok(csv::Writer::from_writer(file))
}

/// Overwrite `output_path` with `listings`, header included.
pub fn save_listings_to_csv(listings: &[RawListing], output_path: &Path) -> Result<()> {
    let mut writer = create_writer(output_path)?;
    for listing in listings {
        writer.serialize(listing)?;
    }
    writer.flush()?;
    info!("Saved {} listings to {}", listings.len(), output_path.display());
    Ok(())
}

/// Read a snapshot written by [`save_listings_to_csv`]. A missing file is an
/// empty snapshot.
pub fn load_listings_from_csv(input_path: &Path) -> Result<Vec<RawListing>> {
    if !input_path.exists() {
        warn!("CSV file does not exist: {}", input_path.display());
        return Ok(Vec::new());
    }

    let file = File::open(input_path)
        .with_context(|| format!("Failed to open input file: {}", input_path.display()))?;
    let mut reader = csv::Reader::from_reader(file);
    let mut listings = Vec::new();

    for (line, result) in reader.deserialize::<RawListing>().enumerate() {
        match result {
            Ok(listing) => listings.push(listing),
            Err(e) => warn!("Skipping malformed record {}: {}", line + 1, e),
        }
    }

    info!("Loaded {} listings from {}", listings.len(), input_path.display());
    Ok(listings)
}

/// Dump the whole listing table to CSV. Returns the number of rows written.
pub fn export_store_to_csv(store: &ListingStore, output_path: &Path) -> Result<usize> {
    let rows = store.all().context("Failed to read listings")?;
    let mut writer = create_writer(output_path)?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Exported {} stored listings to {}", rows.len(), output_path.display());
    Ok(rows.len())
}
