//! SQLite-backed listing store.
//!
//! The crawl writes through [`ListingStore::insert_batch`]; the cleaning and
//! stats tools use the bulk operations and the read path below.

use crate::cleaning::CleaningRules;
use crate::models::{price_per_area, RawListing, StoredListing};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS listings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scraped_at TEXT NOT NULL,
        zone TEXT NOT NULL,
        city TEXT NOT NULL,
        price INTEGER NOT NULL,
        rooms INTEGER,
        bathrooms INTEGER,
        area INTEGER,
        url TEXT UNIQUE NOT NULL,
        price_per_area REAL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_listings_zone ON listings(zone);
    CREATE INDEX IF NOT EXISTS idx_listings_city ON listings(city);
    CREATE INDEX IF NOT EXISTS idx_listings_price ON listings(price);
    CREATE INDEX IF NOT EXISTS idx_listings_area ON listings(area);
    CREATE INDEX IF NOT EXISTS idx_listings_price_per_area ON listings(price_per_area);
";

const COLUMNS: &str =
    "id, scraped_at, zone, city, price, rooms, bathrooms, area, url, price_per_area";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of one [`ListingStore::insert_batch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub invalid: usize,
    pub duplicates: usize,
}

impl InsertOutcome {
    pub fn skipped(&self) -> usize {
        self.invalid + self.duplicates
    }
}

/// Optional read-path filters; `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilter {
    pub zone: Option<String>,
    pub city: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub min: i64,
    pub avg: f64,
    pub max: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub total: i64,
    pub by_zone: Vec<(String, i64)>,
    /// `(city, zone, count)`, busiest first, at most ten.
    pub top_cities: Vec<(String, String, i64)>,
    pub price: Option<ColumnStats>,
    pub area: Option<ColumnStats>,
    pub price_per_area_by_zone: Vec<(String, f64)>,
    pub first_scrape: Option<String>,
    pub last_scrape: Option<String>,
    pub distinct_scrapes: i64,
}

/// A raw listing that passed validation and is ready to insert.
#[derive(Debug, Clone, PartialEq)]
struct ValidListing<'a> {
    scraped_at: &'a str,
    zone: &'a str,
    city: &'a str,
    price: i64,
    rooms: Option<i64>,
    bathrooms: Option<i64>,
    area: Option<i64>,
    url: &'a str,
}

/// Parse a price as shown on the site ("185.000", "1,250,000").
/// Thousands separators and surrounding whitespace are dropped; anything
/// that is not a positive integer afterwards is rejected.
pub fn parse_price(text: &str) -> Option<i64> {
    let cleaned: String = text.chars().filter(|c| *c != '.' && *c != ',').collect();
    cleaned.trim().parse::<i64>().ok().filter(|p| *p > 0)
}

fn optional_field(value: Option<u32>) -> Option<i64> {
    value.filter(|v| *v > 0).map(i64::from)
}

fn validate(listing: &RawListing) -> Option<ValidListing<'_>> {
    let price_text = listing.price.as_deref()?;
    let url = listing.url.as_deref().filter(|u| !u.trim().is_empty())?;
    let price = parse_price(price_text)?;

    Some(ValidListing {
        scraped_at: &listing.scraped_at,
        zone: &listing.zone,
        city: &listing.city,
        price,
        rooms: optional_field(listing.rooms),
        bathrooms: optional_field(listing.bathrooms),
        area: optional_field(listing.area),
        url,
    })
}

fn row_to_listing(row: &Row<'_>) -> rusqlite::Result<StoredListing> {
    Ok(StoredListing {
        id: row.get(0)?,
        scraped_at: row.get(1)?,
        zone: row.get(2)?,
        city: row.get(3)?,
        price: row.get(4)?,
        rooms: row.get(5)?,
        bathrooms: row.get(6)?,
        area: row.get(7)?,
        url: row.get(8)?,
        price_per_area: row.get(9)?,
    })
}

pub struct ListingStore {
    conn: Connection,
}

impl ListingStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        debug!("Opening listing store at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Validate and insert one page worth of listings in a single
    /// transaction. Invalid rows and already known URLs are counted, not
    /// stored; nothing already stored is ever updated.
    pub fn insert_batch(&mut self, listings: &[RawListing]) -> Result<InsertOutcome, StorageError> {
        let mut outcome = InsertOutcome::default();
        if listings.is_empty() {
            return Ok(outcome);
        }

        let tx = self.conn.transaction()?;
        {
            let mut known = tx.prepare_cached("SELECT id FROM listings WHERE url = ?1")?;
            let mut insert = tx.prepare_cached(
                "INSERT INTO listings
                 (scraped_at, zone, city, price, rooms, bathrooms, area, url, price_per_area)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            for listing in listings {
                let Some(valid) = validate(listing) else {
                    outcome.invalid += 1;
                    continue;
                };

                if known.exists(params![valid.url])? {
                    outcome.duplicates += 1;
                    continue;
                }

                let result = insert.execute(params![
                    valid.scraped_at,
                    valid.zone,
                    valid.city,
                    valid.price,
                    valid.rooms,
                    valid.bathrooms,
                    valid.area,
                    valid.url,
                    price_per_area(valid.price, valid.area),
                ]);

                match result {
                    Ok(_) => outcome.inserted += 1,
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == ErrorCode::ConstraintViolation =>
                    {
                        outcome.duplicates += 1
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        tx.commit()?;

        debug!(
            "Batch of {}: {} inserted, {} invalid, {} duplicates",
            listings.len(),
            outcome.inserted,
            outcome.invalid,
            outcome.duplicates
        );
        Ok(outcome)
    }

    pub fn count(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?)
    }

    pub fn contains_url(&self, url: &str) -> Result<bool, StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id FROM listings WHERE url = ?1")?;
        Ok(stmt.exists(params![url])?)
    }

    pub fn all(&self) -> Result<Vec<StoredListing>, StorageError> {
        self.filtered(&ListingFilter::default())
    }

    pub fn filtered(&self, filter: &ListingFilter) -> Result<Vec<StoredListing>, StorageError> {
        let mut sql = format!("SELECT {} FROM listings WHERE 1=1", COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        if let Some(zone) = &filter.zone {
            sql.push_str(" AND zone = ?");
            values.push(Value::Text(zone.clone()));
        }
        if let Some(city) = &filter.city {
            sql.push_str(" AND city = ?");
            values.push(Value::Text(city.clone()));
        }
        if let Some(min) = filter.min_price {
            sql.push_str(" AND price >= ?");
            values.push(Value::Integer(min));
        }
        if let Some(max) = filter.max_price {
            sql.push_str(" AND price <= ?");
            values.push(Value::Integer(max));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_listing)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn distinct_zones(&self) -> Result<Vec<String>, StorageError> {
        self.distinct("zone")
    }

    pub fn distinct_cities(&self) -> Result<Vec<String>, StorageError> {
        self.distinct("city")
    }

    fn distinct(&self, column: &str) -> Result<Vec<String>, StorageError> {
        let sql = format!("SELECT DISTINCT {0} FROM listings ORDER BY {0}", column);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    /// Delete rows outside the cleaning ranges or missing any ranged field.
    pub fn delete_outside(&mut self, rules: &CleaningRules) -> Result<usize, StorageError> {
        let deleted = self.conn.execute(
            "DELETE FROM listings
             WHERE price IS NULL OR area IS NULL OR rooms IS NULL OR bathrooms IS NULL
                OR price < ?1 OR price > ?2
                OR area < ?3 OR area > ?4
                OR rooms < ?5 OR rooms > ?6
                OR bathrooms < ?7 OR bathrooms > ?8",
            params![
                rules.price.min,
                rules.price.max,
                rules.area.min,
                rules.area.max,
                rules.rooms.min,
                rules.rooms.max,
                rules.bathrooms.min,
                rules.bathrooms.max,
            ],
        )?;
        Ok(deleted)
    }

    pub fn recompute_price_per_area(&mut self) -> Result<usize, StorageError> {
        let updated = self.conn.execute(
            "UPDATE listings
             SET price_per_area = ROUND(CAST(price AS REAL) / CAST(area AS REAL), 2)
             WHERE area > 0",
            [],
        )?;
        Ok(updated)
    }

    pub fn stats(&self) -> Result<StoreStats, StorageError> {
        let total = self.count()?;

        let by_zone: Vec<(String, i64)> = {
            let mut stmt = self.conn.prepare(
                "SELECT zone, COUNT(*) AS n FROM listings GROUP BY zone ORDER BY n DESC, zone",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let top_cities: Vec<(String, String, i64)> = {
            let mut stmt = self.conn.prepare(
                "SELECT city, zone, COUNT(*) AS n FROM listings
                 GROUP BY city, zone ORDER BY n DESC, city LIMIT 10",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let price = self.column_stats("price")?;
        let area = self.column_stats("area")?;

        let price_per_area_by_zone: Vec<(String, f64)> = {
            let mut stmt = self.conn.prepare(
                "SELECT zone, AVG(price_per_area) AS avg_ppa FROM listings
                 WHERE price_per_area IS NOT NULL
                 GROUP BY zone ORDER BY avg_ppa DESC",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let (first_scrape, last_scrape, distinct_scrapes): (Option<String>, Option<String>, i64) =
            self.conn.query_row(
            "SELECT MIN(scraped_at), MAX(scraped_at), COUNT(DISTINCT scraped_at) FROM listings",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(StoreStats {
            total,
            by_zone,
            top_cities,
            price,
            area,
            price_per_area_by_zone,
            first_scrape,
            last_scrape,
            distinct_scrapes,
        })
    }

    fn column_stats(&self, column: &str) -> Result<Option<ColumnStats>, StorageError> {
        let sql = format!(
            "SELECT MIN({0}), AVG({0}), MAX({0}) FROM listings WHERE {0} IS NOT NULL",
            column
        );
        let (min, avg, max): (Option<i64>, Option<f64>, Option<i64>) =
            self.conn
                .query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;

        Ok(match (min, avg, max) {
            (Some(min), Some(avg), Some(max)) => Some(ColumnStats { min, avg, max }),
            _ => None,
        })
    }
}
