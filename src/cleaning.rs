//! Offline cleaning passes over a CSV snapshot or the listing store.

use crate::models::RawListing;
use crate::storage::{parse_price, ListingStore, StorageError};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRange {
    pub min: i64,
    pub max: i64,
}

impl ValueRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i64) -> bool {
        self.min <= value && value <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Above(i64),
    Below(i64),
}

impl Bound {
    fn matches(&self, value: i64) -> bool {
        match *self {
            Bound::Above(limit) => value > limit,
            Bound::Below(limit) => value < limit,
        }
    }
}

/// A price/area combination that is implausible enough to drop the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicRule {
    pub name: &'static str,
    pub price: Bound,
    pub area: Bound,
}

impl LogicRule {
    pub fn rejects(&self, price: i64, area: i64) -> bool {
        self.price.matches(price) && self.area.matches(area)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleaningRules {
    pub price: ValueRange,
    pub area: ValueRange,
    pub rooms: ValueRange,
    pub bathrooms: ValueRange,
    pub logic: Vec<LogicRule>,
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self {
            price: ValueRange::new(20_000, 2_000_000),
            area: ValueRange::new(30, 1_500),
            rooms: ValueRange::new(1, 10),
            bathrooms: ValueRange::new(1, 6),
            logic: vec![
                LogicRule {
                    name: "expensive and tiny",
                    price: Bound::Above(1_500_000),
                    area: Bound::Below(100),
                },
                LogicRule {
                    name: "cheap and huge",
                    price: Bound::Below(50_000),
                    area: Bound::Above(500),
                },
            ],
        }
    }
}

/// Row counts removed by each stage of [`clean_listings`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub input: usize,
    pub missing_fields: usize,
    pub out_of_range: usize,
    pub inconsistent: usize,
    pub kept: usize,
}

struct Complete {
    price: i64,
    rooms: i64,
    bathrooms: i64,
    area: i64,
}

fn complete(listing: &RawListing) -> Option<Complete> {
    Some(Complete {
        price: listing.price.as_deref().and_then(parse_price)?,
        rooms: i64::from(listing.rooms?),
        bathrooms: i64::from(listing.bathrooms?),
        area: i64::from(listing.area?),
    })
}

impl CleaningRules {
    fn in_range(&self, row: &Complete) -> bool {
        self.price.contains(row.price)
            && self.area.contains(row.area)
            && self.rooms.contains(row.rooms)
            && self.bathrooms.contains(row.bathrooms)
    }

    fn inconsistent(&self, row: &Complete) -> Option<&LogicRule> {
        self.logic.iter().find(|rule| rule.rejects(row.price, row.area))
    }
}

/// Drop rows with missing fields, then rows outside the ranges, then rows
/// failing a logic rule. Surviving rows get their price normalised to plain
/// digits.
pub fn clean_listings(listings: Vec<RawListing>, rules: &CleaningRules) -> (Vec<RawListing>, CleaningReport) {
    let mut report = CleaningReport {
        input: listings.len(),
        ..Default::default()
    };
    let mut kept = Vec::new();

    for mut listing in listings {
        let Some(row) = complete(&listing) else {
            report.missing_fields += 1;
            continue;
        };
        if !rules.in_range(&row) {
            report.out_of_range += 1;
            continue;
        }
        if let Some(rule) = rules.inconsistent(&row) {
            debug!("Dropping {:?}: {}", listing.url, rule.name);
            report.inconsistent += 1;
            continue;
        }

        listing.price = Some(row.price.to_string());
        kept.push(listing);
    }

    report.kept = kept.len();
    info!(
        "Cleaned {} rows: {} missing fields, {} out of range, {} inconsistent, {} kept",
        report.input, report.missing_fields, report.out_of_range, report.inconsistent, report.kept
    );
    (kept, report)
}

/// Counts from [`clean_store`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCleaning {
    pub before: i64,
    pub deleted: usize,
    pub after: i64,
    pub recomputed: usize,
}

/// Delete out-of-range rows from the store and recompute price per area.
pub fn clean_store(store: &mut ListingStore, rules: &CleaningRules) -> Result<StoreCleaning, StorageError> {
    let before = store.count()?;
    let deleted = store.delete_outside(rules)?;
    let recomputed = store.recompute_price_per_area()?;
    let after = store.count()?;
    info!("Deleted {} of {} rows, recomputed {}", deleted, before, recomputed);
    Ok(StoreCleaning {
        before,
        deleted,
        after,
        recomputed,
    })
}
