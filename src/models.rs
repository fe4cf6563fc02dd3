use chrono::Local;
use serde::{Deserialize, Serialize};

pub const SCRAPED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One listing block as it came off a results page, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub scraped_at: String,
    pub zone: String,
    pub city: String,
    pub price: Option<String>,
    pub rooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub area: Option<u32>,
    pub url: Option<String>,
}

impl RawListing {
    pub fn new(zone: &str, city: &str) -> Self {
        Self {
            scraped_at: now_timestamp(),
            zone: zone.to_string(),
            city: city.to_string(),
            price: None,
            rooms: None,
            bathrooms: None,
            area: None,
            url: None,
        }
    }
}

/// A row of the listings table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredListing {
    pub id: i64,
    pub scraped_at: String,
    pub zone: String,
    pub city: String,
    pub price: i64,
    pub rooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub area: Option<i64>,
    pub url: String,
    pub price_per_area: Option<f64>,
}

pub fn now_timestamp() -> String {
    Local::now().format(SCRAPED_AT_FORMAT).to_string()
}

/// `round(price / area, 2)`, or `None` unless the area is positive.
pub fn price_per_area(price: i64, area: Option<i64>) -> Option<f64> {
    match area {
        Some(area) if area > 0 => Some(((price as f64 / area as f64) * 100.0).round() / 100.0),
        _ => None,
    }
}
