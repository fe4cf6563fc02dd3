//! Durable crawl progress marker.
//!
//! A checkpoint names the last `(zone, city, page)` that was fully stored.
//! It exists only while a crawl is in progress.

use crate::models::now_timestamp;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("checkpoint file {path} is not valid: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub zone: String,
    pub city: String,
    pub page: u32,
    pub updated_at: String,
}

/// Position of a unit of work in the registry's enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub zone: usize,
    pub city: usize,
    pub page: u32,
}

impl Position {
    pub fn new(zone: usize, city: usize, page: u32) -> Self {
        Self { zone, city, page }
    }
}

impl Checkpoint {
    /// Where this checkpoint sits in `registry`, if it still names a known
    /// zone and city.
    pub fn position(&self, registry: &Registry) -> Option<Position> {
        let zone_index = registry.zone_index(&self.zone)?;
        let city_index = registry.zones()[zone_index].city_index(&self.city)?;
        Some(Position::new(zone_index, city_index, self.page))
    }
}

/// Checkpoint file living next to the listing database.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `propiedades.db` → `propiedades_checkpoint.json` in the same directory.
    pub fn for_database(db_path: &Path) -> Self {
        let stem = db_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "listings".to_string());
        Self::new(db_path.with_file_name(format!("{}_checkpoint.json", stem)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Replace the checkpoint with `(zone, city, page)`. The file is written
    /// to a sibling and renamed over the old one.
    pub fn save(&self, zone: &str, city: &str, page: u32) -> Result<Checkpoint, CheckpointError> {
        let checkpoint = Checkpoint {
            zone: zone.to_string(),
            city: city.to_string(),
            page,
            updated_at: now_timestamp(),
        };

        let json = serde_json::to_string_pretty(&checkpoint).map_err(|source| CheckpointError::Format {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        debug!("Checkpoint saved: {} / {} / page {}", zone, city, page);
        Ok(checkpoint)
    }

    pub fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let checkpoint: Checkpoint = serde_json::from_str(&text).map_err(|source| CheckpointError::Format {
            path: self.path.clone(),
            source,
        })?;

        info!(
            "Checkpoint found: {} - {} - page {} (updated {})",
            checkpoint.zone, checkpoint.city, checkpoint.page, checkpoint.updated_at
        );
        Ok(Some(checkpoint))
    }

    /// Remove the checkpoint. Returns whether one existed.
    pub fn clear(&self) -> Result<bool, CheckpointError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Checkpoint removed");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Load the checkpoint and resolve it against `registry`. Unknown zones
    /// or cities and unreadable files mean starting over.
    pub fn resume_position(&self, registry: &Registry) -> Option<Position> {
        let checkpoint = match self.load() {
            Ok(checkpoint) => checkpoint?,
            Err(e) => {
                warn!("Ignoring checkpoint: {}", e);
                return None;
            }
        };

        let position = checkpoint.position(registry);
        if position.is_none() {
            warn!(
                "Checkpoint names {} / {} which is not in the registry, starting over",
                checkpoint.zone, checkpoint.city
            );
        }
        position
    }
}
