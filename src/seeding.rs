//! Bulk loading of the cities dataset into a backend.
//!
//! The source is a JSON array of [`LocationRecord`] objects. Seeding is
//! idempotent in practice: [`needs_seeding`] compares the source length with
//! the backend's [`Inventory`](crate::types::Inventory) and callers skip the
//! load when they agree.

use crate::error::{GeoNearError, Result};
use crate::storage::StorageBackend;
use crate::types::LocationRecord;
use serde::de::IgnoredAny;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Outcome of a [`seed`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// City names of the records that were rejected.
    pub failed: Vec<String>,
}

impl SeedReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.succeeded == self.attempted
    }
}

fn open_source(path: &Path) -> Result<BufReader<File>> {
    if !path.exists() {
        return Err(GeoNearError::SourceNotFound(path.to_path_buf()));
    }
    Ok(BufReader::new(File::open(path)?))
}

/// Number of records in the source array, without building them.
pub fn source_record_count(path: impl AsRef<Path>) -> Result<usize> {
    let reader = open_source(path.as_ref())?;
    let entries: Vec<IgnoredAny> = serde_json::from_reader(reader)?;
    Ok(entries.len())
}

/// Parse every record of the source array.
pub fn load_source(path: impl AsRef<Path>) -> Result<Vec<LocationRecord>> {
    let reader = open_source(path.as_ref())?;
    Ok(serde_json::from_reader(reader)?)
}

/// True when the backend is missing its structures or holds a different
/// number of records than the source.
///
/// Any failure while checking counts as "needs seeding".
pub fn needs_seeding(backend: &dyn StorageBackend, source: impl AsRef<Path>) -> bool {
    match check_seeding(backend, source.as_ref()) {
        Ok(needed) => needed,
        Err(e) => {
            log::error!("Could not verify {} backend contents: {}", backend.kind(), e);
            true
        }
    }
}

fn check_seeding(backend: &dyn StorageBackend, source: &Path) -> Result<bool> {
    let expected = source_record_count(source)?;
    let inventory = backend.inventory()?;

    if !inventory.structures_present {
        log::info!("{} backend has no location index yet", backend.kind());
        return Ok(true);
    }

    if inventory.records != expected || inventory.indexed != expected {
        log::info!(
            "{} backend holds {} records ({} indexed), source has {}",
            backend.kind(),
            inventory.records,
            inventory.indexed,
            expected
        );
        return Ok(true);
    }

    log::info!("{} backend is up to date ({} records)", backend.kind(), expected);
    Ok(false)
}

/// Add every record, continuing past failures.
pub fn seed(backend: &dyn StorageBackend, records: &[LocationRecord]) -> SeedReport {
    let mut report = SeedReport {
        attempted: records.len(),
        ..SeedReport::default()
    };

    for record in records {
        if backend.add_location(record) {
            report.succeeded += 1;
        } else {
            report.failed.push(record.city.clone());
        }
    }

    log::info!(
        "Seeded {} of {} locations into {} backend",
        report.succeeded,
        report.attempted,
        backend.kind()
    );
    if !report.failed.is_empty() {
        log::warn!("{} locations failed to load", report.failed.len());
    }
    report
}
