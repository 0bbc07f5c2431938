//! Disk-backed spatial-index backend.
//!
//! Records are stored in a SQLite table and mirrored, as degenerate
//! bounding boxes, in an R*Tree virtual table keyed by the table's integer
//! key. A nearby search selects candidates whose box intersects an
//! approximate bounding box of the search circle, then keeps the ones whose
//! great-circle distance is within the radius.

use super::StorageBackend;
use crate::compute::distance::{bounding_box, great_circle_m};
use crate::error::{GeoNearError, Result};
use crate::types::{BackendKind, Inventory, LocationRecord, NearbyQuery, NearbyResult};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS locations (
        pk INTEGER PRIMARY KEY,
        id TEXT NOT NULL UNIQUE,
        data TEXT NOT NULL,
        lat REAL NOT NULL,
        lng REAL NOT NULL,
        population INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_locations_coords ON locations(lat, lng);
    CREATE INDEX IF NOT EXISTS idx_locations_population ON locations(population);
    CREATE VIRTUAL TABLE IF NOT EXISTS locations_rtree USING rtree(
        pk,
        min_lat, max_lat,
        min_lng, max_lng
    );
";

const NEARBY_CANDIDATES: &str = "
    SELECT l.data, l.lat, l.lng
    FROM locations_rtree r
    JOIN locations l ON l.pk = r.pk
    WHERE r.max_lat >= ?1 AND r.min_lat <= ?2
      AND r.max_lng >= ?3 AND r.min_lng <= ?4
      AND l.population >= ?5
";

/// SQLite + R*Tree location store.
///
/// ```rust
/// use geonear::prelude::*;
///
/// let backend = SpatialIndexBackend::in_memory()?;
/// let seoul: LocationRecord = serde_json::from_str(
///     r#"{"city":"Seoul","lat":37.56,"lng":126.99,"iso2":"KR","population":21794000}"#,
/// )?;
/// assert!(backend.add_location(&seoul));
///
/// let hits = backend.find_nearby(&NearbyQuery::new(37.56, 126.99).with_distance(1_000.0))?;
/// assert_eq!(hits.len(), 1);
/// assert!(hits[0].distance < 1.0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SpatialIndexBackend {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SpatialIndexBackend {
    /// Open (creating if needed) the database at `path`, including missing
    /// parent directories, and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        log::info!("Opened spatial index at {}", path.display());

        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    /// Database that lives only as long as this value.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn try_add(&self, location: &LocationRecord) -> Result<String> {
        let clean = location.sanitize();
        clean.validate()?;

        let id = clean.id().into_string();
        let data = serde_json::to_string(&clean)?;
        let population = i64::try_from(clean.population).map_err(|_| {
            GeoNearError::InvalidInput(format!("Population too large: {}", clean.population))
        })?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO locations (id, data, lat, lng, population)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                data = excluded.data,
                lat = excluded.lat,
                lng = excluded.lng,
                population = excluded.population",
            params![id, data, clean.lat, clean.lng, population],
        )?;
        let pk: i64 = tx.query_row("SELECT pk FROM locations WHERE id = ?1", [&id], |row| {
            row.get(0)
        })?;
        tx.execute(
            "INSERT OR REPLACE INTO locations_rtree (pk, min_lat, max_lat, min_lng, max_lng)
             VALUES (?1, ?2, ?2, ?3, ?3)",
            params![pk, clean.lat, clean.lng],
        )?;
        tx.commit()?;

        Ok(id)
    }

    fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl StorageBackend for SpatialIndexBackend {
    fn add_location(&self, location: &LocationRecord) -> bool {
        match self.try_add(location) {
            Ok(id) => {
                log::trace!("Stored location {}", id);
                true
            }
            Err(e) => {
                log::error!("Failed to add location {:?}: {}", location.city, e);
                false
            }
        }
    }

    fn find_nearby(&self, query: &NearbyQuery) -> Result<Vec<NearbyResult>> {
        query.validate()?;

        let radius_km = query.distance_meters / 1000.0;
        let bounds = bounding_box(query.latitude, query.longitude, radius_km);
        let min_population = i64::try_from(query.min_population).unwrap_or(i64::MAX);

        let candidates = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare_cached(NEARBY_CANDIDATES)?;
            let rows = stmt.query_map(
                params![
                    bounds.min_lat,
                    bounds.max_lat,
                    bounds.min_lng,
                    bounds.max_lng,
                    min_population
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                    ))
                },
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut within: Vec<(f64, String)> = candidates
            .into_iter()
            .filter_map(|(data, lat, lng)| {
                let distance_m = great_circle_m(query.latitude, query.longitude, lat, lng);
                (distance_m <= query.distance_meters).then_some((distance_m, data))
            })
            .collect();

        within.sort_by(|a, b| a.0.total_cmp(&b.0));
        within.truncate(query.max_results);

        within
            .into_iter()
            .map(|(distance, data)| {
                Ok(NearbyResult {
                    location: serde_json::from_str(&data)?,
                    distance,
                })
            })
            .collect()
    }

    fn health_check(&self) -> bool {
        let conn = self.conn.lock();
        match conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)) {
            Ok(_) => true,
            Err(e) => {
                log::error!("Spatial-index health check failed: {}", e);
                false
            }
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::SpatialIndex
    }

    fn inventory(&self) -> Result<Inventory> {
        let conn = self.conn.lock();
        let structures_present = Self::table_exists(&conn, "locations")?
            && Self::table_exists(&conn, "locations_rtree")?;
        if !structures_present {
            return Ok(Inventory::default());
        }

        let records: i64 = conn.query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
        let indexed: i64 =
            conn.query_row("SELECT COUNT(*) FROM locations_rtree", [], |row| row.get(0))?;

        Ok(Inventory {
            structures_present,
            records: usize::try_from(records).unwrap_or(0),
            indexed: usize::try_from(indexed).unwrap_or(0),
        })
    }
}
