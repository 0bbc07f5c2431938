//! Storage backend abstraction for geonear
//!
//! This module provides the capability contract shared by every location
//! store, plus the two concrete engines:
//!
//! - [`MemoryGeoBackend`]: a geo-indexed sorted set plus a key/value map of
//!   serialized records, backed by any [`GeoStore`] (Redis or embedded).
//! - [`SpatialIndexBackend`]: a SQLite table plus an R*Tree bounding-box
//!   index, with an exact great-circle filter.

use crate::error::Result;
use crate::types::{BackendKind, Inventory, LocationRecord, NearbyQuery, NearbyResult};

pub mod geo;
pub mod memory_geo;
pub mod spatial_index;

pub use geo::{EmbeddedGeoStore, GeoHit, GeoStore};
#[cfg(feature = "redis")]
pub use geo::RedisGeoStore;
pub use memory_geo::MemoryGeoBackend;
pub use spatial_index::SpatialIndexBackend;

/// Trait for location store implementations
///
/// Implementations must be safe to share across threads; a single instance
/// serves every request for the lifetime of the process.
pub trait StorageBackend: Send + Sync {
    /// Sanitize the record, derive its id and write it, replacing any record
    /// with the same id.
    ///
    /// Returns `false` on any failure (logged); never returns an error so
    /// bulk loaders can keep going after a bad record.
    fn add_location(&self, location: &LocationRecord) -> bool;

    /// Records within `query.distance_meters` of the query point, nearest
    /// first, at most `query.max_results`, with `population >=
    /// query.min_population`.
    ///
    /// Storage failures are returned as errors, never as an empty list.
    fn find_nearby(&self, query: &NearbyQuery) -> Result<Vec<NearbyResult>>;

    /// Cheap liveness check. Does not mutate data.
    fn health_check(&self) -> bool;

    /// Which engine this is.
    fn kind(&self) -> BackendKind;

    /// Counts and structure presence used to decide whether seeding is needed.
    fn inventory(&self) -> Result<Inventory>;
}
